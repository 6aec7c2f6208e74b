// src/services/mass_action_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::JobsRepository,
    integrations::{ChannelSender, ContactResolver, TextGenerator},
    models::jobs::{Canal, EnvioResumo, JobStatus, JobTipo, MassActionJob, PreviewItem},
};

// O Generator e o Executor dos disparos em massa.
// O fluxo inteiro: criar (GENERATING) -> preview (PREVIEW) -> aprovação
// humana -> enviar (SENDING) -> DONE | FAILED.
#[derive(Clone)]
pub struct MassActionService {
    repo: JobsRepository,
    resolver: Arc<dyn ContactResolver>,
    generator: Arc<dyn TextGenerator>,
    whatsapp: Arc<dyn ChannelSender>,
    email: Arc<dyn ChannelSender>,
}

impl MassActionService {
    pub fn new(
        repo: JobsRepository,
        resolver: Arc<dyn ContactResolver>,
        generator: Arc<dyn TextGenerator>,
        whatsapp: Arc<dyn ChannelSender>,
        email: Arc<dyn ChannelSender>,
    ) -> Self {
        Self {
            repo,
            resolver,
            generator,
            whatsapp,
            email,
        }
    }

    // Roteamento de canal em tempo de compilação: canal novo no enum
    // obriga um braço novo aqui.
    fn sender_para(&self, canal: Canal) -> &dyn ChannelSender {
        match canal {
            Canal::Whatsapp => self.whatsapp.as_ref(),
            Canal::Email => self.email.as_ref(),
        }
    }

    /// Cria o job e roda o Generator em seguida, devolvendo-o em PREVIEW.
    /// A lista de alvos chega como está: deduplicação é papel do chamador.
    pub async fn create_and_generate(
        &self,
        empresa_id: Uuid,
        tipo: JobTipo,
        canal: Canal,
        instrucao: &str,
        deal_ids: &[Uuid],
    ) -> Result<MassActionJob, AppError> {
        let job = self
            .repo
            .create_job(empresa_id, tipo, canal, instrucao, deal_ids)
            .await?;

        let itens = match montar_preview(
            empresa_id,
            instrucao,
            deal_ids,
            self.resolver.as_ref(),
            self.generator.as_ref(),
        )
        .await
        {
            Ok(itens) => itens,
            Err(e) => {
                // Erro não recuperável no meio da geração: o job não fica
                // pendurado em GENERATING.
                if let Err(marcar) = self.repo.mark_failed(empresa_id, job.id).await {
                    tracing::error!("falha ao marcar job {} como FAILED: {}", job.id, marcar);
                }
                return Err(e);
            }
        };

        self.repo.save_preview(empresa_id, job.id, &itens).await
    }

    pub async fn find_job(
        &self,
        empresa_id: Uuid,
        job_id: Uuid,
    ) -> Result<MassActionJob, AppError> {
        self.repo
            .find_job(empresa_id, job_id)
            .await?
            .ok_or(AppError::JobNotFound)
    }

    pub async fn list_jobs(
        &self,
        empresa_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MassActionJob>, AppError> {
        self.repo.list_jobs(empresa_id, limit).await
    }

    pub async fn review_item(
        &self,
        empresa_id: Uuid,
        job_id: Uuid,
        deal_id: Uuid,
        approved: bool,
    ) -> Result<MassActionJob, AppError> {
        self.repo
            .set_item_approval(empresa_id, job_id, deal_id, approved)
            .await
    }

    /// O Executor: exige PREVIEW (claim condicional), dispara os itens
    /// aprovados em sequência e fecha o job num estado final.
    pub async fn execute(
        &self,
        empresa_id: Uuid,
        job_id: Uuid,
    ) -> Result<EnvioResumo, AppError> {
        let job = self.repo.claim_for_sending(empresa_id, job_id).await?;

        let aprovados: Vec<PreviewItem> = job.itens_aprovados().cloned().collect();

        let tally = match disparar_aprovados(
            empresa_id,
            job.canal,
            &aprovados,
            self.resolver.as_ref(),
            self.sender_para(job.canal),
        )
        .await
        {
            Ok(tally) => tally,
            Err(e) => {
                if let Err(marcar) = self.repo.mark_failed(empresa_id, job_id).await {
                    tracing::error!("falha ao marcar job {} como FAILED: {}", job_id, marcar);
                }
                return Err(e);
            }
        };

        let status = status_final(aprovados.len(), tally.processed);
        let job = self
            .repo
            .finalize(empresa_id, job_id, tally.processed, status)
            .await?;

        tracing::info!(
            job_id = %job.id,
            processed = tally.processed,
            failed = tally.falhas,
            ?status,
            "lote de disparo encerrado"
        );

        Ok(EnvioResumo {
            processed: tally.processed,
            failed: tally.falhas,
            status,
        })
    }
}

struct EnvioTally {
    processed: i32,
    falhas: i32,
}

// Lote vazio é sucesso, não falha. FAILED só quando TODOS os aprovados
// falharam; falha parcial continua DONE (visível pelas contagens).
fn status_final(aprovados: usize, processed: i32) -> JobStatus {
    if aprovados > 0 && processed == 0 {
        JobStatus::Failed
    } else {
        JobStatus::Done
    }
}

/// O laço do Generator: um PreviewItem por alvo, SEMPRE — alvo que não
/// resolve ou geração que falha entra reprovado com a mensagem de erro.
/// Sem retentativa e sem abortar o lote por causa de um alvo.
async fn montar_preview(
    empresa_id: Uuid,
    instrucao: &str,
    deal_ids: &[Uuid],
    resolver: &dyn ContactResolver,
    generator: &dyn TextGenerator,
) -> Result<Vec<PreviewItem>, AppError> {
    let mut itens = Vec::with_capacity(deal_ids.len());

    for &deal_id in deal_ids {
        let contato = match resolver.resolve(empresa_id, deal_id).await? {
            Some(contato) => contato,
            None => {
                itens.push(PreviewItem::com_falha(
                    deal_id,
                    "(desconhecido)".to_string(),
                    "contato não encontrado",
                ));
                continue;
            }
        };

        match generator.gerar_mensagem(instrucao, &contato.nome).await {
            Ok(mensagem) => itens.push(PreviewItem::gerado(deal_id, contato.nome, mensagem)),
            Err(e) => {
                tracing::warn!(%deal_id, "geração falhou: {}", e);
                itens.push(PreviewItem::com_falha(deal_id, contato.nome, &e.to_string()));
            }
        }
    }

    Ok(itens)
}

/// O laço do Executor: sequencial, cada item com seu próprio resultado.
/// `processed` só conta aceite confirmado do provedor; endereço ausente
/// conta como erro e pula o item.
async fn disparar_aprovados(
    empresa_id: Uuid,
    canal: Canal,
    itens: &[PreviewItem],
    resolver: &dyn ContactResolver,
    sender: &dyn ChannelSender,
) -> Result<EnvioTally, AppError> {
    let mut tally = EnvioTally {
        processed: 0,
        falhas: 0,
    };

    for item in itens {
        let contato = match resolver.resolve(empresa_id, item.deal_id).await? {
            Some(contato) => contato,
            None => {
                tracing::warn!(deal_id = %item.deal_id, "contato sumiu entre preview e envio");
                tally.falhas += 1;
                continue;
            }
        };

        let Some(destino) = contato.endereco(canal) else {
            tracing::warn!(deal_id = %item.deal_id, ?canal, "contato sem endereço no canal");
            tally.falhas += 1;
            continue;
        };

        match sender.enviar(destino, &item.message).await {
            Ok(()) => tally.processed += 1,
            Err(e) => {
                tracing::warn!(deal_id = %item.deal_id, "envio rejeitado: {}", e);
                tally.falhas += 1;
            }
        }
    }

    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::models::crm::ContatoDoDeal;

    struct FakeResolver {
        contatos: HashMap<Uuid, ContatoDoDeal>,
    }

    #[async_trait]
    impl ContactResolver for FakeResolver {
        async fn resolve(
            &self,
            _empresa_id: Uuid,
            deal_id: Uuid,
        ) -> Result<Option<ContatoDoDeal>, AppError> {
            Ok(self.contatos.get(&deal_id).cloned())
        }
    }

    struct FakeGenerator {
        falha_para: Option<String>,
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn gerar_mensagem(
            &self,
            _instrucao: &str,
            nome_contato: &str,
        ) -> Result<String, AppError> {
            if self.falha_para.as_deref() == Some(nome_contato) {
                return Err(AppError::Integracao("provedor indisponível".into()));
            }
            Ok(format!("Oi {nome_contato}!"))
        }
    }

    struct FakeSender {
        enviados: Mutex<Vec<(String, String)>>,
        rejeitar: Vec<String>,
    }

    impl FakeSender {
        fn novo() -> Self {
            Self {
                enviados: Mutex::new(Vec::new()),
                rejeitar: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ChannelSender for FakeSender {
        async fn enviar(&self, destino: &str, mensagem: &str) -> Result<(), AppError> {
            if self.rejeitar.iter().any(|d| d == destino) {
                return Err(AppError::Integracao("rejeitado".into()));
            }
            self.enviados
                .lock()
                .unwrap()
                .push((destino.to_string(), mensagem.to_string()));
            Ok(())
        }
    }

    fn contato(nome: &str, telefone: Option<&str>) -> ContatoDoDeal {
        ContatoDoDeal {
            nome: nome.to_string(),
            telefone: telefone.map(str::to_string),
            email: None,
        }
    }

    #[tokio::test]
    async fn preview_tem_um_item_por_alvo_mesmo_com_falhas() {
        let (d1, d2, d3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let resolver = FakeResolver {
            contatos: HashMap::from([
                (d1, contato("Maria", Some("551199990001"))),
                (d2, contato("João", Some("551199990002"))),
                (d3, contato("Pedro", Some("551199990003"))),
            ]),
        };
        // A geração falha só para o Pedro
        let generator = FakeGenerator {
            falha_para: Some("Pedro".into()),
        };

        let itens = montar_preview(
            Uuid::new_v4(),
            "convide para a demo",
            &[d1, d2, d3],
            &resolver,
            &generator,
        )
        .await
        .unwrap();

        assert_eq!(itens.len(), 3);
        assert_eq!(itens.iter().filter(|i| i.approved).count(), 2);

        let reprovado = itens.iter().find(|i| !i.approved).unwrap();
        assert_eq!(reprovado.deal_id, d3);
        assert!(reprovado.message.contains("FALHA NA GERAÇÃO"));
    }

    #[tokio::test]
    async fn alvo_sem_contato_entra_reprovado_e_nao_aborta() {
        let d1 = Uuid::new_v4();
        let fantasma = Uuid::new_v4();
        let resolver = FakeResolver {
            contatos: HashMap::from([(d1, contato("Maria", None))]),
        };
        let generator = FakeGenerator { falha_para: None };

        let itens = montar_preview(Uuid::new_v4(), "oi", &[fantasma, d1], &resolver, &generator)
            .await
            .unwrap();

        assert_eq!(itens.len(), 2);
        assert!(!itens[0].approved);
        assert!(itens[1].approved);
    }

    #[tokio::test]
    async fn executor_dispara_somente_os_aprovados() {
        let (d1, d2, d3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let resolver = FakeResolver {
            contatos: HashMap::from([
                (d1, contato("Maria", Some("551199990001"))),
                (d2, contato("João", Some("551199990002"))),
                (d3, contato("Pedro", Some("551199990003"))),
            ]),
        };
        let sender = FakeSender::novo();

        // Cenário do preview com 2 aprovados e 1 reprovado: o executor só
        // recebe os aprovados.
        let aprovados = vec![
            PreviewItem::gerado(d1, "Maria".into(), "Oi Maria!".into()),
            PreviewItem::gerado(d2, "João".into(), "Oi João!".into()),
        ];

        let tally = disparar_aprovados(
            Uuid::new_v4(),
            Canal::Whatsapp,
            &aprovados,
            &resolver,
            &sender,
        )
        .await
        .unwrap();

        assert_eq!(tally.processed, 2);
        assert_eq!(tally.falhas, 0);
        assert_eq!(sender.enviados.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn endereco_ausente_conta_como_falha_e_pula() {
        let d1 = Uuid::new_v4();
        let resolver = FakeResolver {
            contatos: HashMap::from([(d1, contato("Maria", None))]),
        };
        let sender = FakeSender::novo();

        let itens = vec![PreviewItem::gerado(d1, "Maria".into(), "Oi!".into())];
        let tally =
            disparar_aprovados(Uuid::new_v4(), Canal::Whatsapp, &itens, &resolver, &sender)
                .await
                .unwrap();

        assert_eq!(tally.processed, 0);
        assert_eq!(tally.falhas, 1);
        assert!(sender.enviados.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejeicao_do_provedor_vira_falha_parcial() {
        let (d1, d2) = (Uuid::new_v4(), Uuid::new_v4());
        let resolver = FakeResolver {
            contatos: HashMap::from([
                (d1, contato("Maria", Some("551199990001"))),
                (d2, contato("João", Some("551199990002"))),
            ]),
        };
        let mut sender = FakeSender::novo();
        sender.rejeitar = vec!["551199990002".into()];

        let itens = vec![
            PreviewItem::gerado(d1, "Maria".into(), "Oi!".into()),
            PreviewItem::gerado(d2, "João".into(), "Oi!".into()),
        ];
        let tally =
            disparar_aprovados(Uuid::new_v4(), Canal::Whatsapp, &itens, &resolver, &sender)
                .await
                .unwrap();

        // processed < aprovados se e somente se houve falha de envio
        assert_eq!(tally.processed, 1);
        assert_eq!(tally.falhas, 1);
    }

    #[tokio::test]
    async fn lote_vazio_nao_invoca_o_sender() {
        let resolver = FakeResolver {
            contatos: HashMap::new(),
        };
        let sender = FakeSender::novo();

        let tally = disparar_aprovados(Uuid::new_v4(), Canal::Whatsapp, &[], &resolver, &sender)
            .await
            .unwrap();

        assert_eq!(tally.processed, 0);
        assert_eq!(tally.falhas, 0);
        assert!(sender.enviados.lock().unwrap().is_empty());
    }

    #[test]
    fn estado_final_segue_a_regra_do_lote() {
        // lote vazio é sucesso
        assert_eq!(status_final(0, 0), JobStatus::Done);
        // falha parcial continua DONE
        assert_eq!(status_final(3, 2), JobStatus::Done);
        // todos falharam: FAILED
        assert_eq!(status_final(3, 0), JobStatus::Failed);
    }
}
