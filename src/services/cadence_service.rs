// src/services/cadence_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CadenceRepository,
    integrations::{ChannelSender, ContactResolver},
    models::cadence::{
        Cadencia, CadenceRun, CadenciaDetail, CadenciaStep, NovoStep, PlanoDeAvanco,
        TickOutcome, TickResultado, planejar_avanco,
    },
    models::jobs::Canal,
    services::retry::{DecisaoDeRetentativa, RetryConfig, decidir_retentativa},
};

// Lease de um run reivindicado por um tick. Se a invocação morrer no
// meio, o run volta a ficar elegível depois disso.
const LEASE_SEGUNDOS: i64 = 300;

// O Cadence Runner: inscreve deals em cadências e, a cada tick do
// agendador, dispara o passo devido de cada run vencida.
#[derive(Clone)]
pub struct CadenceService {
    repo: CadenceRepository,
    resolver: Arc<dyn ContactResolver>,
    whatsapp: Arc<dyn ChannelSender>,
    email: Arc<dyn ChannelSender>,
    retry_cfg: RetryConfig,
}

impl CadenceService {
    pub fn new(
        repo: CadenceRepository,
        resolver: Arc<dyn ContactResolver>,
        whatsapp: Arc<dyn ChannelSender>,
        email: Arc<dyn ChannelSender>,
        retry_cfg: RetryConfig,
    ) -> Self {
        Self {
            repo,
            resolver,
            whatsapp,
            email,
            retry_cfg,
        }
    }

    fn sender_para(&self, canal: Canal) -> &dyn ChannelSender {
        match canal {
            Canal::Whatsapp => self.whatsapp.as_ref(),
            Canal::Email => self.email.as_ref(),
        }
    }

    // =========================================================================
    //  DEFINIÇÕES
    // =========================================================================

    pub async fn create_cadencia(
        &self,
        empresa_id: Uuid,
        nome: &str,
        steps: &[NovoStep],
    ) -> Result<CadenciaDetail, AppError> {
        if steps.is_empty() {
            return Err(AppError::CadenciaSemPassos);
        }

        let (cadencia, steps) = self.repo.create_cadencia(empresa_id, nome, steps).await?;
        Ok(CadenciaDetail { cadencia, steps })
    }

    pub async fn list_cadencias(&self, empresa_id: Uuid) -> Result<Vec<Cadencia>, AppError> {
        self.repo.list_cadencias(empresa_id).await
    }

    pub async fn get_cadencia(
        &self,
        empresa_id: Uuid,
        cadencia_id: Uuid,
    ) -> Result<CadenciaDetail, AppError> {
        let cadencia = self
            .repo
            .find_cadencia(empresa_id, cadencia_id)
            .await?
            .ok_or(AppError::CadenciaNotFound)?;
        let steps = self.repo.list_steps(empresa_id, cadencia_id).await?;
        Ok(CadenciaDetail { cadencia, steps })
    }

    // =========================================================================
    //  RUNS
    // =========================================================================

    /// Inscreve o deal: a run nasce ATIVA apontando para o passo 1,
    /// agendada pela espera do próprio passo 1.
    pub async fn enroll(
        &self,
        empresa_id: Uuid,
        cadencia_id: Uuid,
        deal_id: Uuid,
    ) -> Result<CadenceRun, AppError> {
        let steps = self.repo.list_steps(empresa_id, cadencia_id).await?;
        let primeiro = match steps.first() {
            Some(step) => step,
            None => {
                // Cadência inexistente e cadência vazia são erros diferentes
                return match self.repo.find_cadencia(empresa_id, cadencia_id).await? {
                    Some(_) => Err(AppError::CadenciaSemPassos),
                    None => Err(AppError::CadenciaNotFound),
                };
            }
        };

        let next_run_at = Utc::now() + Duration::hours(i64::from(primeiro.espera_horas));

        self.repo
            .activate_run(empresa_id, cadencia_id, deal_id, next_run_at)
            .await?
            .ok_or(AppError::RunJaAtiva)
    }

    pub async fn list_runs(
        &self,
        empresa_id: Uuid,
        cadencia_id: Uuid,
    ) -> Result<Vec<CadenceRun>, AppError> {
        self.repo.list_runs(empresa_id, cadencia_id).await
    }

    /// Saída antecipada de uma run (resposta recebida, deal fechado).
    pub async fn cancel_run(
        &self,
        empresa_id: Uuid,
        run_id: Uuid,
    ) -> Result<CadenceRun, AppError> {
        self.repo.cancel_run(empresa_id, run_id).await
    }

    /// Um tick do runner: reivindica um lote limitado de runs vencidas e
    /// processa cada uma de forma independente — a falha de um disparo
    /// nunca bloqueia os demais. Sem runs vencidas, o tick é um no-op.
    pub async fn tick(
        &self,
        empresa_id: Uuid,
        limite: i64,
    ) -> Result<Vec<TickOutcome>, AppError> {
        let runs = self
            .repo
            .claim_due_runs(empresa_id, limite, LEASE_SEGUNDOS)
            .await?;

        let mut outcomes = Vec::with_capacity(runs.len());
        let mut steps_por_cadencia: HashMap<Uuid, Vec<CadenciaStep>> = HashMap::new();

        for run in runs {
            if !steps_por_cadencia.contains_key(&run.cadencia_id) {
                let steps = self.repo.list_steps(empresa_id, run.cadencia_id).await?;
                steps_por_cadencia.insert(run.cadencia_id, steps);
            }
            let steps = &steps_por_cadencia[&run.cadencia_id];

            let outcome = self.processar_run(empresa_id, &run, steps).await?;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn processar_run(
        &self,
        empresa_id: Uuid,
        run: &CadenceRun,
        steps: &[CadenciaStep],
    ) -> Result<TickOutcome, AppError> {
        let Some(step) = run.step_devido(steps) else {
            // Definição corrompida (passo sumiu embaixo da run)
            tracing::error!(run_id = %run.id, ordem = run.next_step_ordem, "passo devido não existe");
            self.repo.mark_falha(empresa_id, run.id).await?;
            return Ok(outcome(run, TickResultado::Falhou, Some("passo inexistente".into())));
        };

        let disparo = disparar_step(
            empresa_id,
            run,
            step,
            self.resolver.as_ref(),
            self.sender_para(step.canal),
        )
        .await;

        match disparo {
            Ok(()) => match planejar_avanco(run, steps, Utc::now()) {
                PlanoDeAvanco::Avancar {
                    last_step_ordem,
                    next_step_ordem,
                    next_run_at,
                } => {
                    self.repo
                        .advance_run(empresa_id, run.id, last_step_ordem, next_step_ordem, next_run_at)
                        .await?;
                    Ok(outcome(run, TickResultado::Avancou, None))
                }
                PlanoDeAvanco::Concluir { last_step_ordem } => {
                    self.repo
                        .conclude_run(empresa_id, run.id, last_step_ordem)
                        .await?;
                    Ok(outcome(run, TickResultado::Concluiu, None))
                }
            },
            Err(FalhaDeDisparo::Permanente(motivo)) => {
                tracing::warn!(run_id = %run.id, "falha permanente: {}", motivo);
                self.repo.mark_falha(empresa_id, run.id).await?;
                Ok(outcome(run, TickResultado::Falhou, Some(motivo)))
            }
            Err(FalhaDeDisparo::Transitoria(motivo)) => {
                match decidir_retentativa(run.tentativas, &self.retry_cfg, Utc::now()) {
                    DecisaoDeRetentativa::Reagendar {
                        tentativas,
                        next_run_at,
                    } => {
                        tracing::warn!(
                            run_id = %run.id,
                            tentativas,
                            "disparo falhou, reagendado: {}",
                            motivo
                        );
                        self.repo
                            .reschedule_retry(empresa_id, run.id, next_run_at, tentativas)
                            .await?;
                        Ok(outcome(run, TickResultado::Reagendou, Some(motivo)))
                    }
                    DecisaoDeRetentativa::Desistir => {
                        tracing::warn!(run_id = %run.id, "tentativas esgotadas: {}", motivo);
                        self.repo.mark_falha(empresa_id, run.id).await?;
                        Ok(outcome(run, TickResultado::Falhou, Some(motivo)))
                    }
                }
            }
        }
    }
}

fn outcome(run: &CadenceRun, resultado: TickResultado, detalhe: Option<String>) -> TickOutcome {
    TickOutcome {
        run_id: run.id,
        cadencia_id: run.cadencia_id,
        deal_id: run.deal_id,
        resultado,
        detalhe,
    }
}

// Classificação de falha de disparo, no espírito do resto do sistema:
// permanente não adianta repetir; transitória entra no backoff.
#[derive(Debug)]
enum FalhaDeDisparo {
    Permanente(String),
    Transitoria(String),
}

/// Renderiza e envia o passo devido de uma run.
async fn disparar_step(
    empresa_id: Uuid,
    run: &CadenceRun,
    step: &CadenciaStep,
    resolver: &dyn ContactResolver,
    sender: &dyn ChannelSender,
) -> Result<(), FalhaDeDisparo> {
    let contato = match resolver.resolve(empresa_id, run.deal_id).await {
        Ok(Some(contato)) => contato,
        Ok(None) => {
            return Err(FalhaDeDisparo::Permanente("contato não encontrado".into()));
        }
        Err(e) => return Err(FalhaDeDisparo::Transitoria(e.to_string())),
    };

    let Some(destino) = contato.endereco(step.canal) else {
        return Err(FalhaDeDisparo::Permanente(format!(
            "contato sem endereço no canal {:?}",
            step.canal
        )));
    };

    let mensagem = step.renderizar(&contato.nome);

    sender
        .enviar(destino, &mensagem)
        .await
        .map_err(|e| FalhaDeDisparo::Transitoria(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::models::cadence::RunStatus;
    use crate::models::crm::ContatoDoDeal;

    struct FakeResolver {
        contato: Option<ContatoDoDeal>,
    }

    #[async_trait]
    impl ContactResolver for FakeResolver {
        async fn resolve(
            &self,
            _empresa_id: Uuid,
            _deal_id: Uuid,
        ) -> Result<Option<ContatoDoDeal>, AppError> {
            Ok(self.contato.clone())
        }
    }

    struct FakeSender {
        enviados: Mutex<Vec<(String, String)>>,
        falhar: bool,
    }

    #[async_trait]
    impl ChannelSender for FakeSender {
        async fn enviar(&self, destino: &str, mensagem: &str) -> Result<(), AppError> {
            if self.falhar {
                return Err(AppError::Integracao("provedor fora".into()));
            }
            self.enviados
                .lock()
                .unwrap()
                .push((destino.to_string(), mensagem.to_string()));
            Ok(())
        }
    }

    fn run_de_teste(cadencia_id: Uuid, next_step_ordem: i32) -> CadenceRun {
        let agora = Utc::now();
        CadenceRun {
            id: Uuid::new_v4(),
            cadencia_id,
            deal_id: Uuid::new_v4(),
            empresa_id: Uuid::new_v4(),
            status: RunStatus::Ativa,
            last_step_ordem: next_step_ordem - 1,
            next_step_ordem,
            next_run_at: agora,
            tentativas: 0,
            leased_until: None,
            created_at: agora,
            updated_at: agora,
        }
    }

    fn step_de_teste(cadencia_id: Uuid, ordem: i32) -> CadenciaStep {
        CadenciaStep {
            id: Uuid::new_v4(),
            cadencia_id,
            empresa_id: Uuid::new_v4(),
            ordem,
            canal: Canal::Whatsapp,
            template: "Oi {{primeiro_nome}}, passando para lembrar da proposta.".into(),
            espera_horas: 24,
        }
    }

    #[tokio::test]
    async fn disparo_renderiza_o_template_com_o_contato() {
        let cid = Uuid::new_v4();
        let run = run_de_teste(cid, 1);
        let step = step_de_teste(cid, 1);
        let resolver = FakeResolver {
            contato: Some(ContatoDoDeal {
                nome: "Maria da Silva".into(),
                telefone: Some("551199990001".into()),
                email: None,
            }),
        };
        let sender = FakeSender {
            enviados: Mutex::new(Vec::new()),
            falhar: false,
        };

        disparar_step(Uuid::new_v4(), &run, &step, &resolver, &sender)
            .await
            .unwrap();

        let enviados = sender.enviados.lock().unwrap();
        assert_eq!(enviados.len(), 1);
        assert_eq!(enviados[0].0, "551199990001");
        assert_eq!(
            enviados[0].1,
            "Oi Maria, passando para lembrar da proposta."
        );
    }

    #[tokio::test]
    async fn contato_inexistente_e_falha_permanente() {
        let cid = Uuid::new_v4();
        let run = run_de_teste(cid, 1);
        let step = step_de_teste(cid, 1);
        let resolver = FakeResolver { contato: None };
        let sender = FakeSender {
            enviados: Mutex::new(Vec::new()),
            falhar: false,
        };

        let err = disparar_step(Uuid::new_v4(), &run, &step, &resolver, &sender)
            .await
            .unwrap_err();
        assert!(matches!(err, FalhaDeDisparo::Permanente(_)));
    }

    #[tokio::test]
    async fn sem_endereco_no_canal_e_falha_permanente() {
        let cid = Uuid::new_v4();
        let run = run_de_teste(cid, 1);
        let step = step_de_teste(cid, 1); // canal WHATSAPP
        let resolver = FakeResolver {
            contato: Some(ContatoDoDeal {
                nome: "Maria".into(),
                telefone: None,
                email: Some("maria@email.com".into()),
            }),
        };
        let sender = FakeSender {
            enviados: Mutex::new(Vec::new()),
            falhar: false,
        };

        let err = disparar_step(Uuid::new_v4(), &run, &step, &resolver, &sender)
            .await
            .unwrap_err();
        assert!(matches!(err, FalhaDeDisparo::Permanente(_)));
    }

    #[tokio::test]
    async fn rejeicao_do_provedor_e_falha_transitoria() {
        let cid = Uuid::new_v4();
        let run = run_de_teste(cid, 1);
        let step = step_de_teste(cid, 1);
        let resolver = FakeResolver {
            contato: Some(ContatoDoDeal {
                nome: "Maria".into(),
                telefone: Some("551199990001".into()),
                email: None,
            }),
        };
        let sender = FakeSender {
            enviados: Mutex::new(Vec::new()),
            falhar: true,
        };

        let err = disparar_step(Uuid::new_v4(), &run, &step, &resolver, &sender)
            .await
            .unwrap_err();
        assert!(matches!(err, FalhaDeDisparo::Transitoria(_)));
    }
}
