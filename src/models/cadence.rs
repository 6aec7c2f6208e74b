// src/models/cadence.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::jobs::Canal;

// --- DEFINIÇÃO (a sequência fixa de passos) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cadencia {
    pub id: Uuid,
    #[schema(ignore)]
    pub empresa_id: Uuid,
    #[schema(example = "Follow-up pós-demo")]
    pub nome: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CadenciaStep {
    pub id: Uuid,
    pub cadencia_id: Uuid,
    #[schema(ignore)]
    pub empresa_id: Uuid,
    // 1-based, única dentro da cadência
    #[schema(example = 1)]
    pub ordem: i32,
    pub canal: Canal,
    #[schema(example = "Oi {{primeiro_nome}}, conseguiu ver a proposta?")]
    pub template: String,
    // Espera antes DESTE passo disparar, contada do avanço anterior
    #[schema(example = 24)]
    pub espera_horas: i32,
}

impl CadenciaStep {
    /// Substitui os placeholders do template pelos dados do contato.
    pub fn renderizar(&self, nome_contato: &str) -> String {
        let primeiro_nome = nome_contato.split_whitespace().next().unwrap_or(nome_contato);
        self.template
            .replace("{{nome}}", nome_contato)
            .replace("{{primeiro_nome}}", primeiro_nome)
    }
}

// Passo recebido na criação de uma cadência; a ordem vem da posição na lista.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NovoStep {
    pub canal: Canal,
    #[schema(example = "Oi {{primeiro_nome}}, conseguiu ver a proposta?")]
    pub template: String,
    #[schema(example = 24)]
    pub espera_horas: i32,
}

// --- EXECUÇÃO (o estado de um deal dentro de uma cadência) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "cadence_run_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Ativa,
    Concluida,
    Falha,
    Cancelada,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Ativa)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CadenceRun {
    pub id: Uuid,
    pub cadencia_id: Uuid,
    pub deal_id: Uuid,
    #[schema(ignore)]
    pub empresa_id: Uuid,
    pub status: RunStatus,
    pub last_step_ordem: i32,
    pub next_step_ordem: i32,
    pub next_run_at: DateTime<Utc>,
    pub tentativas: i32,
    #[schema(ignore)]
    pub leased_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CadenceRun {
    /// O passo que este run deve disparar agora (o de ordem next_step_ordem).
    /// None indica definição corrompida (passo removido embaixo do run).
    pub fn step_devido<'a>(&self, steps: &'a [CadenciaStep]) -> Option<&'a CadenciaStep> {
        steps.iter().find(|s| s.ordem == self.next_step_ordem)
    }
}

// Cadência com os passos, para as respostas de detalhe.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CadenciaDetail {
    #[serde(flatten)]
    pub cadencia: Cadencia,
    pub steps: Vec<CadenciaStep>,
}

// O que aconteceu com cada run num tick do runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TickResultado {
    /// Passo disparado e ponteiros avançados.
    Avancou,
    /// Passo final disparado; a run terminou.
    Concluiu,
    /// Disparo falhou; mesmo passo reagendado com backoff.
    Reagendou,
    /// Run foi para FALHA (tentativas esgotadas ou falha permanente).
    Falhou,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TickOutcome {
    pub run_id: Uuid,
    pub cadencia_id: Uuid,
    pub deal_id: Uuid,
    pub resultado: TickResultado,
    pub detalhe: Option<String>,
}

// O que fazer com um run depois de um disparo bem-sucedido.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanoDeAvanco {
    /// Existe próximo passo: avança os ponteiros e reagenda.
    Avancar {
        last_step_ordem: i32,
        next_step_ordem: i32,
        next_run_at: DateTime<Utc>,
    },
    /// Passos esgotados: a cadência termina aqui.
    Concluir { last_step_ordem: i32 },
}

/// Calcula o avanço de um run cujo passo devido acabou de ser disparado
/// com sucesso. Mantém o invariante next_step_ordem = last_step_ordem + 1.
pub fn planejar_avanco(
    run: &CadenceRun,
    steps: &[CadenciaStep],
    agora: DateTime<Utc>,
) -> PlanoDeAvanco {
    let executado = run.next_step_ordem;
    let proximo = executado + 1;

    match steps.iter().find(|s| s.ordem == proximo) {
        Some(step) => PlanoDeAvanco::Avancar {
            last_step_ordem: executado,
            next_step_ordem: proximo,
            next_run_at: agora + Duration::hours(i64::from(step.espera_horas)),
        },
        None => PlanoDeAvanco::Concluir {
            last_step_ordem: executado,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(cadencia_id: Uuid, ordem: i32, espera_horas: i32) -> CadenciaStep {
        CadenciaStep {
            id: Uuid::new_v4(),
            cadencia_id,
            empresa_id: Uuid::new_v4(),
            ordem,
            canal: Canal::Whatsapp,
            template: "Oi {{nome}}".into(),
            espera_horas,
        }
    }

    fn run_no_passo(cadencia_id: Uuid, next_step_ordem: i32) -> CadenceRun {
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

    #[test]
    fn avanco_no_meio_da_cadencia_reagenda_pelo_proximo_passo() {
        let cid = Uuid::new_v4();
        let steps = vec![step(cid, 1, 0), step(cid, 2, 24), step(cid, 3, 48)];
        let run = run_no_passo(cid, 2);
        let agora = Utc::now();

        let plano = planejar_avanco(&run, &steps, agora);
        assert_eq!(
            plano,
            PlanoDeAvanco::Avancar {
                last_step_ordem: 2,
                next_step_ordem: 3,
                next_run_at: agora + Duration::hours(48),
            }
        );
    }

    #[test]
    fn avanco_no_ultimo_passo_conclui() {
        let cid = Uuid::new_v4();
        let steps = vec![step(cid, 1, 0), step(cid, 2, 24), step(cid, 3, 48)];
        let run = run_no_passo(cid, 3);

        let plano = planejar_avanco(&run, &steps, Utc::now());
        assert_eq!(plano, PlanoDeAvanco::Concluir { last_step_ordem: 3 });
    }

    #[test]
    fn avanco_preserva_o_invariante_de_ordem() {
        let cid = Uuid::new_v4();
        let steps = vec![step(cid, 1, 0), step(cid, 2, 6)];
        let run = run_no_passo(cid, 1);

        match planejar_avanco(&run, &steps, Utc::now()) {
            PlanoDeAvanco::Avancar {
                last_step_ordem,
                next_step_ordem,
                ..
            } => assert_eq!(next_step_ordem, last_step_ordem + 1),
            outro => panic!("esperava Avancar, veio {:?}", outro),
        }
    }

    #[test]
    fn step_devido_encontra_pela_ordem() {
        let cid = Uuid::new_v4();
        let steps = vec![step(cid, 1, 0), step(cid, 2, 24)];
        let run = run_no_passo(cid, 2);

        assert_eq!(run.step_devido(&steps).map(|s| s.ordem), Some(2));

        let orfao = run_no_passo(cid, 9);
        assert!(orfao.step_devido(&steps).is_none());
    }

    #[test]
    fn renderizar_substitui_nome_e_primeiro_nome() {
        let mut s = step(Uuid::new_v4(), 1, 0);
        s.template = "Oi {{primeiro_nome}}, tudo bem? Att, time ({{nome}})".into();

        let texto = s.renderizar("Maria da Silva");
        assert_eq!(texto, "Oi Maria, tudo bem? Att, time (Maria da Silva)");
    }
}
