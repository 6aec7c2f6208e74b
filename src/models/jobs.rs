// src/models/jobs.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::ToSchema;
use uuid::Uuid;

// --- ENUMS ---

// Mapeia o CREATE TYPE canal_envio do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "canal_envio", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Canal {
    Whatsapp,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "mass_action_tipo", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobTipo {
    CampanhaAdhoc,
    Cadencia,
}

// O funil de estados do job. Só anda para frente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "mass_action_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Generating,
    Preview,
    Sending,
    Done,
    Failed,
}

impl JobStatus {
    /// DONE e FAILED são finais: nenhuma transição sai deles.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Transições permitidas (monotônicas, sem regressão):
    /// GENERATING -> PREVIEW | FAILED
    /// PREVIEW    -> SENDING
    /// SENDING    -> DONE | FAILED
    pub fn pode_avancar_para(self, novo: JobStatus) -> bool {
        matches!(
            (self, novo),
            (JobStatus::Generating, JobStatus::Preview)
                | (JobStatus::Generating, JobStatus::Failed)
                | (JobStatus::Preview, JobStatus::Sending)
                | (JobStatus::Sending, JobStatus::Done)
                | (JobStatus::Sending, JobStatus::Failed)
        )
    }
}

// --- ITEM DE PREVIEW ---

// Uma mensagem gerada, ainda não enviada, aguardando aprovação humana.
// Vive dentro do JSONB messages_preview do job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewItem {
    pub deal_id: Uuid,
    #[schema(example = "Maria da Silva")]
    pub contact_name: String,
    pub message: String,
    pub approved: bool,
}

impl PreviewItem {
    /// Item gerado com sucesso: nasce aprovado.
    pub fn gerado(deal_id: Uuid, contact_name: String, message: String) -> Self {
        Self {
            deal_id,
            contact_name,
            message,
            approved: true,
        }
    }

    /// Item cujo alvo não resolveu ou cuja geração falhou.
    /// Entra na lista mesmo assim (a contagem de itens é sempre igual
    /// à contagem de alvos), mas reprovado e com a mensagem de erro.
    pub fn com_falha(deal_id: Uuid, contact_name: String, erro: &str) -> Self {
        Self {
            deal_id,
            contact_name,
            message: format!("[FALHA NA GERAÇÃO] {}", erro),
            approved: false,
        }
    }
}

// --- JOB ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MassActionJob {
    pub id: Uuid,
    #[schema(ignore)]
    pub empresa_id: Uuid,
    pub tipo: JobTipo,
    pub canal: Canal,
    #[schema(example = "Convide para a demo de sexta, tom informal")]
    pub instrucao: String,
    pub deal_ids: Vec<Uuid>,
    #[schema(value_type = Vec<PreviewItem>)]
    pub messages_preview: Json<Vec<PreviewItem>>,
    pub status: JobStatus,
    pub processed: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MassActionJob {
    /// Itens que o Executor vai de fato disparar.
    pub fn itens_aprovados(&self) -> impl Iterator<Item = &PreviewItem> {
        self.messages_preview.0.iter().filter(|i| i.approved)
    }
}

// Resumo devolvido pelo Executor ao final do lote.
// Falhas individuais aparecem só em agregado (contagem), não por item.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvioResumo {
    pub processed: i32,
    pub failed: i32,
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funil_de_status_anda_so_para_frente() {
        assert!(JobStatus::Generating.pode_avancar_para(JobStatus::Preview));
        assert!(JobStatus::Preview.pode_avancar_para(JobStatus::Sending));
        assert!(JobStatus::Sending.pode_avancar_para(JobStatus::Done));
        assert!(JobStatus::Sending.pode_avancar_para(JobStatus::Failed));

        // Regressões nunca são aceitas
        assert!(!JobStatus::Preview.pode_avancar_para(JobStatus::Generating));
        assert!(!JobStatus::Sending.pode_avancar_para(JobStatus::Preview));
        assert!(!JobStatus::Done.pode_avancar_para(JobStatus::Sending));
    }

    #[test]
    fn estados_finais_nao_tem_saida() {
        for novo in [
            JobStatus::Generating,
            JobStatus::Preview,
            JobStatus::Sending,
            JobStatus::Done,
            JobStatus::Failed,
        ] {
            assert!(!JobStatus::Done.pode_avancar_para(novo));
            assert!(!JobStatus::Failed.pode_avancar_para(novo));
        }
    }

    #[test]
    fn generating_nao_pula_direto_para_envio() {
        assert!(!JobStatus::Generating.pode_avancar_para(JobStatus::Sending));
        assert!(!JobStatus::Generating.pode_avancar_para(JobStatus::Done));
    }

    #[test]
    fn item_com_falha_nasce_reprovado() {
        let deal = Uuid::new_v4();
        let item = PreviewItem::com_falha(deal, "?".into(), "contato não encontrado");
        assert!(!item.approved);
        assert!(item.message.contains("contato não encontrado"));

        let ok = PreviewItem::gerado(deal, "Maria".into(), "Olá!".into());
        assert!(ok.approved);
    }

    #[test]
    fn preview_item_serializa_em_camel_case() {
        let item = PreviewItem::gerado(Uuid::new_v4(), "Maria".into(), "Oi".into());
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("dealId").is_some());
        assert!(json.get("contactName").is_some());
        assert_eq!(json["approved"], serde_json::json!(true));
    }
}
