// src/db/jobs_repo.rs

use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::jobs::{Canal, JobStatus, JobTipo, MassActionJob, PreviewItem},
};

const COLUNAS_JOB: &str = "id, empresa_id, tipo, canal, instrucao, deal_ids, \
                           messages_preview, status, processed, created_at, updated_at";

#[derive(Clone)]
pub struct JobsRepository {
    pool: PgPool,
}

impl JobsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cria o job já em GENERATING: o Generator roda em seguida.
    pub async fn create_job(
        &self,
        empresa_id: Uuid,
        tipo: JobTipo,
        canal: Canal,
        instrucao: &str,
        deal_ids: &[Uuid],
    ) -> Result<MassActionJob, AppError> {
        let sql = format!(
            r#"
            INSERT INTO mass_action_jobs (empresa_id, tipo, canal, instrucao, deal_ids)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUNAS_JOB}
            "#
        );

        let job = sqlx::query_as::<_, MassActionJob>(&sql)
            .bind(empresa_id)
            .bind(tipo)
            .bind(canal)
            .bind(instrucao)
            .bind(deal_ids)
            .fetch_one(&self.pool)
            .await?;

        Ok(job)
    }

    pub async fn find_job(
        &self,
        empresa_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<MassActionJob>, AppError> {
        let sql = format!(
            "SELECT {COLUNAS_JOB} FROM mass_action_jobs WHERE id = $2 AND empresa_id = $1"
        );

        let job = sqlx::query_as::<_, MassActionJob>(&sql)
            .bind(empresa_id)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    pub async fn list_jobs(
        &self,
        empresa_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MassActionJob>, AppError> {
        let sql = format!(
            r#"
            SELECT {COLUNAS_JOB}
            FROM mass_action_jobs
            WHERE empresa_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        );

        let jobs = sqlx::query_as::<_, MassActionJob>(&sql)
            .bind(empresa_id)
            .bind(limit.clamp(1, 200))
            .fetch_all(&self.pool)
            .await?;

        Ok(jobs)
    }

    /// Grava o preview completo e avança GENERATING -> PREVIEW.
    /// O guard de status no WHERE garante a transição monotônica mesmo
    /// com duas invocações concorrentes sobre o mesmo job.
    pub async fn save_preview(
        &self,
        empresa_id: Uuid,
        job_id: Uuid,
        itens: &[PreviewItem],
    ) -> Result<MassActionJob, AppError> {
        let sql = format!(
            r#"
            UPDATE mass_action_jobs
            SET messages_preview = $3,
                status = 'PREVIEW',
                updated_at = now()
            WHERE id = $2 AND empresa_id = $1 AND status = 'GENERATING'
            RETURNING {COLUNAS_JOB}
            "#
        );

        let job = sqlx::query_as::<_, MassActionJob>(&sql)
            .bind(empresa_id)
            .bind(job_id)
            .bind(Json(itens))
            .fetch_optional(&self.pool)
            .await?;

        job.ok_or(AppError::InvalidJobState {
            esperado: JobStatus::Generating,
        })
    }

    /// A revisão humana só mexe no flag `approved` de um item.
    pub async fn set_item_approval(
        &self,
        empresa_id: Uuid,
        job_id: Uuid,
        deal_id: Uuid,
        approved: bool,
    ) -> Result<MassActionJob, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            SELECT {COLUNAS_JOB}
            FROM mass_action_jobs
            WHERE id = $2 AND empresa_id = $1
            FOR UPDATE
            "#
        );

        let job = sqlx::query_as::<_, MassActionJob>(&sql)
            .bind(empresa_id)
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::JobNotFound)?;

        if job.status != JobStatus::Preview {
            return Err(AppError::InvalidJobState {
                esperado: JobStatus::Preview,
            });
        }

        let mut itens = job.messages_preview.0.clone();
        let item = itens
            .iter_mut()
            .find(|i| i.deal_id == deal_id)
            .ok_or(AppError::PreviewItemNotFound)?;
        item.approved = approved;

        let sql = format!(
            r#"
            UPDATE mass_action_jobs
            SET messages_preview = $3, updated_at = now()
            WHERE id = $2 AND empresa_id = $1
            RETURNING {COLUNAS_JOB}
            "#
        );

        let atualizado = sqlx::query_as::<_, MassActionJob>(&sql)
            .bind(empresa_id)
            .bind(job_id)
            .bind(Json(&itens))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(atualizado)
    }

    /// O claim do Executor: PREVIEW -> SENDING num único UPDATE condicional.
    /// Quem perder a corrida recebe a violação de pré-condição e nada muda.
    pub async fn claim_for_sending(
        &self,
        empresa_id: Uuid,
        job_id: Uuid,
    ) -> Result<MassActionJob, AppError> {
        let sql = format!(
            r#"
            UPDATE mass_action_jobs
            SET status = 'SENDING', updated_at = now()
            WHERE id = $2 AND empresa_id = $1 AND status = 'PREVIEW'
            RETURNING {COLUNAS_JOB}
            "#
        );

        let job = sqlx::query_as::<_, MassActionJob>(&sql)
            .bind(empresa_id)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        match job {
            Some(job) => Ok(job),
            None => {
                // Distingue "não existe" de "estado errado" para o chamador.
                match self.find_job(empresa_id, job_id).await? {
                    Some(_) => Err(AppError::InvalidJobState {
                        esperado: JobStatus::Preview,
                    }),
                    None => Err(AppError::JobNotFound),
                }
            }
        }
    }

    /// Fecha o lote: SENDING -> DONE | FAILED com a contagem final.
    pub async fn finalize(
        &self,
        empresa_id: Uuid,
        job_id: Uuid,
        processed: i32,
        status_final: JobStatus,
    ) -> Result<MassActionJob, AppError> {
        let sql = format!(
            r#"
            UPDATE mass_action_jobs
            SET status = $3, processed = $4, updated_at = now()
            WHERE id = $2 AND empresa_id = $1 AND status = 'SENDING'
            RETURNING {COLUNAS_JOB}
            "#
        );

        let job = sqlx::query_as::<_, MassActionJob>(&sql)
            .bind(empresa_id)
            .bind(job_id)
            .bind(status_final)
            .bind(processed)
            .fetch_optional(&self.pool)
            .await?;

        job.ok_or(AppError::InvalidJobState {
            esperado: JobStatus::Sending,
        })
    }

    /// Marca FAILED um job cuja geração ou envio morreu por erro não
    /// recuperável (o lote não é retomado automaticamente).
    pub async fn mark_failed(&self, empresa_id: Uuid, job_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE mass_action_jobs
            SET status = 'FAILED', updated_at = now()
            WHERE id = $2 AND empresa_id = $1 AND status IN ('GENERATING', 'SENDING')
            "#,
        )
        .bind(empresa_id)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
