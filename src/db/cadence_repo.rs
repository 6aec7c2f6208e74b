// src/db/cadence_repo.rs

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::cadence::{Cadencia, CadenceRun, CadenciaStep, NovoStep},
};

const COLUNAS_RUN: &str = "id, cadencia_id, deal_id, empresa_id, status, last_step_ordem, \
                           next_step_ordem, next_run_at, tentativas, leased_until, \
                           created_at, updated_at";

const COLUNAS_STEP: &str = "id, cadencia_id, empresa_id, ordem, canal, template, espera_horas";

#[derive(Clone)]
pub struct CadenceRepository {
    pool: PgPool,
}

impl CadenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  DEFINIÇÕES (cadências e passos)
    // =========================================================================

    /// Cria a cadência com todos os passos numa transação.
    /// A ordem é 1-based e segue a posição na lista recebida.
    pub async fn create_cadencia(
        &self,
        empresa_id: Uuid,
        nome: &str,
        steps: &[NovoStep],
    ) -> Result<(Cadencia, Vec<CadenciaStep>), AppError> {
        let mut tx = self.pool.begin().await?;

        let cadencia = sqlx::query_as::<_, Cadencia>(
            r#"
            INSERT INTO cadencias (empresa_id, nome)
            VALUES ($1, $2)
            RETURNING id, empresa_id, nome, created_at
            "#,
        )
        .bind(empresa_id)
        .bind(nome)
        .fetch_one(&mut *tx)
        .await?;

        let mut criados = Vec::with_capacity(steps.len());
        for (indice, step) in steps.iter().enumerate() {
            let sql = format!(
                r#"
                INSERT INTO cadencia_steps (cadencia_id, empresa_id, ordem, canal, template, espera_horas)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {COLUNAS_STEP}
                "#
            );

            let criado = sqlx::query_as::<_, CadenciaStep>(&sql)
                .bind(cadencia.id)
                .bind(empresa_id)
                .bind(indice as i32 + 1)
                .bind(step.canal)
                .bind(&step.template)
                .bind(step.espera_horas)
                .fetch_one(&mut *tx)
                .await?;
            criados.push(criado);
        }

        tx.commit().await?;

        Ok((cadencia, criados))
    }

    pub async fn find_cadencia(
        &self,
        empresa_id: Uuid,
        cadencia_id: Uuid,
    ) -> Result<Option<Cadencia>, AppError> {
        let cadencia = sqlx::query_as::<_, Cadencia>(
            "SELECT id, empresa_id, nome, created_at FROM cadencias WHERE id = $2 AND empresa_id = $1",
        )
        .bind(empresa_id)
        .bind(cadencia_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cadencia)
    }

    pub async fn list_cadencias(&self, empresa_id: Uuid) -> Result<Vec<Cadencia>, AppError> {
        let cadencias = sqlx::query_as::<_, Cadencia>(
            r#"
            SELECT id, empresa_id, nome, created_at
            FROM cadencias
            WHERE empresa_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(empresa_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cadencias)
    }

    pub async fn list_steps(
        &self,
        empresa_id: Uuid,
        cadencia_id: Uuid,
    ) -> Result<Vec<CadenciaStep>, AppError> {
        let sql = format!(
            r#"
            SELECT {COLUNAS_STEP}
            FROM cadencia_steps
            WHERE cadencia_id = $2 AND empresa_id = $1
            ORDER BY ordem ASC
            "#
        );

        let steps = sqlx::query_as::<_, CadenciaStep>(&sql)
            .bind(empresa_id)
            .bind(cadencia_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(steps)
    }

    // =========================================================================
    //  RUNS (execução)
    // =========================================================================

    /// Inscreve um deal na cadência. O índice único parcial garante no
    /// máximo uma run ATIVA por (cadência, deal); conflito devolve None.
    pub async fn activate_run(
        &self,
        empresa_id: Uuid,
        cadencia_id: Uuid,
        deal_id: Uuid,
        next_run_at: DateTime<Utc>,
    ) -> Result<Option<CadenceRun>, AppError> {
        let sql = format!(
            r#"
            INSERT INTO cadence_runs (cadencia_id, deal_id, empresa_id, next_run_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cadencia_id, deal_id) WHERE status = 'ATIVA' DO NOTHING
            RETURNING {COLUNAS_RUN}
            "#
        );

        let run = sqlx::query_as::<_, CadenceRun>(&sql)
            .bind(cadencia_id)
            .bind(deal_id)
            .bind(empresa_id)
            .bind(next_run_at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(run)
    }

    pub async fn find_run(
        &self,
        empresa_id: Uuid,
        run_id: Uuid,
    ) -> Result<Option<CadenceRun>, AppError> {
        let sql =
            format!("SELECT {COLUNAS_RUN} FROM cadence_runs WHERE id = $2 AND empresa_id = $1");

        let run = sqlx::query_as::<_, CadenceRun>(&sql)
            .bind(empresa_id)
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(run)
    }

    pub async fn list_runs(
        &self,
        empresa_id: Uuid,
        cadencia_id: Uuid,
    ) -> Result<Vec<CadenceRun>, AppError> {
        let sql = format!(
            r#"
            SELECT {COLUNAS_RUN}
            FROM cadence_runs
            WHERE cadencia_id = $2 AND empresa_id = $1
            ORDER BY created_at DESC
            "#
        );

        let runs = sqlx::query_as::<_, CadenceRun>(&sql)
            .bind(empresa_id)
            .bind(cadencia_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(runs)
    }

    /// O claim do tick: marca um lote limitado de runs vencidas com um
    /// lease e devolve só o que este invocador conseguiu reivindicar.
    /// FOR UPDATE SKIP LOCKED + lease fecham a janela de processamento
    /// duplo entre invocações concorrentes; o lease expira sozinho se a
    /// invocação morrer no meio do lote.
    pub async fn claim_due_runs(
        &self,
        empresa_id: Uuid,
        limite: i64,
        lease_segundos: i64,
    ) -> Result<Vec<CadenceRun>, AppError> {
        let sql = format!(
            r#"
            UPDATE cadence_runs
            SET leased_until = now() + ($3::int * interval '1 second'),
                updated_at = now()
            WHERE id IN (
                SELECT id
                FROM cadence_runs
                WHERE empresa_id = $1
                  AND status = 'ATIVA'
                  AND next_run_at <= now()
                  AND (leased_until IS NULL OR leased_until < now())
                ORDER BY next_run_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {COLUNAS_RUN}
            "#
        );

        let runs = sqlx::query_as::<_, CadenceRun>(&sql)
            .bind(empresa_id)
            .bind(limite.clamp(1, 500))
            .bind(lease_segundos)
            .fetch_all(&self.pool)
            .await?;

        Ok(runs)
    }

    /// Avança os ponteiros depois de um disparo bem-sucedido.
    /// O guard em next_step_ordem descarta escritores atrasados.
    pub async fn advance_run(
        &self,
        empresa_id: Uuid,
        run_id: Uuid,
        executado: i32,
        proximo: i32,
        next_run_at: DateTime<Utc>,
    ) -> Result<CadenceRun, AppError> {
        let sql = format!(
            r#"
            UPDATE cadence_runs
            SET last_step_ordem = $3,
                next_step_ordem = $4,
                next_run_at = $5,
                tentativas = 0,
                leased_until = NULL,
                updated_at = now()
            WHERE id = $2 AND empresa_id = $1
              AND status = 'ATIVA' AND next_step_ordem = $3
            RETURNING {COLUNAS_RUN}
            "#
        );

        let run = sqlx::query_as::<_, CadenceRun>(&sql)
            .bind(empresa_id)
            .bind(run_id)
            .bind(executado)
            .bind(proximo)
            .bind(next_run_at)
            .fetch_optional(&self.pool)
            .await?;

        run.ok_or(AppError::RunNaoAtiva)
    }

    /// Passos esgotados: ATIVA -> CONCLUIDA.
    pub async fn conclude_run(
        &self,
        empresa_id: Uuid,
        run_id: Uuid,
        executado: i32,
    ) -> Result<CadenceRun, AppError> {
        let sql = format!(
            r#"
            UPDATE cadence_runs
            SET status = 'CONCLUIDA',
                last_step_ordem = $3,
                leased_until = NULL,
                updated_at = now()
            WHERE id = $2 AND empresa_id = $1
              AND status = 'ATIVA' AND next_step_ordem = $3
            RETURNING {COLUNAS_RUN}
            "#
        );

        let run = sqlx::query_as::<_, CadenceRun>(&sql)
            .bind(empresa_id)
            .bind(run_id)
            .bind(executado)
            .fetch_optional(&self.pool)
            .await?;

        run.ok_or(AppError::RunNaoAtiva)
    }

    /// Reagenda o MESMO passo após uma falha de disparo (o passo não avança).
    pub async fn reschedule_retry(
        &self,
        empresa_id: Uuid,
        run_id: Uuid,
        next_run_at: DateTime<Utc>,
        tentativas: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE cadence_runs
            SET next_run_at = $3,
                tentativas = $4,
                leased_until = NULL,
                updated_at = now()
            WHERE id = $2 AND empresa_id = $1 AND status = 'ATIVA'
            "#,
        )
        .bind(empresa_id)
        .bind(run_id)
        .bind(next_run_at)
        .bind(tentativas)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Tentativas esgotadas: ATIVA -> FALHA (fica para revisão do operador).
    pub async fn mark_falha(&self, empresa_id: Uuid, run_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE cadence_runs
            SET status = 'FALHA', leased_until = NULL, updated_at = now()
            WHERE id = $2 AND empresa_id = $1 AND status = 'ATIVA'
            "#,
        )
        .bind(empresa_id)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Saída antecipada (resposta recebida, deal fechado): ATIVA -> CANCELADA.
    pub async fn cancel_run(
        &self,
        empresa_id: Uuid,
        run_id: Uuid,
    ) -> Result<CadenceRun, AppError> {
        let sql = format!(
            r#"
            UPDATE cadence_runs
            SET status = 'CANCELADA', leased_until = NULL, updated_at = now()
            WHERE id = $2 AND empresa_id = $1 AND status = 'ATIVA'
            RETURNING {COLUNAS_RUN}
            "#
        );

        let run = sqlx::query_as::<_, CadenceRun>(&sql)
            .bind(empresa_id)
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;

        match run {
            Some(run) => Ok(run),
            None => match self.find_run(empresa_id, run_id).await? {
                Some(_) => Err(AppError::RunNaoAtiva),
                None => Err(AppError::RunNotFound),
            },
        }
    }
}
