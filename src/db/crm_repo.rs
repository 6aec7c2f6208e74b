// src/db/crm_repo.rs

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::crm::{Contato, ContatoDoDeal, Deal},
};

// Consultas em tempo de execução (query_as + bind): o crate compila sem
// banco disponível e o schema é validado pelas migrações.
#[derive(Clone)]
pub struct CrmRepository {
    pool: PgPool,
}

impl CrmRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_contato(
        &self,
        empresa_id: Uuid,
        nome: &str,
        telefone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Contato, AppError> {
        let contato = sqlx::query_as::<_, Contato>(
            r#"
            INSERT INTO contatos (empresa_id, nome, telefone, email)
            VALUES ($1, $2, $3, $4)
            RETURNING id, empresa_id, nome, telefone, email, created_at
            "#,
        )
        .bind(empresa_id)
        .bind(nome)
        .bind(telefone)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(contato)
    }

    /// Cria um deal já amarrado a um contato DO MESMO tenant.
    /// O INSERT..SELECT garante que um contato de outra empresa não vira alvo.
    pub async fn create_deal(
        &self,
        empresa_id: Uuid,
        contato_id: Uuid,
        titulo: &str,
        valor: Decimal,
    ) -> Result<Deal, AppError> {
        let deal = sqlx::query_as::<_, Deal>(
            r#"
            INSERT INTO deals (empresa_id, contato_id, titulo, valor)
            SELECT $1, c.id, $3, $4
            FROM contatos c
            WHERE c.id = $2 AND c.empresa_id = $1
            RETURNING id, empresa_id, contato_id, titulo, valor, created_at
            "#,
        )
        .bind(empresa_id)
        .bind(contato_id)
        .bind(titulo)
        .bind(valor)
        .fetch_optional(&self.pool)
        .await?;

        deal.ok_or(AppError::ContatoNotFound)
    }

    /// O Contact Resolver do subsistema de disparos: deal -> contato.
    pub async fn resolve_contato_do_deal(
        &self,
        empresa_id: Uuid,
        deal_id: Uuid,
    ) -> Result<Option<ContatoDoDeal>, AppError> {
        let contato = sqlx::query_as::<_, ContatoDoDeal>(
            r#"
            SELECT c.nome, c.telefone, c.email
            FROM deals d
            INNER JOIN contatos c ON c.id = d.contato_id
            WHERE d.id = $2 AND d.empresa_id = $1
            "#,
        )
        .bind(empresa_id)
        .bind(deal_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contato)
    }
}
