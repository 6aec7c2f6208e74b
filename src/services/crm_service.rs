// src/services/crm_service.rs

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CrmRepository,
    models::crm::{Contato, Deal},
};

// Cadastro mínimo de contatos e deals: é o que alimenta o Contact
// Resolver dos disparos e das cadências.
#[derive(Clone)]
pub struct CrmService {
    repo: CrmRepository,
}

impl CrmService {
    pub fn new(repo: CrmRepository) -> Self {
        Self { repo }
    }

    pub async fn create_contato(
        &self,
        empresa_id: Uuid,
        nome: &str,
        telefone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Contato, AppError> {
        self.repo
            .create_contato(empresa_id, nome, telefone, email)
            .await
    }

    pub async fn create_deal(
        &self,
        empresa_id: Uuid,
        contato_id: Uuid,
        titulo: &str,
        valor: Decimal,
    ) -> Result<Deal, AppError> {
        self.repo
            .create_deal(empresa_id, contato_id, titulo, valor)
            .await
    }
}
