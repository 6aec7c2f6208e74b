// src/integrations/resolver.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::db::CrmRepository;
use crate::integrations::ContactResolver;
use crate::models::crm::ContatoDoDeal;

// Implementação do Contact Resolver em cima do banco do CRM.
#[derive(Clone)]
pub struct DbContactResolver {
    repo: CrmRepository,
}

impl DbContactResolver {
    pub fn new(repo: CrmRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ContactResolver for DbContactResolver {
    async fn resolve(
        &self,
        empresa_id: Uuid,
        deal_id: Uuid,
    ) -> Result<Option<ContatoDoDeal>, AppError> {
        self.repo.resolve_contato_do_deal(empresa_id, deal_id).await
    }
}
