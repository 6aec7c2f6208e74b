// src/integrations.rs

// As portas do subsistema para o mundo externo. Os serviços dependem
// destes traits; as implementações concretas (HTTP) vivem nos submódulos.

use async_trait::async_trait;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::crm::ContatoDoDeal;

pub mod email;
pub mod llm;
pub mod resolver;
pub mod whatsapp;

/// Resolve o contato de um deal (nome + endereços de canal).
/// "Não encontrado" é `Ok(None)`, não é erro.
#[async_trait]
pub trait ContactResolver: Send + Sync {
    async fn resolve(
        &self,
        empresa_id: Uuid,
        deal_id: Uuid,
    ) -> Result<Option<ContatoDoDeal>, AppError>;
}

/// Gera o texto de uma mensagem personalizada para um contato.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn gerar_mensagem(&self, instrucao: &str, nome_contato: &str)
    -> Result<String, AppError>;
}

/// Entrega uma mensagem num endereço de canal.
/// Fire-and-forget: Ok = aceito pelo provedor; não há callback de entrega.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    async fn enviar(&self, destino: &str, mensagem: &str) -> Result<(), AppError>;
}
