// src/config.rs

use std::sync::Arc;
use std::{env, time::Duration};

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::db::{CadenceRepository, CrmRepository, JobsRepository};
use crate::integrations::{
    ChannelSender, ContactResolver, TextGenerator, email::EmailSender, llm::LlmClient,
    resolver::DbContactResolver, whatsapp::WhatsappSender,
};
use crate::services::{CadenceService, CrmService, MassActionService, retry::RetryConfig};

const LLM_API_URL_PADRAO: &str = "https://api.anthropic.com/v1/messages";
const WHATSAPP_API_URL_PADRAO: &str = "https://graph.facebook.com/v21.0";

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub crm_service: CrmService,
    pub mass_action_service: MassActionService,
    pub cadence_service: CadenceService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");

        // Conecta ao banco, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Integrações externas ---
        let llm = LlmClient::new(
            env::var("LLM_API_KEY").expect("LLM_API_KEY deve ser definida"),
            env::var("LLM_MODEL").expect("LLM_MODEL deve ser definido"),
            env::var("LLM_API_URL").unwrap_or_else(|_| LLM_API_URL_PADRAO.to_string()),
        );
        let whatsapp = WhatsappSender::new(
            env::var("WHATSAPP_API_URL").unwrap_or_else(|_| WHATSAPP_API_URL_PADRAO.to_string()),
            env::var("WHATSAPP_PHONE_NUMBER_ID").expect("WHATSAPP_PHONE_NUMBER_ID deve ser definido"),
            env::var("WHATSAPP_TOKEN").expect("WHATSAPP_TOKEN deve ser definido"),
        );
        let email = EmailSender::new(
            env::var("EMAIL_API_URL").expect("EMAIL_API_URL deve ser definida"),
            env::var("EMAIL_API_KEY").expect("EMAIL_API_KEY deve ser definida"),
            env::var("EMAIL_FROM").expect("EMAIL_FROM deve ser definido"),
        );

        // --- Monta o gráfico de dependências ---
        let crm_repo = CrmRepository::new(db_pool.clone());
        let jobs_repo = JobsRepository::new(db_pool.clone());
        let cadence_repo = CadenceRepository::new(db_pool.clone());

        let resolver: Arc<dyn ContactResolver> = Arc::new(DbContactResolver::new(crm_repo.clone()));
        let generator: Arc<dyn TextGenerator> = Arc::new(llm);
        let whatsapp: Arc<dyn ChannelSender> = Arc::new(whatsapp);
        let email: Arc<dyn ChannelSender> = Arc::new(email);

        let crm_service = CrmService::new(crm_repo);
        let mass_action_service = MassActionService::new(
            jobs_repo,
            resolver.clone(),
            generator,
            whatsapp.clone(),
            email.clone(),
        );
        let cadence_service = CadenceService::new(
            cadence_repo,
            resolver,
            whatsapp,
            email,
            RetryConfig::default(),
        );

        Ok(Self {
            db_pool,
            crm_service,
            mass_action_service,
            cadence_service,
        })
    }
}
