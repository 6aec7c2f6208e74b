// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- CRM ---
        handlers::crm::create_contato,
        handlers::crm::create_deal,

        // --- Disparos ---
        handlers::jobs::create_disparo,
        handlers::jobs::list_disparos,
        handlers::jobs::get_disparo,
        handlers::jobs::review_item,
        handlers::jobs::enviar_disparo,

        // --- Cadências ---
        handlers::cadences::create_cadencia,
        handlers::cadences::list_cadencias,
        handlers::cadences::get_cadencia,
        handlers::cadences::enroll,
        handlers::cadences::list_runs,
        handlers::cadences::tick,
        handlers::cadences::cancel_run,
    ),
    components(
        schemas(
            // --- CRM ---
            models::crm::Contato,
            models::crm::Deal,
            handlers::crm::CreateContatoPayload,
            handlers::crm::CreateDealPayload,

            // --- Disparos ---
            models::jobs::Canal,
            models::jobs::JobTipo,
            models::jobs::JobStatus,
            models::jobs::PreviewItem,
            models::jobs::MassActionJob,
            models::jobs::EnvioResumo,
            handlers::jobs::CreateDisparoPayload,
            handlers::jobs::ReviewItemPayload,

            // --- Cadências ---
            models::cadence::Cadencia,
            models::cadence::CadenciaStep,
            models::cadence::NovoStep,
            models::cadence::CadenciaDetail,
            models::cadence::RunStatus,
            models::cadence::CadenceRun,
            models::cadence::TickResultado,
            models::cadence::TickOutcome,
            handlers::cadences::CreateCadenciaPayload,
            handlers::cadences::EnrollPayload,
            handlers::cadences::TickPayload,
        )
    ),
    tags(
        (name = "CRM", description = "Cadastro de contatos e deals"),
        (name = "Disparos", description = "Campanhas em massa com preview e aprovação"),
        (name = "Cadências", description = "Sequências de outreach com agendamento")
    )
)]
pub struct ApiDoc;
