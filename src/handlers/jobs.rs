// src/handlers/jobs.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, tenancy::EmpresaContext},
    models::jobs::{Canal, EnvioResumo, JobTipo, MassActionJob},
};

// =============================================================================
//  DISPAROS EM MASSA (mass_action_jobs)
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDisparoPayload {
    pub canal: Canal,

    // Quando omitido é uma campanha ad-hoc disparada da tela de deals
    pub tipo: Option<JobTipo>,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Convide para a demo de sexta, tom informal")]
    pub instrucao: String,

    // A lista já deve vir deduplicada pelo chamador
    pub deal_ids: Vec<Uuid>,
}

// POST /api/disparos
#[utoipa::path(
    post,
    path = "/api/disparos",
    tag = "Disparos",
    request_body = CreateDisparoPayload,
    responses(
        (status = 201, description = "Job criado com o preview gerado, aguardando aprovação", body = MassActionJob),
        (status = 400, description = "Dados inválidos")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn create_disparo(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Json(payload): Json<CreateDisparoPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale.0))?;

    let job = app_state
        .mass_action_service
        .create_and_generate(
            empresa.0,
            payload.tipo.unwrap_or(JobTipo::CampanhaAdhoc),
            payload.canal,
            &payload.instrucao,
            &payload.deal_ids,
        )
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Debug, Deserialize)]
pub struct ListDisparosParams {
    pub limit: Option<i64>,
}

// GET /api/disparos
#[utoipa::path(
    get,
    path = "/api/disparos",
    tag = "Disparos",
    responses(
        (status = 200, description = "Jobs do tenant, mais recentes primeiro", body = Vec<MassActionJob>)
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa"),
        ("limit" = Option<i64>, Query, description = "Máximo de jobs (padrão 50)")
    )
)]
pub async fn list_disparos(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Query(params): Query<ListDisparosParams>,
) -> Result<impl IntoResponse, ApiError> {
    let jobs = app_state
        .mass_action_service
        .list_jobs(empresa.0, params.limit.unwrap_or(50))
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::OK, Json(jobs)))
}

// GET /api/disparos/{id}
#[utoipa::path(
    get,
    path = "/api/disparos/{id}",
    tag = "Disparos",
    responses(
        (status = 200, description = "Job com o preview completo", body = MassActionJob),
        (status = 404, description = "Job não encontrado")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa"),
        ("id" = Uuid, Path, description = "ID do job")
    )
)]
pub async fn get_disparo(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = app_state
        .mass_action_service
        .find_job(empresa.0, job_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::OK, Json(job)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItemPayload {
    pub approved: bool,
}

// PATCH /api/disparos/{id}/itens/{deal_id}
#[utoipa::path(
    patch,
    path = "/api/disparos/{id}/itens/{deal_id}",
    tag = "Disparos",
    request_body = ReviewItemPayload,
    responses(
        (status = 200, description = "Item revisado; job atualizado", body = MassActionJob),
        (status = 404, description = "Job ou item não encontrado"),
        (status = 409, description = "Job fora de PREVIEW")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa"),
        ("id" = Uuid, Path, description = "ID do job"),
        ("deal_id" = Uuid, Path, description = "Deal do item de preview")
    )
)]
pub async fn review_item(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Path((job_id, deal_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let job = app_state
        .mass_action_service
        .review_item(empresa.0, job_id, deal_id, payload.approved)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::OK, Json(job)))
}

// POST /api/disparos/{id}/enviar
#[utoipa::path(
    post,
    path = "/api/disparos/{id}/enviar",
    tag = "Disparos",
    responses(
        (status = 200, description = "Lote encerrado com as contagens finais", body = EnvioResumo),
        (status = 404, description = "Job não encontrado"),
        (status = 409, description = "Job fora de PREVIEW: a operação é recusada e nada muda")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa"),
        ("id" = Uuid, Path, description = "ID do job")
    )
)]
pub async fn enviar_disparo(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let resumo = app_state
        .mass_action_service
        .execute(empresa.0, job_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::OK, Json(resumo)))
}
