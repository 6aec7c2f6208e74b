// src/handlers/cadences.rs

use axum::{
    Json,
    extract::{Path, State},
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
    models::cadence::{Cadencia, CadenceRun, CadenciaDetail, NovoStep, TickOutcome},
};

// =============================================================================
//  DEFINIÇÕES DE CADÊNCIA
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCadenciaPayload {
    #[validate(length(min = 2, message = "required"))]
    #[schema(example = "Follow-up pós-demo")]
    pub nome: String,

    // Os passos na ordem de execução; a espera é contada do passo anterior
    #[validate(length(min = 1, message = "required"))]
    pub steps: Vec<NovoStep>,
}

// POST /api/cadencias
#[utoipa::path(
    post,
    path = "/api/cadencias",
    tag = "Cadências",
    request_body = CreateCadenciaPayload,
    responses(
        (status = 201, description = "Cadência criada com os passos", body = CadenciaDetail),
        (status = 400, description = "Dados inválidos")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn create_cadencia(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Json(payload): Json<CreateCadenciaPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale.0))?;

    let detail = app_state
        .cadence_service
        .create_cadencia(empresa.0, &payload.nome, &payload.steps)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::CREATED, Json(detail)))
}

// GET /api/cadencias
#[utoipa::path(
    get,
    path = "/api/cadencias",
    tag = "Cadências",
    responses(
        (status = 200, description = "Cadências do tenant", body = Vec<Cadencia>)
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn list_cadencias(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
) -> Result<impl IntoResponse, ApiError> {
    let cadencias = app_state
        .cadence_service
        .list_cadencias(empresa.0)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::OK, Json(cadencias)))
}

// GET /api/cadencias/{id}
#[utoipa::path(
    get,
    path = "/api/cadencias/{id}",
    tag = "Cadências",
    responses(
        (status = 200, description = "Cadência com os passos", body = CadenciaDetail),
        (status = 404, description = "Cadência não encontrada")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa"),
        ("id" = Uuid, Path, description = "ID da cadência")
    )
)]
pub async fn get_cadencia(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Path(cadencia_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = app_state
        .cadence_service
        .get_cadencia(empresa.0, cadencia_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::OK, Json(detail)))
}

// =============================================================================
//  RUNS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollPayload {
    pub deal_id: Uuid,
}

// POST /api/cadencias/{id}/inscrever
#[utoipa::path(
    post,
    path = "/api/cadencias/{id}/inscrever",
    tag = "Cadências",
    request_body = EnrollPayload,
    responses(
        (status = 201, description = "Run ATIVA criada no passo 1", body = CadenceRun),
        (status = 404, description = "Cadência não encontrada"),
        (status = 409, description = "Deal já ativo nesta cadência")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa"),
        ("id" = Uuid, Path, description = "ID da cadência")
    )
)]
pub async fn enroll(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Path(cadencia_id): Path<Uuid>,
    Json(payload): Json<EnrollPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let run = app_state
        .cadence_service
        .enroll(empresa.0, cadencia_id, payload.deal_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::CREATED, Json(run)))
}

// GET /api/cadencias/{id}/runs
#[utoipa::path(
    get,
    path = "/api/cadencias/{id}/runs",
    tag = "Cadências",
    responses(
        (status = 200, description = "Runs da cadência", body = Vec<CadenceRun>)
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa"),
        ("id" = Uuid, Path, description = "ID da cadência")
    )
)]
pub async fn list_runs(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Path(cadencia_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let runs = app_state
        .cadence_service
        .list_runs(empresa.0, cadencia_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::OK, Json(runs)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TickPayload {
    // Tamanho máximo do lote reivindicado neste tick
    pub limite: Option<i64>,
}

// POST /api/cadencias/tick
//
// Chamado pelo cron. Sem runs vencidas é um no-op: nada muda, nada é
// disparado.
#[utoipa::path(
    post,
    path = "/api/cadencias/tick",
    tag = "Cadências",
    request_body = TickPayload,
    responses(
        (status = 200, description = "Resultado por run processada", body = Vec<TickOutcome>)
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn tick(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Json(payload): Json<TickPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let outcomes = app_state
        .cadence_service
        .tick(empresa.0, payload.limite.unwrap_or(50))
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::OK, Json(outcomes)))
}

// POST /api/cadencias/runs/{run_id}/cancelar
//
// Saída antecipada: resposta recebida, deal fechado etc.
#[utoipa::path(
    post,
    path = "/api/cadencias/runs/{run_id}/cancelar",
    tag = "Cadências",
    responses(
        (status = 200, description = "Run cancelada", body = CadenceRun),
        (status = 404, description = "Run não encontrada"),
        (status = 409, description = "Run já não está ATIVA")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa"),
        ("run_id" = Uuid, Path, description = "ID da run")
    )
)]
pub async fn cancel_run(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Path(run_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let run = app_state
        .cadence_service
        .cancel_run(empresa.0, run_id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::OK, Json(run)))
}
