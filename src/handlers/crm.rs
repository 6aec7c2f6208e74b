// src/handlers/crm.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{i18n::Locale, tenancy::EmpresaContext},
    models::crm::{Contato, Deal},
};

// Cadastro mínimo: o suficiente para o resolver ter o que resolver.

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateContatoPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Maria da Silva")]
    pub nome: String,

    // Telefone no formato E.164 sem o "+", como o WhatsApp Cloud espera
    #[schema(example = "5511999998888")]
    pub telefone: Option<String>,

    #[validate(email(message = "invalid_email"))]
    #[schema(example = "maria@email.com")]
    pub email: Option<String>,
}

// POST /api/contatos
#[utoipa::path(
    post,
    path = "/api/contatos",
    tag = "CRM",
    request_body = CreateContatoPayload,
    responses(
        (status = 201, description = "Contato criado", body = Contato),
        (status = 400, description = "Dados inválidos")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn create_contato(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Json(payload): Json<CreateContatoPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale.0))?;

    let contato = app_state
        .crm_service
        .create_contato(
            empresa.0,
            &payload.nome,
            payload.telefone.as_deref(),
            payload.email.as_deref(),
        )
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::CREATED, Json(contato)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealPayload {
    pub contato_id: Uuid,

    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "Plano anual - Maria")]
    pub titulo: String,

    #[serde(default)]
    #[schema(example = "1500.00")]
    pub valor: Decimal,
}

// POST /api/deals
#[utoipa::path(
    post,
    path = "/api/deals",
    tag = "CRM",
    request_body = CreateDealPayload,
    responses(
        (status = 201, description = "Deal criado", body = Deal),
        (status = 404, description = "Contato não encontrado")
    ),
    params(
        ("x-empresa-id" = Uuid, Header, description = "ID da Empresa")
    )
)]
pub async fn create_deal(
    State(app_state): State<AppState>,
    locale: Locale,
    empresa: EmpresaContext,
    Json(payload): Json<CreateDealPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale.0))?;

    let deal = app_state
        .crm_service
        .create_deal(empresa.0, payload.contato_id, &payload.titulo, payload.valor)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale.0))?;

    Ok((StatusCode::CREATED, Json(deal)))
}
