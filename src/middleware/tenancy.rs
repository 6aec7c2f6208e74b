// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use uuid::Uuid;

use crate::common::error::ApiError;

// O cabeçalho que identifica a empresa (tenant) da requisição.
const EMPRESA_ID_HEADER: &str = "x-empresa-id";

// Contexto de tenant explícito: todo handler do subsistema recebe isso
// e repassa o UUID para os serviços. Nada de estado global/ambiente.
#[derive(Debug, Clone, Copy)]
pub struct EmpresaContext(pub Uuid);

impl<S> FromRequestParts<S> for EmpresaContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = parts.headers.get(EMPRESA_ID_HEADER);

        match header_value {
            Some(value) => {
                let value_str = value.to_str().map_err(|_| {
                    ApiError::new(
                        StatusCode::BAD_REQUEST,
                        "Cabeçalho X-Empresa-ID contém caracteres inválidos.",
                    )
                })?;

                let empresa_id = Uuid::parse_str(value_str).map_err(|_| {
                    ApiError::new(
                        StatusCode::BAD_REQUEST,
                        "Cabeçalho X-Empresa-ID inválido (não é um UUID).",
                    )
                })?;

                Ok(EmpresaContext(empresa_id))
            }
            None => Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "O cabeçalho X-Empresa-ID é obrigatório.",
            )),
        }
    }
}
