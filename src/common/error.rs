// src/common/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::models::jobs::JobStatus;

// Erro interno da aplicação, com `thiserror` para as conversões automáticas.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Job não encontrado")]
    JobNotFound,

    #[error("Cadência não encontrada")]
    CadenciaNotFound,

    #[error("Run de cadência não encontrada")]
    RunNotFound,

    #[error("Contato não encontrado")]
    ContatoNotFound,

    #[error("Item de preview não encontrado para o deal informado")]
    PreviewItemNotFound,

    // Violação de pré-condição do funil de estados: a operação é recusada
    // e nenhum estado é alterado.
    #[error("Job em estado inválido: esperado {esperado:?}")]
    InvalidJobState { esperado: JobStatus },

    #[error("Run não está ATIVA")]
    RunNaoAtiva,

    #[error("Já existe uma run ATIVA deste deal nesta cadência")]
    RunJaAtiva,

    #[error("Cadência sem passos")]
    CadenciaSemPassos,

    // Falha de uma integração externa (LLM, WhatsApp, e-mail)
    #[error("Falha na integração externa: {0}")]
    Integracao(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Integracao(e.to_string())
    }
}

// O erro que sai pela borda HTTP. Handlers convertem AppError -> ApiError
// já com a mensagem no idioma do Accept-Language.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => Json(json!({ "error": self.message, "details": details })),
            None => Json(json!({ "error": self.message })),
        };
        (self.status, body).into_response()
    }
}

impl AppError {
    pub fn to_api_error(&self, lang: &str) -> ApiError {
        let pt = lang.starts_with("pt");

        let (status, message) = match self {
            AppError::ValidationError(errors) => {
                // Devolve os códigos de erro por campo, o frontend traduz.
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                return ApiError {
                    status: StatusCode::BAD_REQUEST,
                    message: if pt {
                        "Um ou mais campos são inválidos.".to_string()
                    } else {
                        "One or more fields are invalid.".to_string()
                    },
                    details: Some(json!(details)),
                };
            }

            AppError::JobNotFound => (
                StatusCode::NOT_FOUND,
                if pt { "Job não encontrado." } else { "Job not found." },
            ),
            AppError::CadenciaNotFound => (
                StatusCode::NOT_FOUND,
                if pt {
                    "Cadência não encontrada."
                } else {
                    "Cadence not found."
                },
            ),
            AppError::RunNotFound => (
                StatusCode::NOT_FOUND,
                if pt {
                    "Run de cadência não encontrada."
                } else {
                    "Cadence run not found."
                },
            ),
            AppError::ContatoNotFound => (
                StatusCode::NOT_FOUND,
                if pt {
                    "Contato não encontrado."
                } else {
                    "Contact not found."
                },
            ),
            AppError::PreviewItemNotFound => (
                StatusCode::NOT_FOUND,
                if pt {
                    "Item de preview não encontrado para esse deal."
                } else {
                    "No preview item for that deal."
                },
            ),
            AppError::InvalidJobState { .. } => (
                StatusCode::CONFLICT,
                if pt {
                    "O job não está no estado exigido por essa operação."
                } else {
                    "The job is not in the state this operation requires."
                },
            ),
            AppError::RunNaoAtiva => (
                StatusCode::CONFLICT,
                if pt {
                    "A run não está mais ATIVA."
                } else {
                    "The run is no longer active."
                },
            ),
            AppError::RunJaAtiva => (
                StatusCode::CONFLICT,
                if pt {
                    "Esse deal já está ativo nessa cadência."
                } else {
                    "That deal is already active in this cadence."
                },
            ),
            AppError::CadenciaSemPassos => (
                StatusCode::BAD_REQUEST,
                if pt {
                    "A cadência precisa de ao menos um passo."
                } else {
                    "A cadence needs at least one step."
                },
            ),
            AppError::Integracao(_) => {
                tracing::error!("Falha de integração externa: {}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    if pt {
                        "Uma integração externa falhou."
                    } else {
                        "An external integration failed."
                    },
                )
            }

            // DatabaseError e InternalServerError viram 500 genérico;
            // o tracing guarda o detalhe.
            e => {
                tracing::error!("Erro interno do servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    if pt {
                        "Ocorreu um erro inesperado."
                    } else {
                        "An unexpected error occurred."
                    },
                )
            }
        };

        ApiError::new(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondicao_violada_vira_conflict() {
        let err = AppError::InvalidJobState {
            esperado: JobStatus::Preview,
        };
        assert_eq!(err.to_api_error("pt").status, StatusCode::CONFLICT);
        assert_eq!(err.to_api_error("en").status, StatusCode::CONFLICT);
    }

    #[test]
    fn mensagem_segue_o_idioma() {
        let err = AppError::JobNotFound;
        assert_eq!(err.to_api_error("pt-BR").message, "Job não encontrado.");
        assert_eq!(err.to_api_error("en").message, "Job not found.");
    }
}
