// src/models/crm.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::jobs::Canal;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contato {
    pub id: Uuid,
    #[schema(ignore)]
    pub empresa_id: Uuid,
    #[schema(example = "Maria da Silva")]
    pub nome: String,
    #[schema(example = "5511999998888")]
    pub telefone: Option<String>,
    #[schema(example = "maria@email.com")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: Uuid,
    #[schema(ignore)]
    pub empresa_id: Uuid,
    pub contato_id: Uuid,
    #[schema(example = "Plano anual - Maria")]
    pub titulo: String,
    #[schema(example = "1500.00")]
    pub valor: Decimal,
    pub created_at: DateTime<Utc>,
}

// Resultado do Contact Resolver: o que o deal tem de contato.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ContatoDoDeal {
    pub nome: String,
    pub telefone: Option<String>,
    pub email: Option<String>,
}

impl ContatoDoDeal {
    /// O endereço de envio para um canal. None = contato sem endereço
    /// nesse canal (o chamador contabiliza como erro e pula).
    pub fn endereco(&self, canal: Canal) -> Option<&str> {
        match canal {
            Canal::Whatsapp => self.telefone.as_deref(),
            Canal::Email => self.email.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endereco_segue_o_canal() {
        let contato = ContatoDoDeal {
            nome: "Maria".into(),
            telefone: Some("5511999998888".into()),
            email: None,
        };

        assert_eq!(contato.endereco(Canal::Whatsapp), Some("5511999998888"));
        assert_eq!(contato.endereco(Canal::Email), None);
    }
}
