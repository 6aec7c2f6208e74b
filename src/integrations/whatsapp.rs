// src/integrations/whatsapp.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::common::error::AppError;
use crate::integrations::ChannelSender;

// Envio de texto pela WhatsApp Cloud API (Graph).
// POST {base}/{phone_number_id}/messages com Bearer token.
pub struct WhatsappSender {
    client: Client,
    base_url: String,
    phone_number_id: String,
    token: String,
}

impl WhatsappSender {
    pub fn new(base_url: String, phone_number_id: String, token: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("falha ao construir o cliente HTTP do WhatsApp");
        Self {
            client,
            base_url,
            phone_number_id,
            token,
        }
    }
}

#[async_trait]
impl ChannelSender for WhatsappSender {
    async fn enviar(&self, destino: &str, mensagem: &str) -> Result<(), AppError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": destino,
                "type": "text",
                "text": { "body": mensagem },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let corpo = response
                .text()
                .await
                .unwrap_or_else(|_| "erro desconhecido".to_string());
            return Err(AppError::Integracao(format!(
                "WhatsApp Cloud respondeu {}: {}",
                status, corpo
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn envia_texto_para_o_numero_do_destino() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/123456/messages"))
            .and(body_partial_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "5511999998888",
                "text": { "body": "Oi Maria" },
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sender = WhatsappSender::new(server.uri(), "123456".into(), "token".into());
        sender.enviar("5511999998888", "Oi Maria").await.unwrap();
    }

    #[tokio::test]
    async fn rejeicao_do_provedor_vira_erro() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("numero invalido"))
            .mount(&server)
            .await;

        let sender = WhatsappSender::new(server.uri(), "123456".into(), "token".into());
        let err = sender.enviar("abc", "Oi").await.unwrap_err();
        assert!(matches!(err, AppError::Integracao(_)));
    }
}
