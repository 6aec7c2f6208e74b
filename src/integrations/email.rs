// src/integrations/email.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::common::error::AppError;
use crate::integrations::ChannelSender;

const ASSUNTO_PADRAO: &str = "Mensagem da equipe comercial";

// Envio por provedor transacional de e-mail (API HTTP com Bearer token).
pub struct EmailSender {
    client: Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl EmailSender {
    pub fn new(base_url: String, api_key: String, from: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("falha ao construir o cliente HTTP de e-mail");
        Self {
            client,
            base_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    async fn enviar(&self, destino: &str, mensagem: &str) -> Result<(), AppError> {
        // A primeira linha da mensagem vira o assunto quando há mais de uma.
        let (assunto, corpo) = match mensagem.split_once('\n') {
            Some((primeira, resto)) if !resto.trim().is_empty() => {
                (primeira.trim(), resto.trim())
            }
            _ => (ASSUNTO_PADRAO, mensagem),
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": destino,
                "subject": assunto,
                "text": corpo,
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
                "provedor de e-mail respondeu {}: {}",
                status, corpo
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn mensagem_de_uma_linha_usa_assunto_padrao() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "to": "maria@email.com",
                "subject": ASSUNTO_PADRAO,
                "text": "Oi Maria",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let sender = EmailSender::new(server.uri(), "chave".into(), "time@empresa.com".into());
        sender.enviar("maria@email.com", "Oi Maria").await.unwrap();
    }

    #[tokio::test]
    async fn primeira_linha_vira_assunto() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "subject": "Proposta comercial",
                "text": "Oi Maria, segue a proposta.",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let sender = EmailSender::new(server.uri(), "chave".into(), "time@empresa.com".into());
        sender
            .enviar(
                "maria@email.com",
                "Proposta comercial\nOi Maria, segue a proposta.",
            )
            .await
            .unwrap();
    }
}
