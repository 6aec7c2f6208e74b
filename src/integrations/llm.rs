// src/integrations/llm.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::common::error::AppError;
use crate::integrations::TextGenerator;

// Corpo da chamada ao provedor de geração de texto (API estilo "messages").
#[derive(Debug, Serialize)]
struct GeracaoRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Mensagem<'a>>,
}

#[derive(Debug, Serialize)]
struct Mensagem<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct GeracaoResponse {
    content: Vec<BlocoDeConteudo>,
}

#[derive(Debug, Deserialize)]
struct BlocoDeConteudo {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

pub struct LlmClient {
    api_key: String,
    model: String,
    client: Client,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("falha ao construir o cliente HTTP do LLM");
        Self {
            api_key,
            model,
            client,
            base_url,
        }
    }

    fn montar_prompt(instrucao: &str, nome_contato: &str) -> String {
        format!(
            "Você escreve mensagens curtas de prospecção comercial em português.\n\
             Instrução da campanha: {instrucao}\n\
             Nome do contato: {nome_contato}\n\
             Responda apenas com o texto da mensagem, sem aspas nem explicações."
        )
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn gerar_mensagem(
        &self,
        instrucao: &str,
        nome_contato: &str,
    ) -> Result<String, AppError> {
        let req = GeracaoRequest {
            model: &self.model,
            max_tokens: 512,
            messages: vec![Mensagem {
                role: "user",
                content: Self::montar_prompt(instrucao, nome_contato),
            }],
        };

        let inicio = std::time::Instant::now();

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let corpo = response
                .text()
                .await
                .unwrap_or_else(|_| "erro desconhecido".to_string());
            return Err(AppError::Integracao(format!(
                "provedor de texto respondeu {}: {}",
                status, corpo
            )));
        }

        let body = response.json::<GeracaoResponse>().await?;
        tracing::debug!(
            latencia_ms = inicio.elapsed().as_millis() as u64,
            "geração de texto concluída"
        );

        let texto: String = body
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if texto.trim().is_empty() {
            return Err(AppError::Integracao(
                "provedor de texto devolveu resposta vazia".to_string(),
            ));
        }

        Ok(texto.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cliente(server: &MockServer) -> LlmClient {
        LlmClient::new("chave-teste".into(), "modelo-x".into(), server.uri())
    }

    #[tokio::test]
    async fn gera_mensagem_a_partir_dos_blocos_de_texto() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "chave-teste"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    { "type": "text", "text": "Oi Maria, " },
                    { "type": "text", "text": "tudo bem?" }
                ]
            })))
            .mount(&server)
            .await;

        let texto = cliente(&server)
            .gerar_mensagem("convide para a demo", "Maria")
            .await
            .unwrap();
        assert_eq!(texto, "Oi Maria, tudo bem?");
    }

    #[tokio::test]
    async fn status_de_erro_vira_falha_de_integracao() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = cliente(&server)
            .gerar_mensagem("qualquer", "Maria")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Integracao(_)));
    }

    #[tokio::test]
    async fn resposta_sem_texto_vira_falha_de_integracao() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": [] })))
            .mount(&server)
            .await;

        let err = cliente(&server)
            .gerar_mensagem("qualquer", "Maria")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Integracao(_)));
    }
}
