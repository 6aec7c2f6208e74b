// src/main.rs

use axum::{
    Router,
    routing::{get, patch, post},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Declaração dos módulos
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod integrations;
mod middleware;
mod models;
mod services;

use crate::config::AppState;

#[tokio::main]
async fn main() {
    // Inicializa o logger
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Disparos em massa: criar+gerar, revisar, enviar
    let disparo_routes = Router::new()
        .route(
            "/",
            post(handlers::jobs::create_disparo).get(handlers::jobs::list_disparos),
        )
        .route("/{id}", get(handlers::jobs::get_disparo))
        .route(
            "/{id}/itens/{deal_id}",
            patch(handlers::jobs::review_item),
        )
        .route("/{id}/enviar", post(handlers::jobs::enviar_disparo));

    // Cadências: definição, inscrição e o tick do agendador
    let cadencia_routes = Router::new()
        .route(
            "/",
            post(handlers::cadences::create_cadencia).get(handlers::cadences::list_cadencias),
        )
        .route("/tick", post(handlers::cadences::tick))
        .route(
            "/runs/{run_id}/cancelar",
            post(handlers::cadences::cancel_run),
        )
        .route("/{id}", get(handlers::cadences::get_cadencia))
        .route("/{id}/inscrever", post(handlers::cadences::enroll))
        .route("/{id}/runs", get(handlers::cadences::list_runs));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        // Cadastro mínimo de CRM (contatos e deals)
        .route("/api/contatos", post(handlers::crm::create_contato))
        .route("/api/deals", post(handlers::crm::create_deal))
        .nest("/api/disparos", disparo_routes)
        .nest("/api/cadencias", cadencia_routes)
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
        )
        .with_state(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.expect("Erro no servidor Axum");
}
