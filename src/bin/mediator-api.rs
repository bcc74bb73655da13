/// Mediator API - HTTP endpoint that runs the data mapper mediator
///
/// Accepts a SOAP envelope (or a raw JSON payload) per request, mediates it
/// with the configured mediator and returns the resulting envelope.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use datamapper_mediator::{
    DataMapperMediator, MediationError, MediatorConfig, MessageContext, SoapEnvelope, SoapVersion,
};

struct AppState {
    mediator: DataMapperMediator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path =
        std::env::var("DATAMAPPER_CONFIG").unwrap_or_else(|_| "datamapper.yaml".to_string());
    let config = MediatorConfig::load_from_file(&config_path)?;
    let mediator = DataMapperMediator::from_config(&config);

    match mediator.preload_resources() {
        Ok(Some(_)) => tracing::info!("Mapping resources preloaded"),
        Ok(None) => tracing::info!("Dynamic registry keys, resources resolve per message"),
        Err(e) => tracing::warn!("Could not preload mapping resources: {}", e),
    }

    let state = Arc::new(AppState { mediator });

    // Build router
    let app = Router::new()
        .route("/mediate", post(mediate))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Mediator API listening on {}", addr);
    tracing::info!("Mediator configuration: {}", config_path);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Mediate one message
///
/// Query parameters become message properties, so dynamic registry keys can
/// be driven per request.
async fn mediate(
    State(state): State<Arc<AppState>>,
    Query(properties): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, AppError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    let mut ctx = if is_json {
        MessageContext::new(SoapEnvelope::new(SoapVersion::Soap11)).with_json_payload(body)
    } else {
        let envelope = SoapEnvelope::parse(&body)
            .map_err(|e| AppError::ValidationError(format!("Invalid envelope: {}", e)))?;
        MessageContext::new(envelope)
    };
    for (key, value) in properties {
        ctx.set_property(key, value);
    }

    let message_id = ctx.message_id();
    let ctx = tokio::task::spawn_blocking(move || {
        state.mediator.mediate(&mut ctx).map(|()| ctx)
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Mediation task failed: {}", e)))??;

    tracing::info!("Message {} mediated", message_id);

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        ctx.envelope().to_string(),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&message_id.to_string()) {
        response.headers_mut().insert("x-message-id", value);
    }
    Ok(response)
}

/// Health check endpoint (liveness)
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "mediator-api",
        "version": env!("CARGO_PKG_VERSION"),
        "mediator_id": state.mediator.unique_id().to_string(),
    }))
}

// Error handling

enum AppError {
    ValidationError(String),
    Mediation(MediationError),
    InternalError(String),
}

impl From<MediationError> for AppError {
    fn from(e: MediationError) -> Self {
        AppError::Mediation(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Mediation(e) if e.is_configuration_error() => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Mediation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({
            "error": message
        }))).into_response()
    }
}
