use crate::agent::{ AgentError, QueryAgent };
use crate::models::api::{ ErrorResponse, QueryRequest, QueryResponse, ResponseStatus, RolesResponse };
use crate::models::chat::{ Conversation, ConversationSummary };
use std::error::Error;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ Path, State },
    response::{ IntoResponse, Response },
    http::{ HeaderValue, StatusCode },
};
use serde_json::{ json, Value as JsonValue };
use tower_http::cors::{ AllowOrigin, Any, CorsLayer };
use log::{ error, info };

pub const SERVICE_NAME: &str = "Dynamic Reporting AI";

impl AgentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AgentError::InvalidInput(_) | AgentError::InvalidRole(_) => StatusCode::BAD_REQUEST,
            AgentError::ConversationNotFound(_) => StatusCode::NOT_FOUND,
            AgentError::Generation { .. } => StatusCode::BAD_GATEWAY,
            AgentError::Store(_) | AgentError::Inconsistent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        if code.is_server_error() {
            error!("Request failed with {}: {}", code, self);
        }
        (code, Json(ErrorResponse { status: ResponseStatus::Error, detail: self.to_string() })).into_response()
    }
}

fn cors_layer(origin: &str) -> Result<CorsLayer, Box<dyn Error + Send + Sync>> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::from(Any)
    } else {
        let value = HeaderValue::from_str(origin.trim()).map_err(|e|
            format!("Invalid CORS origin '{}': {}", origin, e)
        )?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new().allow_origin(allow_origin).allow_methods(Any).allow_headers(Any))
}

pub fn router(
    agent: Arc<QueryAgent>,
    cors_origin: &str
) -> Result<Router, Box<dyn Error + Send + Sync>> {
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/roles", get(roles_handler))
        .route("/api/query", post(query_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/conversation/{conversation_id}", get(conversation_handler))
        .route("/api/conversations", get(conversations_handler))
        .layer(cors_layer(cors_origin)?)
        .with_state(agent);

    Ok(app)
}

async fn root_handler() -> Json<JsonValue> {
    Json(json!({ "name": SERVICE_NAME, "version": env!("CARGO_PKG_VERSION"), "status": "operational" }))
}

async fn health_handler() -> Json<JsonValue> {
    Json(json!({ "status": "healthy" }))
}

async fn roles_handler(State(agent): State<Arc<QueryAgent>>) -> Json<RolesResponse> {
    info!("API endpoint called: GET /api/roles");
    Json(RolesResponse { roles: agent.list_roles() })
}

async fn query_handler(
    State(agent): State<Arc<QueryAgent>>,
    Json(req): Json<QueryRequest>
) -> Result<Json<QueryResponse>, AgentError> {
    info!("API endpoint called: POST /api/query");
    agent.process(req).await.map(Json)
}

async fn chat_handler(
    State(agent): State<Arc<QueryAgent>>,
    Json(req): Json<QueryRequest>
) -> Result<Json<QueryResponse>, AgentError> {
    info!("API endpoint called: POST /api/chat");
    agent.process(req).await.map(Json)
}

async fn conversation_handler(
    State(agent): State<Arc<QueryAgent>>,
    Path(conversation_id): Path<String>
) -> Result<Json<Conversation>, AgentError> {
    info!("API endpoint called: GET /api/chat/conversation/{}", conversation_id);
    agent.get_conversation(&conversation_id).map(Json)
}

async fn conversations_handler(
    State(agent): State<Arc<QueryAgent>>
) -> Result<Json<Vec<ConversationSummary>>, AgentError> {
    info!("API endpoint called: GET /api/conversations");
    agent.list_conversations().map(Json)
}
