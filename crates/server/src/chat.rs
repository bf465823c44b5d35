//! Chat endpoints: the web widget posts full message lists to `/api/chat`,
//! the WhatsApp bridge posts one inbound text at a time.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use concierge_agent::{AgentError, ChatOrchestrator, ChatRequest, ChatResponse};
use concierge_core::domain::client::ClientId;
use concierge_core::domain::conversation::{ConversationId, Message};
use concierge_core::errors::{ApplicationError, InterfaceError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const WHATSAPP_APOLOGY: &str = "Sorry, I can't reply properly right now. \
     A member of our travel team will get back to you shortly.";

#[derive(Clone)]
pub struct ChatState {
    orchestrator: Arc<ChatOrchestrator>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WhatsAppInbound {
    pub from: String,
    pub text: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatsAppReply {
    pub reply: String,
}

pub fn router(orchestrator: Arc<ChatOrchestrator>) -> Router {
    Router::new()
        .route("/api/chat", post(web_chat))
        .route("/api/whatsapp/messages", post(whatsapp_message))
        .with_state(ChatState { orchestrator })
}

async fn web_chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ChatResponse>) {
    let request = match payload {
        Ok(Json(request)) if !request.messages.is_empty() => request,
        Ok(_) => return bad_request("messages must contain at least one message"),
        Err(rejection) => return bad_request(&rejection.body_text()),
    };

    match state.orchestrator.respond(request).await {
        Ok(answer) => (StatusCode::OK, Json(ChatResponse::answered(answer))),
        Err(error) => {
            let interface = application_error(&error).into_interface(Uuid::new_v4().to_string());
            warn!(
                event_name = "server.chat.turn_failed",
                correlation_id = interface.correlation_id(),
                error = %interface,
                "chat turn failed"
            );
            let status = StatusCode::from_u16(interface.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(ChatResponse::failed(error.user_message())))
        }
    }
}

async fn whatsapp_message(
    State(state): State<ChatState>,
    payload: Result<Json<WhatsAppInbound>, JsonRejection>,
) -> Result<Json<WhatsAppReply>, (StatusCode, Json<ChatResponse>)> {
    let inbound = match payload {
        Ok(Json(inbound)) => inbound,
        Err(rejection) => return Err(bad_request(&rejection.body_text())),
    };
    let from = inbound.from.trim();
    if from.is_empty() || inbound.text.trim().is_empty() {
        return Err(bad_request("`from` and `text` are required"));
    }

    info!(
        event_name = "server.whatsapp.inbound",
        client_id = from,
        chars = inbound.text.chars().count(),
        "whatsapp message received"
    );

    let request = ChatRequest {
        messages: vec![Message::user(inbound.text)],
        client_id: Some(ClientId(from.to_string())),
        conversation_id: inbound
            .conversation_id
            .filter(|id| !id.trim().is_empty())
            .map(ConversationId),
        source: Some("whatsapp".to_string()),
        ..ChatRequest::default()
    };

    let reply = match state.orchestrator.respond(request).await {
        Ok(answer) => answer,
        Err(error) => {
            warn!(
                event_name = "server.whatsapp.reply_failed",
                client_id = from,
                error = %error,
                "falling back to apology"
            );
            WHATSAPP_APOLOGY.to_string()
        }
    };

    Ok(Json(WhatsAppReply { reply }))
}

fn application_error(error: &AgentError) -> ApplicationError {
    match error {
        AgentError::MissingApiKey => ApplicationError::Configuration(error.to_string()),
        AgentError::Llm(_) => ApplicationError::ModelProvider(error.to_string()),
    }
}

fn bad_request(detail: &str) -> (StatusCode, Json<ChatResponse>) {
    let error = InterfaceError::BadRequest {
        message: detail.to_string(),
        correlation_id: Uuid::new_v4().to_string(),
    };
    warn!(
        event_name = "server.chat.bad_request",
        correlation_id = error.correlation_id(),
        error = %error,
        "rejected chat payload"
    );
    (StatusCode::BAD_REQUEST, Json(ChatResponse::failed(error.user_message())))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use concierge_agent::llm::{ChatModel, LlmError};
    use concierge_agent::prompt::WHATSAPP_ADDENDUM;
    use concierge_agent::{
        CatalogToolExecutor, ChatOrchestrator, PromptAssembler, SideEffect, SideEffectQueue,
    };
    use concierge_core::domain::client::ClientId;
    use concierge_core::domain::conversation::{Message, Role};
    use concierge_db::repositories::{
        InMemoryBookingRepository, InMemoryCatalogRepository, InMemoryClientProfileRepository,
        InMemoryConversationMemoryRepository, InMemoryQuoteRepository,
    };
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::{router, WHATSAPP_APOLOGY};

    struct CannedModel {
        reply: Result<Message, LlmError>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl CannedModel {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self { reply: Ok(Message::assistant(text)), seen: Mutex::default() })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(LlmError::Status { status: 500, body: "upstream".to_string() }),
                seen: Mutex::default(),
            })
        }

        fn last_system_prompt(&self) -> String {
            let seen = self.seen.lock().expect("lock");
            seen.last()
                .and_then(|messages| messages.first())
                .filter(|message| message.role == Role::System)
                .map(|message| message.content.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, messages: &[Message], _tools: &[Value]) -> Result<Message, LlmError> {
            self.seen.lock().expect("lock").push(messages.to_vec());
            match &self.reply {
                Ok(message) => Ok(message.clone()),
                Err(_) => Err(LlmError::Status { status: 500, body: "upstream".to_string() }),
            }
        }
    }

    fn test_app(model: Option<Arc<dyn ChatModel>>) -> (Router, mpsc::Receiver<SideEffect>) {
        let executor = CatalogToolExecutor::new(
            Arc::new(InMemoryCatalogRepository::default()),
            Arc::new(InMemoryQuoteRepository::default()),
            Arc::new(InMemoryBookingRepository::default()),
        );
        let prompts = PromptAssembler::new(
            Arc::new(InMemoryClientProfileRepository::default()),
            Arc::new(InMemoryConversationMemoryRepository::default()),
            10,
        );
        let (queue, receiver) = SideEffectQueue::detached(16);
        let orchestrator = ChatOrchestrator::new(model, Arc::new(executor), prompts, queue);
        (router(Arc::new(orchestrator)), receiver)
    }

    async fn post(app: Router, path: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn web_chat_returns_the_model_answer() {
        let model = CannedModel::answering("Kathmandu is lovely in October.");
        let (app, _effects) = test_app(Some(model.clone() as Arc<dyn ChatModel>));

        let (status, body) = post(
            app,
            "/api/chat",
            json!({"messages": [{"role": "user", "content": "When should I visit Kathmandu?"}]}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true, "response": "Kathmandu is lovely in October."}));
        assert!(!model.last_system_prompt().contains(WHATSAPP_ADDENDUM.trim()));
    }

    #[tokio::test]
    async fn web_chat_without_api_key_is_unavailable() {
        let (app, _effects) = test_app(None);

        let (status, body) =
            post(app, "/api/chat", json!({"messages": [{"role": "user", "content": "Hello"}]})).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "DeepSeek API key not configured");
    }

    #[tokio::test]
    async fn web_chat_maps_model_failure_to_bad_gateway() {
        let (app, _effects) = test_app(Some(CannedModel::failing() as Arc<dyn ChatModel>));

        let (status, body) =
            post(app, "/api/chat", json!({"messages": [{"role": "user", "content": "Hello"}]})).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some_and(|error| !error.contains("500")));
    }

    #[tokio::test]
    async fn web_chat_rejects_empty_and_malformed_payloads() {
        let (app, _effects) = test_app(Some(CannedModel::answering("unused") as Arc<dyn ChatModel>));

        let (status, body) = post(app.clone(), "/api/chat", json!({"messages": []})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = post(app, "/api/chat", json!({"messages": "not a list"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn whatsapp_message_runs_a_whatsapp_turn_for_the_sender() {
        let model = CannedModel::answering("Namaste! Shall I hold Dwarika's for you?");
        let (app, mut effects) = test_app(Some(model.clone() as Arc<dyn ChatModel>));

        let (status, body) = post(
            app,
            "/api/whatsapp/messages",
            json!({"from": " +9779800000000 ", "text": "I want to book Kathmandu next week for 2 people"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"reply": "Namaste! Shall I hold Dwarika's for you?"}));
        assert!(model.last_system_prompt().contains(WHATSAPP_ADDENDUM.trim()));

        match effects.recv().await {
            Some(SideEffect::ScoreLead { client_id, delta }) => {
                assert_eq!(client_id, ClientId("+9779800000000".to_string()));
                assert!(delta > 0);
            }
            other => panic!("expected a lead score effect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn whatsapp_message_apologises_when_the_turn_fails() {
        let (app, _effects) = test_app(Some(CannedModel::failing() as Arc<dyn ChatModel>));

        let (status, body) =
            post(app, "/api/whatsapp/messages", json!({"from": "+447700900000", "text": "Hi"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], WHATSAPP_APOLOGY);
    }

    #[tokio::test]
    async fn whatsapp_message_requires_sender_and_text() {
        let (app, _effects) = test_app(Some(CannedModel::answering("unused") as Arc<dyn ChatModel>));

        let (status, body) =
            post(app, "/api/whatsapp/messages", json!({"from": "  ", "text": "Hi"})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
