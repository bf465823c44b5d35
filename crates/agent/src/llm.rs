use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use concierge_core::config::LlmConfig;
use concierge_core::domain::conversation::{Message, Role, ToolCall};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Http(String),
    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

/// One chat completion round: the whole conversation and the tool schema go
/// in, one assistant message comes out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[Message], tools: &[Value]) -> Result<Message, LlmError>;
}

/// OpenAI-compatible client for the DeepSeek chat completions API.
pub struct DeepSeekClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl DeepSeekClient {
    pub fn new(config: &LlmConfig, api_key: SecretString) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Http(error.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>, LlmError> {
        match config.api_key.as_ref() {
            Some(api_key) if !api_key.expose_secret().trim().is_empty() => {
                Self::new(config, api_key.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatModel for DeepSeekClient {
    async fn complete(&self, messages: &[Message], tools: &[Value]) -> Result<Message, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: (!tools.is_empty()).then_some(tools),
            tool_choice: (!tools.is_empty()).then_some("auto"),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| LlmError::Http(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "agent.llm.upstream_error",
                status = status.as_u16(),
                body = %body,
                "model API returned an error status"
            );
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        Ok(choice.message.into_message())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let tool_calls = (!message.tool_calls.is_empty()).then(|| {
            message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunction {
                        name: call.function_name.clone(),
                        arguments: call.arguments_json.clone(),
                    },
                })
                .collect()
        });
        // Assistant turns that only call tools carry a null content.
        let content = if tool_calls.is_some() && message.content.is_empty() {
            None
        } else {
            Some(message.content.clone())
        };

        Self {
            role: message.role.as_str().to_string(),
            content,
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

impl WireMessage {
    fn into_message(self) -> Message {
        let role = self.role.parse::<Role>().unwrap_or(Role::Assistant);
        let tool_calls = self
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                function_name: call.function.name,
                arguments_json: call.function.arguments,
            })
            .collect();

        Message {
            role,
            content: self.content.unwrap_or_default(),
            tool_calls,
            tool_call_id: self.tool_call_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use concierge_core::config::LlmConfig;
    use concierge_core::domain::conversation::{Message, Role, ToolCall, ToolResult};

    use super::{ChatModel, DeepSeekClient, LlmError, WireMessage};

    #[derive(Clone, Default)]
    struct Captured {
        requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn spawn_upstream(status: StatusCode, body: Value) -> (String, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route(
                "/chat/completions",
                post(
                    move |State(captured): State<Captured>, headers: HeaderMap, Json(request): Json<Value>| {
                        let body = body.clone();
                        async move {
                            let auth = headers
                                .get("authorization")
                                .and_then(|value| value.to_str().ok())
                                .map(str::to_string);
                            captured.requests.lock().await.push((auth, request));
                            (status, Json(body))
                        }
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        (format!("http://{address}"), captured)
    }

    fn config(base_url: &str, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            api_key: api_key.map(|key| SecretString::from(key.to_string())),
            base_url: base_url.to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.4,
            max_tokens: 512,
            timeout_secs: 5,
        }
    }

    #[test]
    fn missing_or_blank_key_yields_no_client() {
        assert!(DeepSeekClient::from_config(&config("http://localhost", None)).expect("ok").is_none());
        assert!(DeepSeekClient::from_config(&config("http://localhost", Some("  "))).expect("ok").is_none());
        assert!(DeepSeekClient::from_config(&config("http://localhost", Some("sk-1"))).expect("ok").is_some());
    }

    #[test]
    fn tool_call_turns_serialize_in_openai_shape() {
        let assistant = Message::assistant_with_tool_calls(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                function_name: "search_hotels".to_string(),
                arguments_json: r#"{"destination":"Kathmandu"}"#.to_string(),
            }],
        );
        let wire = serde_json::to_value(WireMessage::from(&assistant)).expect("serialize");
        assert_eq!(wire["content"], Value::Null);
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "search_hotels");

        let tool = Message::tool(&ToolResult { tool_call_id: "call_1".to_string(), content: json!({"hotels": []}) });
        let wire = serde_json::to_value(WireMessage::from(&tool)).expect("serialize");
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
        assert!(wire.get("tool_calls").is_none());
    }

    #[tokio::test]
    async fn completes_against_an_openai_compatible_endpoint() {
        let (base_url, captured) = spawn_upstream(
            StatusCode::OK,
            json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_9",
                            "type": "function",
                            "function": {"name": "search_hotels", "arguments": "{\"destination\":\"Kathmandu\"}"}
                        }]
                    }
                }]
            }),
        )
        .await;
        let client = DeepSeekClient::new(&config(&base_url, None), SecretString::from("sk-test".to_string()))
            .expect("client");

        let reply = client
            .complete(&[Message::system("be helpful"), Message::user("hotels?")], &[json!({"type": "function"})])
            .await
            .expect("completion");

        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].function_name, "search_hotels");

        let requests = captured.requests.lock().await;
        let (auth, body) = &requests[0];
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][1]["content"], "hotels?");
    }

    #[tokio::test]
    async fn non_success_status_carries_the_body() {
        let (base_url, _) =
            spawn_upstream(StatusCode::TOO_MANY_REQUESTS, json!({"error": "rate limited"})).await;
        let client = DeepSeekClient::new(&config(&base_url, None), SecretString::from("sk".to_string()))
            .expect("client");

        let error = client.complete(&[Message::user("hi")], &[]).await.expect_err("status error");
        match error {
            LlmError::Status { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("rate limited"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_are_an_invalid_response() {
        let (base_url, _) = spawn_upstream(StatusCode::OK, json!({"choices": []})).await;
        let client = DeepSeekClient::new(&config(&base_url, None), SecretString::from("sk".to_string()))
            .expect("client");

        let error = client.complete(&[Message::user("hi")], &[]).await.expect_err("invalid");
        assert!(matches!(error, LlmError::InvalidResponse(_)));
    }
}
