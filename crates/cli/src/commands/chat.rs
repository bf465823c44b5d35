use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use concierge_agent::llm::{ChatModel, DeepSeekClient};
use concierge_agent::{
    AgentError, CatalogToolExecutor, ChatOrchestrator, ChatRequest, PromptAssembler,
    SideEffectQueue,
};
use concierge_core::domain::client::ClientId;
use concierge_core::domain::conversation::{ConversationId, Message};
use concierge_db::repositories::{
    SqlBookingRepository, SqlCatalogRepository, SqlClientProfileRepository,
    SqlConversationMemoryRepository, SqlQuoteRepository,
};

use crate::commands::{
    load_config, migrated_pool, runtime, CommandResult, EXIT_CONFIG, EXIT_MODEL_FAILED,
    EXIT_MODEL_UNCONFIGURED,
};

const SIDE_EFFECT_DRAIN: Duration = Duration::from_secs(5);
const ABANDONED_WRITES_NOTE: &str =
    "(memory and lead-score updates were still pending at exit and may be lost)";

#[derive(Clone, Debug, Default)]
pub struct ChatArgs {
    pub message: String,
    pub client_id: Option<String>,
    pub conversation_id: Option<String>,
    pub whatsapp: bool,
}

/// Runs a single turn against the configured database and model.
pub fn run(args: ChatArgs) -> CommandResult {
    if args.message.trim().is_empty() {
        return CommandResult::failure("chat", "invalid_input", "message is empty", EXIT_CONFIG);
    }
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let model = DeepSeekClient::from_config(&config.llm)
            .map_err(|error| ("model_client", error.to_string(), EXIT_MODEL_FAILED))?
            .map(|client| Arc::new(client) as Arc<dyn ChatModel>);
        let Some(model) = model else {
            return Err((
                "model_unconfigured",
                AgentError::MissingApiKey.user_message().to_string(),
                EXIT_MODEL_UNCONFIGURED,
            ));
        };

        let pool = migrated_pool(&config).await?;
        let profiles = Arc::new(SqlClientProfileRepository::new(pool.clone()));
        let memory = Arc::new(SqlConversationMemoryRepository::new(pool.clone()));
        let (side_effects, worker) = SideEffectQueue::spawn(
            profiles.clone(),
            memory.clone(),
            config.agent.side_effect_queue_capacity,
        );
        let executor = CatalogToolExecutor::new(
            Arc::new(SqlCatalogRepository::new(pool.clone())),
            Arc::new(SqlQuoteRepository::new(pool.clone())),
            Arc::new(SqlBookingRepository::new(pool.clone())),
        );
        let orchestrator = ChatOrchestrator::new(
            Some(model),
            Arc::new(executor),
            PromptAssembler::new(profiles, memory, config.agent.memory_window),
            side_effects,
        )
        .with_max_round_trips(config.agent.max_tool_round_trips);

        let outcome = orchestrator.respond(request(args)).await;

        // Let queued memory and scoring writes land before the pool closes.
        drop(orchestrator);
        let drained = drain_side_effects(worker, SIDE_EFFECT_DRAIN).await;
        pool.close().await;

        outcome.map(|answer| with_drain_note(answer, drained)).map_err(|error| {
            let exit_code = match error {
                AgentError::MissingApiKey => EXIT_MODEL_UNCONFIGURED,
                AgentError::Llm(_) => EXIT_MODEL_FAILED,
            };
            ("model_call", error.to_string(), exit_code)
        })
    });

    match result {
        Ok(answer) => CommandResult::success("chat", answer),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

/// Returns false when the worker was still busy after `limit`.
async fn drain_side_effects(worker: impl Future, limit: Duration) -> bool {
    tokio::time::timeout(limit, worker).await.is_ok()
}

fn with_drain_note(answer: String, drained: bool) -> String {
    if drained {
        answer
    } else {
        format!("{answer}\n\n{ABANDONED_WRITES_NOTE}")
    }
}

fn request(args: ChatArgs) -> ChatRequest {
    let non_blank = |value: Option<String>| value.filter(|value| !value.trim().is_empty());

    ChatRequest {
        messages: vec![Message::user(args.message)],
        client_id: non_blank(args.client_id).map(ClientId),
        conversation_id: non_blank(args.conversation_id).map(ConversationId),
        source: Some(if args.whatsapp { "whatsapp" } else { "web" }.to_string()),
        ..ChatRequest::default()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use concierge_core::domain::client::ClientId;

    use super::{drain_side_effects, request, with_drain_note, ChatArgs, ABANDONED_WRITES_NOTE};

    #[test]
    fn request_drops_blank_identifiers_and_sets_the_channel() {
        let built = request(ChatArgs {
            message: "Two nights in Kathmandu".to_string(),
            client_id: Some("client-demo-001".to_string()),
            conversation_id: Some("  ".to_string()),
            whatsapp: true,
        });

        assert_eq!(built.messages.len(), 1);
        assert_eq!(built.client_id, Some(ClientId("client-demo-001".to_string())));
        assert_eq!(built.conversation_id, None);
        assert_eq!(built.source.as_deref(), Some("whatsapp"));
    }

    #[tokio::test]
    async fn a_stuck_side_effect_worker_is_reported_in_the_answer() {
        let stuck = drain_side_effects(std::future::pending::<()>(), Duration::from_millis(10)).await;
        assert!(!stuck);
        let answer = with_drain_note("Namaste!".to_string(), stuck);
        assert!(answer.starts_with("Namaste!"));
        assert!(answer.ends_with(ABANDONED_WRITES_NOTE));

        let drained = drain_side_effects(async {}, Duration::from_millis(10)).await;
        assert!(drained);
        assert_eq!(with_drain_note("Namaste!".to_string(), drained), "Namaste!");
    }
}
