//! Fire-and-forget persistence for chat turns.
//!
//! The orchestrator never awaits these writes. Effects travel over a bounded
//! channel to one background worker; a full queue drops the effect.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use concierge_core::domain::client::ClientId;
use concierge_core::domain::conversation::ConversationTurn;
use concierge_db::repositories::{
    ClientProfileRepository, ConversationMemoryRepository, RepositoryError,
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SideEffect {
    ScoreLead { client_id: ClientId, delta: i32 },
    RememberTurn(ConversationTurn),
    UpdateLocale { client_id: ClientId, locale: String },
}

impl SideEffect {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ScoreLead { .. } => "score_lead",
            Self::RememberTurn(_) => "remember_turn",
            Self::UpdateLocale { .. } => "update_locale",
        }
    }
}

#[derive(Clone)]
pub struct SideEffectQueue {
    sender: mpsc::Sender<SideEffect>,
}

impl SideEffectQueue {
    /// Spawns the worker on the current Tokio runtime. The worker exits once
    /// every queue handle has been dropped.
    pub fn spawn(
        profiles: Arc<dyn ClientProfileRepository>,
        memory: Arc<dyn ConversationMemoryRepository>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = SideEffectWorker { profiles, memory };
        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender }, handle)
    }

    /// Queue without a worker, for callers that inspect effects themselves.
    pub fn detached(capacity: usize) -> (Self, mpsc::Receiver<SideEffect>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Never blocks. Returns whether the effect was queued.
    pub fn enqueue(&self, effect: SideEffect) -> bool {
        match self.sender.try_send(effect) {
            Ok(()) => true,
            Err(TrySendError::Full(effect)) => {
                warn!(
                    event_name = "agent.side_effect.dropped",
                    kind = effect.kind(),
                    reason = "queue_full",
                    "side effect dropped"
                );
                false
            }
            Err(TrySendError::Closed(effect)) => {
                warn!(
                    event_name = "agent.side_effect.dropped",
                    kind = effect.kind(),
                    reason = "worker_stopped",
                    "side effect dropped"
                );
                false
            }
        }
    }
}

struct SideEffectWorker {
    profiles: Arc<dyn ClientProfileRepository>,
    memory: Arc<dyn ConversationMemoryRepository>,
}

impl SideEffectWorker {
    async fn run(self, mut receiver: mpsc::Receiver<SideEffect>) {
        while let Some(effect) = receiver.recv().await {
            let kind = effect.kind();
            match self.apply(effect).await {
                Ok(()) => debug!(event_name = "agent.side_effect.applied", kind, "side effect applied"),
                Err(RepositoryError::NotFound { entity, id }) => debug!(
                    event_name = "agent.side_effect.skipped",
                    kind,
                    entity,
                    id = %id,
                    "side effect target does not exist"
                ),
                Err(error) => warn!(
                    event_name = "agent.side_effect.failed",
                    kind,
                    error = %error,
                    "side effect failed"
                ),
            }
        }
        debug!(event_name = "agent.side_effect.worker_stopped", "side effect worker stopped");
    }

    async fn apply(&self, effect: SideEffect) -> Result<(), RepositoryError> {
        match effect {
            SideEffect::ScoreLead { client_id, delta } => {
                self.profiles.adjust_lead_score(&client_id, delta).await.map(|_| ())
            }
            SideEffect::RememberTurn(turn) => self.memory.append(turn).await,
            SideEffect::UpdateLocale { client_id, locale } => {
                self.profiles.update_locale(&client_id, &locale).await
            }
        }
    }
}
