//! Session manager: the entry point that routes each user message to its
//! conversation and serializes turns within a session.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use supportdesk_config::AppConfig;
use supportdesk_core::error::Result;
use supportdesk_core::event::EventBus;
use supportdesk_core::message::{Message, SessionId};
use supportdesk_core::provider::Provider;
use supportdesk_core::tool::ToolRegistry;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::Instant;
use tracing::info;

use crate::controller::{TurnController, TurnOutcome};
use crate::reasoner::Reasoner;
use crate::state::ConversationState;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(1800);
const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct Session {
    state: Mutex<ConversationState>,
    /// Committed history, readable while a turn is in flight
    history: watch::Sender<Vec<Message>>,
    /// Milliseconds since the manager's epoch
    last_active: AtomicU64,
}

impl Session {
    fn new(session_id: SessionId, now: u64) -> Self {
        Self {
            state: Mutex::new(ConversationState::new(session_id)),
            history: watch::channel(Vec::new()).0,
            last_active: AtomicU64::new(now),
        }
    }

    fn last_active(&self) -> u64 {
        self.last_active.load(Ordering::Relaxed)
    }
}

type SessionSlot = Arc<Session>;

/// Owns every live conversation.
///
/// Each session sits behind its own mutex, so two messages for the same
/// session run one after the other while different sessions proceed
/// independently. The map lock is only held to look up or insert a slot.
///
/// Sessions left idle past the idle timeout are dropped when a new session is
/// created, and the map never grows past `max_sessions` unless every session
/// is mid-turn. A session with a turn in flight is never dropped.
pub struct SessionManager {
    controller: TurnController,
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
    epoch: Instant,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(controller: TurnController) -> Self {
        Self {
            controller,
            sessions: RwLock::new(HashMap::new()),
            epoch: Instant::now(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max.max(1);
        self
    }

    /// Wire a manager from configuration and the shared start-up components.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let reasoner = Reasoner::new(
            provider,
            &config.default_model,
            config.default_temperature,
            tools.clone(),
        )
        .with_max_tokens(config.default_max_tokens)
        .with_max_retries(config.agent.max_reasoning_retries)
        .with_timeout(Duration::from_secs(config.agent.reasoning_timeout_secs));

        let controller = TurnController::new(reasoner, tools, event_bus)
            .with_max_tool_rounds(config.agent.max_tool_rounds);
        Self::new(controller)
            .with_idle_timeout(Duration::from_secs(config.agent.session_idle_timeout_secs))
            .with_max_sessions(config.agent.max_sessions)
    }

    pub fn controller(&self) -> &TurnController {
        &self.controller
    }

    /// Run one user turn in the given session, creating it if needed.
    pub async fn handle(&self, session_id: &SessionId, message: &str) -> Result<TurnOutcome> {
        let slot = self.slot(session_id).await;
        self.touch(&slot);

        let mut state = slot.state.lock().await;
        let result = self.controller.run_turn(&mut state, message).await;
        if result.is_ok() {
            slot.history.send_replace(state.messages().to_vec());
        }
        self.touch(&slot);
        result
    }

    /// The committed message history of a session, if it exists.
    ///
    /// Does not wait for a turn in flight; its messages appear once it
    /// completes.
    pub async fn history(&self, session_id: &SessionId) -> Option<Vec<Message>> {
        let slot = self.sessions.read().await.get(session_id).cloned()?;
        let history = slot.history.borrow().clone();
        Some(history)
    }

    /// Forget a session. Returns whether it existed.
    pub async fn reset(&self, session_id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(session_id = %session_id, "Session reset");
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn slot(&self, session_id: &SessionId) -> SessionSlot {
        if let Some(slot) = self.sessions.read().await.get(session_id) {
            return slot.clone();
        }

        let mut sessions = self.sessions.write().await;
        if let Some(slot) = sessions.get(session_id) {
            return slot.clone();
        }

        self.evict(&mut sessions);
        let slot = Arc::new(Session::new(session_id.clone(), self.now()));
        sessions.insert(session_id.clone(), slot.clone());
        info!(session_id = %session_id, sessions = sessions.len(), "Session created");
        slot
    }

    /// Drop idle sessions, then the least recently active ones while the map
    /// is full. Slots cloned out of the map belong to a turn in flight.
    fn evict(&self, sessions: &mut HashMap<SessionId, SessionSlot>) {
        let before = sessions.len();
        let now = self.now();
        let idle_ms = millis(self.idle_timeout);
        sessions.retain(|_, slot| {
            Arc::strong_count(slot) > 1 || now.saturating_sub(slot.last_active()) < idle_ms
        });

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, slot)| Arc::strong_count(slot) == 1)
                .min_by_key(|(_, slot)| slot.last_active())
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted inactive sessions");
        }
    }

    fn touch(&self, slot: &Session) {
        slot.last_active.store(self.now(), Ordering::Relaxed);
    }

    fn now(&self) -> u64 {
        millis(self.epoch.elapsed())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
