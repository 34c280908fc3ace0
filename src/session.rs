//! Per-user session state.
//!
//! Sessions are keyed by user id and guarded by a per-user async mutex,
//! so events for the same user serialize even if the transport ever
//! delivers them concurrently, while unrelated users proceed in
//! parallel. Session data is ephemeral and never shared across users.

use crate::dialogue::Control;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Dialogue position of one user. `ResultsShown` is transient: the
/// controller passes through it and lands on `AwaitingFollowUpChoice`
/// within the same turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingModeChoice,
    AwaitingFreeTextQuery,
    AwaitingKeywordQuery,
    ResultsShown,
    AwaitingFollowUpChoice,
}

/// Verbatim snapshot of a rendered result card, kept so "back" can
/// restore exactly what was shown before a price lookup replaced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCard {
    pub text: String,
    pub controls: Vec<Control>,
}

#[derive(Debug, Default)]
pub struct SessionContext {
    pub state: SessionState,
    pub last_query: Option<String>,
    /// Tool name (lowercased) to the card last rendered for it.
    pub last_shown_card: HashMap<String, RenderedCard>,
}

impl SessionContext {
    /// Return to `Idle` and discard all per-session scratch state.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.last_query = None;
        self.last_shown_card.clear();
    }
}

/// Concurrent session store: user id to an exclusively locked context.
#[derive(Default)]
pub struct SessionStore {
    inner: DashMap<i64, Arc<Mutex<SessionContext>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for one user's session, created on first interaction.
    pub fn session(&self, user_id: i64) -> Arc<Mutex<SessionContext>> {
        self.inner
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(SessionContext::default())))
            .value()
            .clone()
    }

    /// Distinct users seen since startup.
    pub fn user_count(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reset_discards_scratch_state() {
        let store = SessionStore::new();
        let session = store.session(1);

        {
            let mut ctx = session.lock().await;
            ctx.state = SessionState::AwaitingFollowUpChoice;
            ctx.last_query = Some("notes".to_string());
            ctx.last_shown_card.insert(
                "noteapp".to_string(),
                RenderedCard {
                    text: "card".to_string(),
                    controls: Vec::new(),
                },
            );
            ctx.reset();

            assert_eq!(ctx.state, SessionState::Idle);
            assert!(ctx.last_query.is_none());
            assert!(ctx.last_shown_card.is_empty());
        }
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_per_user() {
        let store = SessionStore::new();

        store.session(1).lock().await.state = SessionState::AwaitingModeChoice;
        assert_eq!(store.session(2).lock().await.state, SessionState::Idle);
        assert_eq!(store.user_count(), 2);
    }

    #[tokio::test]
    async fn test_same_user_gets_same_session() {
        let store = SessionStore::new();

        store.session(7).lock().await.last_query = Some("q".to_string());
        assert_eq!(
            store.session(7).lock().await.last_query.as_deref(),
            Some("q")
        );
        assert_eq!(store.user_count(), 1);
    }
}
