//! Per-conversation session store.
//!
//! Sessions are created on first use and dropped once idle. Each one sits
//! behind its own async mutex so turns of one conversation run one at a time,
//! while different conversations never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::domain::ConversationId;
use crate::navigation::SearchSelection;
use crate::submission::SubmissionDraft;

/// One-shot curator action waiting for the next text message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingAction {
    DeleteTask,
}

#[derive(Debug, Default)]
pub struct Session {
    pub draft: Option<SubmissionDraft>,
    pub selection: SearchSelection,
    pub pending: Option<PendingAction>,
}

impl Session {
    pub fn is_idle(&self) -> bool {
        self.draft.is_none() && self.selection.is_empty() && self.pending.is_none()
    }

    /// Back to the main menu: everything ephemeral is forgotten.
    pub fn reset(&mut self) {
        self.draft = None;
        self.selection = SearchSelection::default();
        self.pending = None;
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Clone, Default)]
pub struct Sessions {
    inner: Arc<RwLock<HashMap<ConversationId, SessionHandle>>>,
}

impl Sessions {
    /// Handle for `id`, created if absent.
    pub async fn acquire(&self, id: ConversationId) -> SessionHandle {
        if let Some(h) = self.inner.read().await.get(&id) {
            return h.clone();
        }
        self.inner.write().await.entry(id).or_default().clone()
    }

    /// Give a handle back; the entry is removed when nobody else holds it and
    /// the session carries no state.
    pub async fn release(&self, id: ConversationId, handle: SessionHandle) {
        let mut map = self.inner.write().await;
        // map + this handle
        if Arc::strong_count(&handle) > 2 {
            return;
        }
        let idle = handle.try_lock().map(|s| s.is_idle()).unwrap_or(false);
        if idle {
            map.remove(&id);
            debug!(target: "gdz_catalog", conversation = id, "Idle session dropped");
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_sessions_are_dropped_on_release() {
        let sessions = Sessions::default();
        let h = sessions.acquire(1).await;
        sessions.release(1, h).await;
        assert_eq!(sessions.len().await, 0);
    }

    #[tokio::test]
    async fn sessions_with_state_survive_and_stay_separate() {
        let sessions = Sessions::default();
        let a = sessions.acquire(1).await;
        a.lock().await.selection.grade = Some(9);
        sessions.release(1, a).await;

        let b = sessions.acquire(2).await;
        assert!(b.lock().await.is_idle());
        sessions.release(2, b).await;

        assert_eq!(sessions.len().await, 1);
        let a = sessions.acquire(1).await;
        assert_eq!(a.lock().await.selection.grade, Some(9));
    }

    #[tokio::test]
    async fn shared_handle_is_not_removed() {
        let sessions = Sessions::default();
        let a = sessions.acquire(1).await;
        let other = sessions.acquire(1).await;
        sessions.release(1, a).await;
        assert_eq!(sessions.len().await, 1);
        sessions.release(1, other).await;
        assert_eq!(sessions.len().await, 0);
    }
}
