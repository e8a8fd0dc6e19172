//! Message Reconciler
//!
//! Client-side merge layer producing the single ordered message list the UI
//! renders. Three feeds land here: optimistic `temp-` entries created at
//! send time, push events, and a polling fallback that only runs while some
//! message is still generating. The transport guarantees nothing about
//! ordering or duplication; this module is the sole source of ordering
//! truth.
//!
//! The merge rule is idempotent and order-independent: dedupe by id first,
//! then by `client_message_id` against unconfirmed temp rows.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use crate::models::Message;

pub const TEMP_PREFIX: &str = "temp-";

/// How long a message may sit at 100% progress, still generating, before the
/// client surfaces a stuck warning.
pub const STUCK_WARNING_SECS: i64 = 180;

/// A message as the client view sees it: either an optimistic local entry
/// (`temp-` id) or a persisted row keyed by its server id.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub id: String,
    pub client_message_id: Option<String>,
    pub role: String,
    pub content: String,
    pub is_generating: bool,
    pub generation_progress: i32,
    pub created_at: DateTime<Utc>,
}

impl ClientMessage {
    pub fn is_temp(&self) -> bool {
        self.id.starts_with(TEMP_PREFIX)
    }

    /// Optimistic local copy shown immediately at send time. Superseded,
    /// never merged in place, once the persisted row arrives.
    pub fn optimistic(client_message_id: &str, content: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}{}", TEMP_PREFIX, client_message_id),
            client_message_id: Some(client_message_id.to_string()),
            role: "user".to_string(),
            content: content.to_string(),
            is_generating: false,
            generation_progress: 0,
            created_at,
        }
    }
}

impl From<Message> for ClientMessage {
    fn from(m: Message) -> Self {
        Self {
            id: m.id.to_string(),
            client_message_id: m.client_message_id,
            role: m.role,
            content: m.content,
            is_generating: m.is_generating,
            generation_progress: m.generation_progress,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Default)]
pub struct MessageReconciler {
    messages: Vec<ClientMessage>,
}

impl MessageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ClientMessage] {
        &self.messages
    }

    /// The polling fallback runs exactly while this is true.
    pub fn needs_polling(&self) -> bool {
        self.messages.iter().any(|m| m.is_generating)
    }

    /// Messages stuck at completed progress but still flagged generating
    /// past the warning threshold.
    pub fn stuck_messages(&self, now: DateTime<Utc>) -> Vec<&ClientMessage> {
        self.messages
            .iter()
            .filter(|m| {
                m.is_generating
                    && m.generation_progress >= 100
                    && (now - m.created_at).num_seconds() > STUCK_WARNING_SECS
            })
            .collect()
    }

    /// Show a locally-created message immediately. No-op if the same id is
    /// already present.
    pub fn add_optimistic(&mut self, message: ClientMessage) {
        if self.index_of(&message.id).is_none() {
            self.insert_ordered(message);
        }
    }

    /// Merge one row from any feed — push insert, push update, or poll
    /// result. Safe to apply the same row any number of times in any order.
    pub fn apply(&mut self, message: ClientMessage) {
        // Same id: replace in place (progress ticks, finalized content).
        if let Some(i) = self.index_of(&message.id) {
            self.messages[i] = message;
            return;
        }

        // A persisted row confirming an optimistic entry: the temp copy is
        // removed, never kept alongside.
        if !message.is_temp() {
            if let Some(client_id) = &message.client_message_id {
                if let Some(i) = self
                    .messages
                    .iter()
                    .position(|m| m.is_temp() && m.client_message_id.as_ref() == Some(client_id))
                {
                    self.messages.remove(i);
                }
            }
        }

        self.insert_ordered(message);
    }

    pub fn apply_all(&mut self, batch: impl IntoIterator<Item = ClientMessage>) {
        for message in batch {
            self.apply(message);
        }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    // Causal order: created_at, with id as the tiebreaker so equal
    // timestamps still order deterministically.
    fn insert_ordered(&mut self, message: ClientMessage) {
        let pos = self
            .messages
            .iter()
            .position(|m| {
                (m.created_at, m.id.as_str()) > (message.created_at, message.id.as_str())
            })
            .unwrap_or(self.messages.len());
        self.messages.insert(pos, message);
    }
}

/// Drive the polling fallback: fetch and merge on an interval while any
/// message is generating, stopping once none remain.
pub async fn run_poll_loop<F, Fut>(
    reconciler: Arc<Mutex<MessageReconciler>>,
    interval: Duration,
    mut fetch: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<ClientMessage>, crate::types::AppError>>,
{
    loop {
        {
            let guard = reconciler.lock().expect("reconciler lock");
            if !guard.needs_polling() {
                info!("Polling fallback stopped, nothing generating");
                return;
            }
        }

        tokio::time::sleep(interval).await;

        match fetch().await {
            Ok(batch) => {
                let mut guard = reconciler.lock().expect("reconciler lock");
                guard.apply_all(batch);
            }
            Err(e) => warn!(error = %e, "Poll fetch failed, will retry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(id: &str, client_id: Option<&str>, secs: i64) -> ClientMessage {
        ClientMessage {
            id: id.to_string(),
            client_message_id: client_id.map(|s| s.to_string()),
            role: "assistant".to_string(),
            content: format!("content-{}", id),
            is_generating: false,
            generation_progress: 0,
            created_at: DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn applying_same_row_twice_keeps_one_entry() {
        let mut r = MessageReconciler::new();
        r.apply(persisted("m1", None, 0));
        r.apply(persisted("m1", None, 0));
        assert_eq!(r.messages().len(), 1);
    }

    #[test]
    fn persisted_row_supersedes_optimistic_copy() {
        let mut r = MessageReconciler::new();
        r.add_optimistic(ClientMessage::optimistic(
            "c1",
            "hello",
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        assert_eq!(r.messages().len(), 1);
        assert!(r.messages()[0].is_temp());

        r.apply(persisted("m1", Some("c1"), 1));
        assert_eq!(r.messages().len(), 1);
        assert_eq!(r.messages()[0].id, "m1");
    }

    #[test]
    fn push_and_poll_race_is_safe_either_order() {
        // push then poll
        let mut r1 = MessageReconciler::new();
        r1.add_optimistic(ClientMessage::optimistic(
            "c1",
            "hello",
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        r1.apply(persisted("m1", Some("c1"), 1));
        r1.apply(persisted("m1", Some("c1"), 1));

        // poll (batch) then push
        let mut r2 = MessageReconciler::new();
        r2.add_optimistic(ClientMessage::optimistic(
            "c1",
            "hello",
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        r2.apply_all(vec![persisted("m1", Some("c1"), 1)]);
        r2.apply(persisted("m1", Some("c1"), 1));

        assert_eq!(r1.messages(), r2.messages());
        assert_eq!(r1.messages().len(), 1);
    }

    #[test]
    fn update_replaces_in_place() {
        let mut r = MessageReconciler::new();
        let mut m = persisted("m1", None, 0);
        m.is_generating = true;
        m.generation_progress = 5;
        r.apply(m.clone());

        m.generation_progress = 80;
        r.apply(m.clone());
        assert_eq!(r.messages().len(), 1);
        assert_eq!(r.messages()[0].generation_progress, 80);
    }

    #[test]
    fn rows_order_by_created_at_regardless_of_arrival() {
        let mut r = MessageReconciler::new();
        r.apply(persisted("m3", None, 30));
        r.apply(persisted("m1", None, 10));
        r.apply(persisted("m2", None, 20));

        let ids: Vec<&str> = r.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn polling_gate_follows_generating_flags() {
        let mut r = MessageReconciler::new();
        assert!(!r.needs_polling());

        let mut m = persisted("m1", None, 0);
        m.is_generating = true;
        r.apply(m.clone());
        assert!(r.needs_polling());

        m.is_generating = false;
        r.apply(m);
        assert!(!r.needs_polling());
    }

    #[test]
    fn stuck_warning_fires_after_threshold_at_full_progress() {
        let mut r = MessageReconciler::new();
        let mut m = persisted("m1", None, 0);
        m.is_generating = true;
        m.generation_progress = 100;
        let created = m.created_at;
        r.apply(m);

        let before = created + chrono::Duration::seconds(STUCK_WARNING_SECS - 10);
        let after = created + chrono::Duration::seconds(STUCK_WARNING_SECS + 10);
        assert!(r.stuck_messages(before).is_empty());
        assert_eq!(r.stuck_messages(after).len(), 1);
    }

    #[test]
    fn unrelated_rows_append_without_touching_temps() {
        let mut r = MessageReconciler::new();
        r.add_optimistic(ClientMessage::optimistic(
            "c1",
            "hello",
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        r.apply(persisted("m9", Some("other-client"), 5));
        assert_eq!(r.messages().len(), 2);
        assert!(r.messages().iter().any(|m| m.is_temp()));
    }

    #[tokio::test]
    async fn poll_loop_stops_when_generation_resolves() {
        let mut generating = persisted("m1", None, 0);
        generating.is_generating = true;

        let reconciler = Arc::new(Mutex::new(MessageReconciler::new()));
        reconciler
            .lock()
            .unwrap()
            .apply(generating.clone());

        let resolved = {
            let mut m = generating.clone();
            m.is_generating = false;
            m.content = "done".to_string();
            m
        };

        let r = reconciler.clone();
        run_poll_loop(r, Duration::from_millis(5), move || {
            let resolved = resolved.clone();
            async move { Ok(vec![resolved]) }
        })
        .await;

        let guard = reconciler.lock().unwrap();
        assert!(!guard.needs_polling());
        assert_eq!(guard.messages()[0].content, "done");
    }
}
