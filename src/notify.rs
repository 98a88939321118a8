//! Outbound notifications: fire-and-forget delivery of moderation events.
//!
//! Engines push events into an unbounded in-process queue and move on. A single
//! background worker hands each event to every enabled [`NotifyChannel`].
//! Delivery failures are logged and dropped, never retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::domain::{category_label, Category, ConversationId, Task};
use crate::error::ChannelError;

/// Events produced by the submission and moderation flows.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// A contributor submission is waiting for the curator.
    SubmissionQueued {
        recipient: ConversationId,
        task_id: i64,
        submitted_by: ConversationId,
        summary: String,
        timestamp: DateTime<Utc>,
    },
    SubmissionAccepted {
        recipient: ConversationId,
        task_id: i64,
        summary: String,
        timestamp: DateTime<Utc>,
    },
    SubmissionRejected {
        recipient: ConversationId,
        task_id: i64,
        summary: String,
        timestamp: DateTime<Utc>,
    },
}

/// Short human description used in notification texts.
pub fn task_summary(task: &Task) -> String {
    match task.category {
        Category::Demo => format!("{}, {}, полугодие {}", task.subject, category_label(task.category), task.semester.unwrap_or(0)),
        Category::ControlWork => format!(
            "{}, {}, полугодие {}, задание {}",
            task.subject,
            category_label(task.category),
            task.semester.unwrap_or(0),
            task.task_order.unwrap_or(0)
        ),
        _ => format!(
            "{}, {}, урок {}, задание {}",
            task.subject,
            category_label(task.category),
            task.lesson_order.unwrap_or(0),
            task.task_order.unwrap_or(0)
        ),
    }
}

impl NotifyEvent {
    pub fn queued(curator: ConversationId, task: &Task) -> Self {
        NotifyEvent::SubmissionQueued {
            recipient: curator,
            task_id: task.id,
            submitted_by: task.submitted_by,
            summary: task_summary(task),
            timestamp: Utc::now(),
        }
    }

    pub fn accepted(task: &Task) -> Self {
        NotifyEvent::SubmissionAccepted {
            recipient: task.submitted_by,
            task_id: task.id,
            summary: task_summary(task),
            timestamp: Utc::now(),
        }
    }

    pub fn rejected(task: &Task) -> Self {
        NotifyEvent::SubmissionRejected {
            recipient: task.submitted_by,
            task_id: task.id,
            summary: task_summary(task),
            timestamp: Utc::now(),
        }
    }

    pub fn recipient(&self) -> ConversationId {
        match self {
            NotifyEvent::SubmissionQueued { recipient, .. }
            | NotifyEvent::SubmissionAccepted { recipient, .. }
            | NotifyEvent::SubmissionRejected { recipient, .. } => *recipient,
        }
    }

    /// Message text for the recipient.
    pub fn text(&self) -> String {
        match self {
            NotifyEvent::SubmissionQueued { task_id, submitted_by, summary, .. } => {
                format!("📬 Новое задание на модерацию!\n#{task_id}: {summary}\nОт: {submitted_by}")
            }
            NotifyEvent::SubmissionAccepted { summary, .. } => format!("🎉 Ваше задание «{summary}» одобрено!"),
            NotifyEvent::SubmissionRejected { summary, .. } => {
                format!("😔 К сожалению, ваше задание «{summary}» было отклонено модератором.")
            }
        }
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Send a notification event to this channel.
    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError>;
}

/// Always-on channel: writes the event to the log.
pub struct LogChannel;

#[async_trait]
impl NotifyChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        info!(target: "notify", recipient = event.recipient(), text = %event.text(), "Notification");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    recipient: ConversationId,
    text: String,
    event: &'a NotifyEvent,
}

/// Posts each event as JSON to a chat-transport webhook.
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: String) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl NotifyChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let payload = WebhookPayload { recipient: event.recipient(), text: event.text(), event };
        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(ChannelError::Status(response.status()));
        }
        debug!(target: "notify", url = %self.url, "Webhook delivered");
        Ok(())
    }
}

/// Producer handle, cheap to clone.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<NotifyEvent>>,
}

/// Consumer half; run it on a background task.
pub struct NotifyQueue {
    rx: mpsc::UnboundedReceiver<NotifyEvent>,
}

impl Notifier {
    pub fn channel() -> (Notifier, NotifyQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Notifier { tx: Some(tx) }, NotifyQueue { rx })
    }

    /// Notifier that drops everything (NOTIFY_DISABLED).
    pub fn disabled() -> Self {
        Notifier { tx: None }
    }

    /// Enqueue without waiting.
    pub fn notify(&self, event: NotifyEvent) {
        let Some(tx) = &self.tx else {
            debug!(target: "notify", "Notifications disabled, skipping event");
            return;
        };
        if tx.send(event).is_err() {
            warn!(target: "notify", "Notification worker stopped; event dropped");
        }
    }
}

impl NotifyQueue {
    /// Deliver events until every [`Notifier`] is dropped.
    pub async fn run(mut self, channels: Vec<Arc<dyn NotifyChannel>>) {
        info!(target: "notify", channel_count = channels.len(), "Notification worker started");
        while let Some(event) = self.rx.recv().await {
            for channel in &channels {
                if let Err(e) = channel.send(&event).await {
                    error!(target: "notify", channel = channel.name(), error = %e, "Failed to send notification");
                }
            }
        }
        info!(target: "notify", "Notification worker stopped");
    }

    #[cfg(test)]
    pub fn drain(&mut self) -> Vec<NotifyEvent> {
        let mut out = vec![];
        while let Ok(e) = self.rx.try_recv() {
            out.push(e);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskLink, Tier};
    use std::sync::Mutex;

    struct Recording(Arc<Mutex<Vec<NotifyEvent>>>);

    #[async_trait]
    impl NotifyChannel for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }
        async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl NotifyChannel for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn send(&self, _event: &NotifyEvent) -> Result<(), ChannelError> {
            Err(ChannelError::Status(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    fn task() -> Task {
        Task {
            id: 3,
            link: TaskLink { lesson_number: "1".into(), task_number: "2".into() },
            grade: 9,
            subject: "Физика".into(),
            tier: Tier::Regular,
            category: Category::Homework,
            lesson_order: Some(4),
            task_order: Some(2),
            variant: None,
            semester: None,
            media: vec![],
            created_at: Utc::now(),
            is_moderated: false,
            submitted_by: 55,
        }
    }

    #[tokio::test]
    async fn worker_delivers_past_a_failing_channel() {
        let (notifier, queue) = Notifier::channel();
        let seen = Arc::new(Mutex::new(vec![]));
        let channels: Vec<Arc<dyn NotifyChannel>> = vec![Arc::new(Failing), Arc::new(Recording(seen.clone()))];
        let worker = tokio::spawn(queue.run(channels));

        notifier.notify(NotifyEvent::accepted(&task()));
        notifier.notify(NotifyEvent::rejected(&task()));
        drop(notifier);
        worker.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].recipient(), 55);
    }

    #[test]
    fn queued_event_goes_to_curator() {
        let e = NotifyEvent::queued(1, &task());
        assert_eq!(e.recipient(), 1);
        assert!(e.text().contains("Физика, Домашняя работа, урок 4, задание 2"));
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["event"], "submission_queued");
    }

    #[test]
    fn disabled_notifier_drops_silently() {
        Notifier::disabled().notify(NotifyEvent::accepted(&task()));
    }
}
