//! Moderation queue: pending contributor submissions, oldest first.
//!
//! The curator always reviews the head of the queue. Approve and decline both
//! notify the submitter through the outbound queue and move on to the new head.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::Task;
use crate::error::AppError;
use crate::media::MediaStore;
use crate::notify::{NotifyEvent, Notifier};
use crate::store::Catalog;

#[derive(Clone, Debug, PartialEq)]
pub enum QueueView {
    Empty,
    Head { task: Task, shown: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Approved(Task),
    Declined(Task),
    /// Already handled or deleted; not an error.
    Gone,
}

/// Current head of the queue and how many items the batch holds.
pub fn head(catalog: &Catalog, batch: usize) -> Result<QueueView, AppError> {
    let queue = catalog.moderation_queue(batch)?;
    let shown = queue.len();
    Ok(match queue.into_iter().next() {
        Some(task) => QueueView::Head { task, shown },
        None => QueueView::Empty,
    })
}

#[instrument(level = "info", skip(catalog, notifier))]
pub fn approve(catalog: &Catalog, notifier: &Notifier, id: i64) -> Result<Verdict, AppError> {
    let Some(task) = catalog.approve(id)? else {
        return Ok(Verdict::Gone);
    };
    info!(target: "moderation", id, submitter = task.submitted_by, "Submission approved");
    notifier.notify(NotifyEvent::accepted(&task));
    Ok(Verdict::Approved(task))
}

/// Delete a pending task and its media. The row goes on the blocking pool.
#[instrument(level = "info", skip(catalog, media, notifier))]
pub async fn decline(catalog: &Arc<Catalog>, media: &MediaStore, notifier: &Notifier, id: i64) -> Result<Verdict, AppError> {
    let catalog = Arc::clone(catalog);
    let deleted = tokio::task::spawn_blocking(move || catalog.delete_pending(id)).await??;
    let Some(task) = deleted else {
        return Ok(Verdict::Gone);
    };
    media.remove_all(&task.media).await;
    info!(target: "moderation", id, submitter = task.submitted_by, "Submission declined");
    notifier.notify(NotifyEvent::rejected(&task));
    Ok(Verdict::Declined(task))
}
