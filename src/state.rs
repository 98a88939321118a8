//! Application state: catalog store, media, outbound notifications and sessions.
//!
//! This module owns:
//!   - the configuration loaded at startup
//!   - the SQLite-backed catalog
//!   - the media directory
//!   - the notification producer (the worker runs on its own task)
//!   - the per-conversation session store

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::config::AppConfig;
use crate::domain::ConversationId;
use crate::error::{AppError, StoreError};
use crate::media::MediaStore;
use crate::notify::{LogChannel, NotifyChannel, Notifier, WebhookChannel};
use crate::session::Sessions;
use crate::store::Catalog;
use crate::submission::SubmitContext;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<Catalog>,
    pub media: MediaStore,
    pub notifier: Notifier,
    pub sessions: Sessions,
}

impl AppState {
    pub fn new(config: AppConfig, catalog: Catalog, notifier: Notifier) -> Self {
        Self {
            media: MediaStore::new(&config.media_dir),
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            notifier,
            sessions: Sessions::default(),
        }
    }

    /// Open the catalog and start the notification worker. Must run inside a tokio runtime.
    #[instrument(level = "info", skip_all)]
    pub fn from_config(config: AppConfig) -> Result<Self, StoreError> {
        let catalog = Catalog::open(&config.database_path)?;
        let notifier = start_notifier(&config);
        match config.curator_id {
            Some(id) => info!(target: "gdz_catalog", curator = id, "Curator configured"),
            None => warn!(target: "gdz_catalog", "No CURATOR_ID set; curator features unavailable"),
        }
        info!(target: "gdz_catalog", media_dir = %config.media_dir, subjects = config.subjects.len(), "State ready");
        Ok(Self::new(config, catalog, notifier))
    }

    pub fn is_curator(&self, id: ConversationId) -> bool {
        self.config.is_curator(id)
    }

    pub fn submit_context(&self, submitter: ConversationId) -> SubmitContext<'_> {
        SubmitContext {
            catalog: &self.catalog,
            notifier: &self.notifier,
            subjects: &self.config.subjects,
            curator: self.config.curator_id,
            submitter,
        }
    }

    /// Run catalog work on the blocking pool. SQLite calls never run on a runtime worker.
    pub async fn blocking<T, F>(&self, work: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&AppState) -> Result<T, AppError> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || work(&state)).await?
    }

    /// Update the "last requested" counter off the turn's path.
    pub fn touch_last_request(&self) {
        let catalog = self.catalog.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = catalog.touch_last_request() {
                warn!(target: "catalog", error = %e, "Could not update request statistics");
            }
        });
    }
}

fn start_notifier(config: &AppConfig) -> Notifier {
    if config.notify.disabled {
        info!(target: "notify", "Notifications disabled via config");
        return Notifier::disabled();
    }

    let mut channels: Vec<Arc<dyn NotifyChannel>> = vec![Arc::new(LogChannel)];
    if let Some(url) = &config.notify.webhook_url {
        match WebhookChannel::new(url.clone()) {
            Ok(ch) => {
                info!(target: "notify", %url, "Webhook notifications enabled");
                channels.push(Arc::new(ch));
            }
            Err(e) => error!(target: "notify", error = %e, "Failed to build webhook client; webhook disabled"),
        }
    }

    let (notifier, queue) = Notifier::channel();
    tokio::spawn(queue.run(channels));
    notifier
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SenderInfo;

    #[tokio::test(flavor = "current_thread")]
    async fn blocking_work_sees_the_shared_catalog() {
        let (notifier, _queue) = Notifier::channel();
        let state = AppState::new(AppConfig::default(), Catalog::open_in_memory().unwrap(), notifier);
        state.blocking(|st| Ok(st.catalog.record_user(7, &SenderInfo::default())?)).await.unwrap();
        let stats = state.blocking(|st| Ok(st.catalog.statistics()?)).await.unwrap();
        assert_eq!(stats.total_users, 1);

        let failed = state.blocking(|_| -> Result<(), AppError> { panic!("worker") }).await;
        assert!(matches!(failed, Err(AppError::Join(_))));
    }
}
