//! Completion notifications for long-running jobs.

mod provider;
mod webhook;

use std::sync::Arc;

pub use provider::{CompletionNotifier, CompletionSummary, NotifyError};
pub use webhook::WebhookNotifier;

use crate::config::NotifierConfig;

/// Builds the configured notifier, or `None` when every channel is disabled.
pub fn build_notifier(
    config: &NotifierConfig,
) -> Result<Option<Arc<dyn CompletionNotifier>>, NotifyError> {
    if !config.webhook.enabled {
        return Ok(None);
    }

    let notifier = WebhookNotifier::new(&config.webhook)?;
    tracing::info!(url = %config.webhook.url, "Completion webhook enabled");
    Ok(Some(Arc::new(notifier)))
}
