//! Long-polling update source.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use gramkit_core::{GetUpdates, Update};

/// Settings of the `getUpdates` loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Pause between two fetches.
    #[serde(with = "millis")]
    pub interval: Duration,
    /// Long-poll timeout passed to the API, in seconds.
    pub timeout_secs: u64,
    /// Maximum number of updates per fetch.
    pub limit: Option<u32>,
    /// Update kinds to receive; `None` keeps the server-side setting.
    pub allowed_updates: Option<Vec<String>>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout_secs: 30,
            limit: None,
            allowed_updates: None,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

impl Dispatcher {
    /// Polls forever with the default settings.
    pub async fn start_polling(&self) {
        self.run_polling(&PollingConfig::default(), CancellationToken::new())
            .await;
    }

    /// Polls until `cancel` fires.
    ///
    /// Updates are dispatched one at a time in delivery order. A failing
    /// update is logged and the rest of the batch is still dispatched; a
    /// failing fetch is logged and retried after `interval`. The offset
    /// always moves past every received update, so nothing is delivered
    /// twice. An update that cannot be decoded is skipped the same way.
    pub async fn run_polling(&self, config: &PollingConfig, cancel: CancellationToken) {
        info!(
            interval_ms = config.interval.as_millis() as u64,
            timeout_secs = config.timeout_secs,
            "Polling started"
        );

        let mut offset: Option<i64> = None;
        loop {
            let params = GetUpdates {
                offset,
                limit: config.limit,
                timeout: Some(config.timeout_secs),
                allowed_updates: config.allowed_updates.clone(),
            };

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.bot().get_raw_updates(&params) => result,
            };

            match fetched {
                Ok(updates) => {
                    if !updates.is_empty() {
                        debug!(count = updates.len(), "Fetched updates");
                    }
                    for raw in updates {
                        let Some(update_id) = raw.get("update_id").and_then(Value::as_i64) else {
                            warn!("Skipping update without update_id");
                            continue;
                        };
                        offset = Some(offset.map_or(update_id + 1, |o| o.max(update_id + 1)));

                        let update = match serde_json::from_value::<Update>(raw) {
                            Ok(update) => update,
                            Err(e) => {
                                warn!(update_id, error = %e, "Skipping undecodable update");
                                continue;
                            }
                        };
                        if let Err(e) = self.process_update(update).await {
                            warn!(update_id, error = %e, "Update dropped");
                        }
                    }
                }
                Err(e) => error!(error = %e, "Failed to fetch updates"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(config.interval) => {}
            }
        }

        info!("Polling stopped");
    }
}
