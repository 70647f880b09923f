//! Socket liveness watchdog
//!
//! Some sockets die without emitting a close. While a session is connected, the
//! watchdog polls the handle on a fixed interval and forces a reconnect when the
//! socket is no longer open.

use relay_core::SessionStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::Session;

impl Session {
    pub(super) fn start_watchdog(self: &Arc<Self>, epoch: u64) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.run_watchdog(epoch).await;
        });
    }

    async fn run_watchdog(self: Arc<Self>, epoch: u64) {
        let mut ticker = tokio::time::interval(self.policy().watchdog_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                () = self.shutdown_token().cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.is_live(epoch) || self.status() != SessionStatus::Connected {
                break;
            }
            if self.socket_is_open() {
                continue;
            }

            tracing::warn!(tenant_id = %self.tenant_id(), "Socket died silently, reconnecting");
            if let Some(handle) = self.take_live_handle(epoch) {
                handle.terminate().await;
            }
            if !self.is_live(epoch) {
                break;
            }
            self.set_status(SessionStatus::Connecting, Some("socket unresponsive".to_string()));
            self.schedule_connect(epoch, Duration::ZERO);
            break;
        }

        tracing::trace!(tenant_id = %self.tenant_id(), epoch, "Watchdog stopped");
    }
}
