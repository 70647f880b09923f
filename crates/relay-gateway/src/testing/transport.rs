//! Webhook transport that records envelopes instead of posting them

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::events::WebhookEventType;
use crate::webhook::{DeliveryError, WebhookEnvelope, WebhookTransport};

#[derive(Default)]
pub struct RecordingTransport {
    delivered: Mutex<Vec<(String, WebhookEnvelope)>>,
    attempts: AtomicUsize,
    fail_next: AtomicUsize,
    fail_always: AtomicBool,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` attempts with a 500
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Fail every attempt with a 503 until switched off
    pub fn fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Every POST, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Envelopes that were accepted
    pub fn delivered(&self) -> Vec<WebhookEnvelope> {
        self.delivered.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Accepted envelopes with the URL they were posted to
    pub fn delivered_to(&self) -> Vec<(String, WebhookEnvelope)> {
        self.delivered.lock().clone()
    }

    pub fn events_of(&self, event_type: WebhookEventType) -> Vec<WebhookEnvelope> {
        self.delivered
            .lock()
            .iter()
            .filter(|(_, e)| e.event_type == event_type)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for RecordingTransport {
    async fn post(&self, url: &str, envelope: &WebhookEnvelope) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.fail_always.load(Ordering::SeqCst) {
            return Err(DeliveryError::Status(503));
        }
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DeliveryError::Status(500));
        }

        self.delivered
            .lock()
            .push((url.to_string(), envelope.clone()));
        Ok(())
    }
}
