//! Delayed flush scheduling.
//!
//! Every relevant lifecycle transition (re)schedules a bounded wait before
//! the auction record is flushed. Rescheduling replaces the previous timer
//! rather than extending it, so at most one timer is outstanding per
//! auction. When rendering is incomplete the wait is padded, giving slow
//! slots a chance before the failsafe fires. Once a record is sent,
//! scheduling becomes a no-op: that is the send-once guarantee.
//!
//! Must be used from within a Tokio runtime; timers are spawned tasks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::AnalyticsConfig;
use crate::payload;
use crate::store::EventStore;
use crate::transport::Transport;

pub(crate) const STORE_LOCK: &str = "event store mutex poisoned";

pub struct DelayedDispatcher {
    store: Arc<Mutex<EventStore>>,
    transport: Arc<dyn Transport>,
    config: Arc<AnalyticsConfig>,
}

impl DelayedDispatcher {
    pub fn new(
        store: Arc<Mutex<EventStore>>,
        transport: Arc<dyn Transport>,
        config: Arc<AnalyticsConfig>,
    ) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// (Re)schedules the flush for an auction.
    ///
    /// Cancels any outstanding timer first. No-op when the auction is
    /// unknown or its payload already shipped.
    pub fn schedule(&self, auction_id: &str) {
        let mut store = self.store.lock().expect(STORE_LOCK);
        let Some(auction) = store.get_mut(auction_id) else {
            return;
        };
        if auction.sent {
            return;
        }
        auction.clear_flush_timer();

        let delay_ms = if auction.all_rendered() {
            self.config.payload_wait_ms
        } else {
            self.config.payload_wait_ms + self.config.payload_wait_padding_ms
        };

        let store_handle = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let config = Arc::clone(&self.config);
        let id = auction_id.to_string();
        auction.pending_flush = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            flush(&store_handle, transport.as_ref(), &config, &id).await;
        }));
    }
}

/// Builds and ships the payload, then releases the record.
///
/// `sent` is flipped before the transport call, so events arriving during
/// the send window take the late-win path. The record is removed whether
/// delivery succeeds or not.
async fn flush(
    store: &Mutex<EventStore>,
    transport: &dyn Transport,
    config: &AnalyticsConfig,
    auction_id: &str,
) {
    let auction_payload = {
        let mut guard = store.lock().expect(STORE_LOCK);
        let Some(auction) = guard.get_mut(auction_id) else {
            return;
        };
        if auction.sent {
            return;
        }
        auction.sent = true;
        auction.pending_flush = None;
        payload::build_auction_payload(auction, config)
    };

    match serde_json::to_string(&[auction_payload]) {
        Ok(body) => {
            log::debug!("flushing auction {auction_id}");
            if let Err(report) = transport.send_payload(body).await {
                log::error!("dropping auction {auction_id} payload: {report:?}");
            }
        }
        Err(err) => {
            log::error!("failed to serialize auction {auction_id} payload: {err}");
        }
    }

    store.lock().expect(STORE_LOCK).remove(auction_id);
}
