//! Public adapter surface.
//!
//! The host enables the adapter once with its options object; an invalid
//! configuration is reported through a single error log and leaves the
//! adapter inert, in which case every subsequent [`track`] call is a
//! no-op. Sampling is applied upstream by the host, so any event stream
//! handed to [`track`] is assumed to be already sampled; the configured
//! rate only annotates the outgoing payload.
//!
//! [`track`]: AnalyticsAdapter::track

use std::sync::{Arc, Mutex};

use error_stack::Report;
use serde_json::Value as JsonValue;

use crate::config::{AnalyticsConfig, PageContext};
use crate::error::AnalyticsError;
use crate::correlator::Correlator;
use crate::events::AnalyticsEvent;
use crate::store::EventStore;
use crate::transport::{HttpTransport, Transport};

pub struct AnalyticsAdapter {
    store: Arc<Mutex<EventStore>>,
    correlator: Option<Correlator>,
}

impl AnalyticsAdapter {
    /// Validates the host options and enables the adapter over the HTTP
    /// transport. On a validation failure the error is logged once and the
    /// returned adapter is inert.
    #[must_use]
    pub fn enable(options: &JsonValue, page: PageContext) -> Self {
        match AnalyticsConfig::from_options(options, page) {
            Ok(config) => {
                let transport = HttpTransport::new(config.endpoint.clone());
                Self::with_transport(config, Arc::new(transport))
            }
            Err(err) => {
                let report = Report::new(AnalyticsError::Config {
                    field: err.field.to_string(),
                    message: err.to_string(),
                });
                log::error!("analytics adapter disabled: {report:?}");
                Self {
                    store: Arc::new(Mutex::new(EventStore::new())),
                    correlator: None,
                }
            }
        }
    }

    /// Enables the adapter over a caller-supplied transport.
    #[must_use]
    pub fn with_transport(config: AnalyticsConfig, transport: Arc<dyn Transport>) -> Self {
        let store = Arc::new(Mutex::new(EventStore::new()));
        let correlator = Correlator::new(Arc::clone(&store), Arc::new(config), transport);
        Self {
            store,
            correlator: Some(correlator),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.correlator.is_some()
    }

    /// Feeds one lifecycle event into the correlation engine.
    pub fn track(&self, event: AnalyticsEvent) {
        if let Some(correlator) = &self.correlator {
            correlator.handle(event);
        }
    }

    /// Drops all in-flight auction records and cancels their timers.
    pub fn reset(&self) {
        if let Ok(mut store) = self.store.lock() {
            store.reset();
        }
    }
}
