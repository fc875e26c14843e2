//! Header-bidding auction analytics adapter.
//!
//! This crate correlates the lossy, ordered stream of auction lifecycle
//! events emitted by a header-bidding host into per-auction records, then
//! ships each record exactly once to the analytics collector after a
//! bounded wait for slot rendering.
//!
//! # Modules
//!
//! - [`adapter`]: Public adapter surface (enable, track, reset)
//! - [`campaign`]: UTM campaign attribution with config overrides
//! - [`config`]: Host options validation and the typed adapter config
//! - [`correlator`]: Event-correlation state machine
//! - [`device`]: Device, OS, and browser classification from user agents
//! - [`dispatcher`]: Delayed flush scheduling and the send-once guarantee
//! - [`error`]: Error types and error handling utilities
//! - [`events`]: Inbound lifecycle event types
//! - [`geometry`]: Slot geometry and above/below-the-fold classification
//! - [`identity`]: User-id provider summaries and id resolution
//! - [`payload`]: Auction payload construction
//! - [`store`]: In-flight auction record store
//! - [`transport`]: Collector delivery over HTTP

pub mod adapter;
pub mod campaign;
pub mod config;
pub mod correlator;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod geometry;
pub mod identity;
pub mod payload;
pub mod store;
pub mod transport;

pub use adapter::AnalyticsAdapter;
pub use config::{AnalyticsConfig, PageContext};
pub use events::AnalyticsEvent;
pub use transport::{HttpTransport, Transport};
