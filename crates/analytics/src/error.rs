use derive_more::{Display, Error};

/// Error type for the analytics engine.
///
/// Correlation misses (events referencing auctions or bids the store has
/// never seen) are deliberately *not* represented here: the lifecycle
/// stream is lossy by design and those are handled as silent no-ops.
#[derive(Debug, Display, Error)]
pub enum AnalyticsError {
    #[display("Configuration error on '{field}': {message}")]
    Config { field: String, message: String },

    #[display("Serialization error: {message}")]
    Serialization { message: String },

    #[display("Transport error: {message}")]
    Transport { message: String },
}

pub type Result<T> = std::result::Result<T, error_stack::Report<AnalyticsError>>;
