//! Lifecycle events delivered by the host auction runtime.
//!
//! The host orchestrator owns auction timing and bidder dispatch; this crate
//! only observes. Each event kind carries a typed payload, and dispatch is a
//! `match` over [`AnalyticsEvent`] rather than string comparison.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::geometry::SlotGeometry;

/// A lifecycle event from the host orchestrator.
#[derive(Debug, Clone)]
pub enum AnalyticsEvent {
    AuctionInit(AuctionInit),
    BidRequested(BidRequested),
    BidResponse(BidResponse),
    NoBid(NoBid),
    BidTimeout(Vec<TimeoutEntry>),
    AuctionEnd(AuctionEnd),
    BidWon(BidWon),
    SlotRendered(SlotRendered),
}

/// Announces a new auction and the ad units participating in it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionInit {
    pub auction_id: String,
    /// Auction start, epoch milliseconds.
    pub timestamp: i64,
    /// Bidder timeout in milliseconds.
    pub timeout: u64,
    pub ad_unit_codes: Vec<String>,
}

/// Media-type configuration as declared on the ad unit (e.g. banner sizes).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTypeConfig {
    #[serde(default)]
    pub sizes: Vec<[u32; 2]>,
}

/// One bidder's solicitation for one ad unit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidderRequest {
    pub ad_unit_code: String,
    pub bidder: String,
    /// Identifies the bid request; bid responses refer back to it.
    pub bid_id: String,
    #[serde(default)]
    pub media_types: HashMap<String, MediaTypeConfig>,
    #[serde(default)]
    pub params: JsonValue,
    /// Client- or server-side request origin.
    #[serde(default)]
    pub src: Option<String>,
    /// Identity-module name to resolved-identifier object, as attached by
    /// the host's user-id submodules.
    #[serde(default)]
    pub user_id: HashMap<String, JsonValue>,
}

/// A batch of per-bidder requests dispatched for one auction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequested {
    pub auction_id: String,
    /// Dispatch timestamp, epoch milliseconds.
    pub start: i64,
    pub bids: Vec<BidderRequest>,
}

/// A bidder's answer for a given ad unit within an auction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResponse {
    pub auction_id: String,
    pub ad_unit_code: String,
    /// Ties the response back to the originating bid request.
    pub request_id: String,
    /// Unique identifier of the bid creative.
    pub ad_id: String,
    pub cpm: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub creative_id: Option<String>,
    #[serde(default)]
    pub deal_id: Option<String>,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub net_revenue: Option<bool>,
    #[serde(default)]
    pub media_type: Option<String>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub time_to_respond: Option<u64>,
    #[serde(default)]
    pub request_timestamp: Option<i64>,
    #[serde(default)]
    pub response_timestamp: Option<i64>,
}

/// A bidder declined to bid on a request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoBid {
    pub auction_id: String,
    pub ad_unit_code: String,
    pub request_id: String,
    #[serde(default)]
    pub time_to_respond: Option<u64>,
}

/// One entry of a bid-timeout notification batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutEntry {
    pub auction_id: String,
    pub ad_unit_code: String,
    pub bid_id: String,
}

/// The orchestrator has accounted for all bidder requests in an auction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionEnd {
    pub auction_id: String,
    /// Auction end, epoch milliseconds.
    pub auction_end: i64,
}

/// The ad server selected a bid to serve.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidWon {
    pub auction_id: String,
    pub ad_unit_code: String,
    pub request_id: String,
    pub ad_id: String,
}

/// A page slot finished rendering.
///
/// The slot is not guaranteed to belong to a tracked auction; resolution is
/// by targeting ad-id first, then by element id or ad-unit path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRendered {
    pub element_id: String,
    #[serde(default)]
    pub ad_unit_path: Option<String>,
    /// The winning creative's ad-id from the slot's targeting data, if set.
    #[serde(default)]
    pub targeting_ad_id: Option<String>,
    #[serde(default)]
    pub geometry: Option<SlotGeometry>,
}
