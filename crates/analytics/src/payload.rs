//! Wire-format payload construction.
//!
//! [`build_auction_payload`] is a pure function of the auction record and
//! the adapter config; it has no side effects and is safe to call more than
//! once, though the dispatcher ships its output at most once per auction.

use serde::Serialize;

use crate::campaign::Campaign;
use crate::config::AnalyticsConfig;
use crate::device;
use crate::geometry::AdPosition;
use crate::identity;
use crate::store::{AdUnitRecord, AuctionRecord, AuctionState, BidRecord, BidRequestRecord};

pub const ADAPTER_VERSION: &str = "0.1";
pub const SCHEMA_VERSION: &str = "0.1";

/// Top-level auction payload shipped to the analytics endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionPayload {
    pub adapter_version: &'static str,
    pub schema_version: &'static str,
    pub publisher_platform_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    pub publisher_account_id: i64,
    pub campaign: Campaign,
    pub state: AuctionState,
    pub start_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    pub time_limit: u64,
    pub auction_order: u64,
    pub device_type: &'static str,
    pub device_os_type: &'static str,
    pub browser: &'static str,
    pub test_code: String,
    /// Identity modules that resolved a non-empty identifier, deduplicated
    /// and sorted.
    pub user_id_providers: Vec<String>,
    pub ad_units: Vec<AdUnitPayload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdUnitPayload {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_position: Option<AdPosition>,
    pub bid_requests: Vec<BidRequestPayload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRequestPayload {
    pub bidder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub has_bidder_responded: bool,
    /// Declared sizes as `"{mediaType}_{width}x{height}"` strings.
    pub available_ad_sizes: Vec<String>,
    pub available_media_types: Vec<String>,
    pub timed_out: bool,
    pub bid_responses: Vec<BidResponsePayload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidResponsePayload {
    /// CPM scaled to a fixed-point micro-currency unit.
    pub micro_cpm: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_revenue: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub height: u32,
    pub width: u32,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    pub winner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<String>,
    pub rendered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_time: Option<i64>,
}

/// Builds the complete wire payload for one auction record.
#[must_use]
pub fn build_auction_payload(
    auction: &AuctionRecord,
    config: &AnalyticsConfig,
) -> AuctionPayload {
    let user_agent = config.page.user_agent.as_str();

    let mut ad_units: Vec<&AdUnitRecord> = auction.ad_units.values().collect();
    ad_units.sort_by(|a, b| a.code.cmp(&b.code));

    AuctionPayload {
        adapter_version: ADAPTER_VERSION,
        schema_version: SCHEMA_VERSION,
        publisher_platform_id: config.publisher_platform_id.clone(),
        org_id: config.org_id.clone(),
        publisher_account_id: config.publisher_account_id,
        campaign: config.campaign.clone(),
        state: auction.state,
        start_time: auction.start_time,
        end_time: auction.end_time,
        time_limit: auction.time_limit,
        auction_order: auction.auction_order,
        device_type: device::device_type(user_agent),
        device_os_type: device::os_type(user_agent),
        browser: device::browser(user_agent),
        test_code: config.test_code.clone(),
        user_id_providers: identity::provider_summary(&auction.user_ids),
        ad_units: ad_units.into_iter().map(build_ad_unit_payload).collect(),
    }
}

fn build_ad_unit_payload(ad_unit: &AdUnitRecord) -> AdUnitPayload {
    let mut requests: Vec<&BidRequestRecord> = ad_unit.bid_requests.values().collect();
    requests.sort_by(|a, b| a.bidder.cmp(&b.bidder));

    AdUnitPayload {
        code: ad_unit.code.clone(),
        ad_position: ad_unit.ad_position,
        bid_requests: requests.into_iter().map(build_bid_request_payload).collect(),
    }
}

fn build_bid_request_payload(request: &BidRequestRecord) -> BidRequestPayload {
    let mut media_types: Vec<(&String, &crate::events::MediaTypeConfig)> =
        request.media_types.iter().collect();
    media_types.sort_by(|a, b| a.0.cmp(b.0));

    let available_ad_sizes = media_types
        .iter()
        .flat_map(|(media_type, config)| {
            config
                .sizes
                .iter()
                .map(move |[w, h]| format!("{media_type}_{w}x{h}"))
        })
        .collect();
    let available_media_types = media_types
        .iter()
        .map(|(media_type, _)| (*media_type).clone())
        .collect();

    let mut bids: Vec<&BidRecord> = request.bids.values().collect();
    bids.sort_by(|a, b| a.ad_id.cmp(&b.ad_id));

    BidRequestPayload {
        bidder: request.bidder.clone(),
        source: request.source.clone(),
        has_bidder_responded: !request.bids.is_empty(),
        available_ad_sizes,
        available_media_types,
        timed_out: request.timed_out,
        bid_responses: bids.into_iter().map(build_bid_response_payload).collect(),
    }
}

fn build_bid_response_payload(bid: &BidRecord) -> BidResponsePayload {
    BidResponsePayload {
        micro_cpm: micro_cpm(bid.cpm),
        net_revenue: bid.net_revenue,
        currency: bid.currency.clone(),
        media_type: bid.media_type.clone(),
        height: bid.height,
        width: bid.width,
        size: format!("{}x{}", bid.width, bid.height),
        deal_id: bid.deal_id.clone(),
        latency: bid.latency,
        ttl: bid.ttl,
        winner: bid.winner,
        creative_id: bid.creative_id.clone(),
        rendered: bid.rendered,
        render_time: bid.render_time,
    }
}

/// Scales a CPM to the fixed-point micro-currency unit.
#[must_use]
pub fn micro_cpm(cpm: f64) -> i64 {
    (cpm * 1_000_000.0).round() as i64
}
