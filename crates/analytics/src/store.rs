//! In-memory auction record store.
//!
//! One [`AuctionRecord`] per auction id, owning a strict tree of ad units,
//! bid requests, and bids. The store is an explicit injected object (no
//! module-level globals) so instances can be created and reset per test.
//! Entries are removed after their payload ships; `evict_stale` bounds
//! memory for auctions that are abandoned before reaching the flush path.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;

use crate::events::MediaTypeConfig;
use crate::geometry::AdPosition;

/// Auction lifecycle state. Transitions are one-way: `Initialized` to
/// `Ended` when the orchestrator signals completion, and to `Completed`
/// once every expected ad unit has confirmed rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionState {
    Initialized,
    Ended,
    Completed,
}

/// One bidder's answer for one ad unit.
#[derive(Debug)]
pub struct BidRecord {
    pub ad_id: String,
    pub cpm: f64,
    pub currency: Option<String>,
    pub creative_id: Option<String>,
    pub deal_id: Option<String>,
    pub ttl: Option<u64>,
    pub net_revenue: Option<bool>,
    pub media_type: Option<String>,
    pub width: u32,
    pub height: u32,
    pub latency: Option<u64>,
    pub request_timestamp: Option<i64>,
    pub response_timestamp: Option<i64>,
    /// Set by the bid-won event matching the full
    /// (auction, adUnit, requestId, adId) tuple.
    pub winner: bool,
    pub rendered: bool,
    pub render_time: Option<i64>,
}

/// A bidder's solicitation for one ad unit within an auction.
#[derive(Debug)]
pub struct BidRequestRecord {
    pub bidder: String,
    pub params: JsonValue,
    pub media_types: HashMap<String, MediaTypeConfig>,
    pub source: Option<String>,
    pub start_time: i64,
    pub timed_out: bool,
    pub no_bid: bool,
    pub time_to_respond: Option<u64>,
    /// Bid responses keyed by ad-id.
    pub bids: HashMap<String, BidRecord>,
}

/// A placement participating in an auction.
#[derive(Debug)]
pub struct AdUnitRecord {
    pub code: String,
    /// Computed from slot geometry at render time.
    pub ad_position: Option<AdPosition>,
    /// Bid requests keyed by bidder-request id.
    pub bid_requests: HashMap<String, BidRequestRecord>,
}

impl AdUnitRecord {
    fn new(code: String) -> Self {
        Self {
            code,
            ad_position: None,
            bid_requests: HashMap::new(),
        }
    }
}

/// The evolving per-auction record.
#[derive(Debug)]
pub struct AuctionRecord {
    pub id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    /// Bidder timeout configured for the auction, in milliseconds.
    pub time_limit: u64,
    /// Monotonically increasing per page load.
    pub auction_order: u64,
    pub state: AuctionState,
    /// Ad units keyed by code; codes are unique within an auction.
    pub ad_units: HashMap<String, AdUnitRecord>,
    pub expected_ad_unit_count: usize,
    pub rendered_ad_unit_count: usize,
    /// Raw identity maps observed on bid requests; summarized at payload
    /// build time into the deduplicated provider list.
    pub user_ids: Vec<HashMap<String, JsonValue>>,
    /// The single outstanding flush timer, if armed. Always aborted before
    /// a new one is stored.
    pub pending_flush: Option<JoinHandle<()>>,
    /// Set exactly once, when the flush fires. Later events take the
    /// late-win path instead of re-flushing.
    pub sent: bool,
}

impl AuctionRecord {
    /// True once every expected ad unit has confirmed rendering.
    #[must_use]
    pub fn all_rendered(&self) -> bool {
        self.rendered_ad_unit_count == self.expected_ad_unit_count
    }

    /// Aborts and clears the outstanding flush timer, if any.
    pub fn clear_flush_timer(&mut self) {
        if let Some(handle) = self.pending_flush.take() {
            handle.abort();
        }
    }
}

/// Map of in-flight auction records plus the page-level auction counter.
#[derive(Debug, Default)]
pub struct EventStore {
    auctions: HashMap<String, AuctionRecord>,
    auction_order: u64,
}

impl EventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all records and resets the auction counter.
    pub fn reset(&mut self) {
        for record in self.auctions.values_mut() {
            record.clear_flush_timer();
        }
        self.auctions.clear();
        self.auction_order = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.auctions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.auctions.is_empty()
    }

    #[must_use]
    pub fn contains(&self, auction_id: &str) -> bool {
        self.auctions.contains_key(auction_id)
    }

    pub fn get(&self, auction_id: &str) -> Option<&AuctionRecord> {
        self.auctions.get(auction_id)
    }

    pub fn get_mut(&mut self, auction_id: &str) -> Option<&mut AuctionRecord> {
        self.auctions.get_mut(auction_id)
    }

    /// Creates a fresh record in `Initialized` state with one pre-populated
    /// ad unit per code. Callers must check [`contains`](Self::contains)
    /// first; duplicate init is handled there as a no-op.
    pub fn insert_auction(
        &mut self,
        auction_id: &str,
        start_time: i64,
        time_limit: u64,
        ad_unit_codes: &[String],
    ) -> &mut AuctionRecord {
        self.auction_order += 1;
        let ad_units = ad_unit_codes
            .iter()
            .map(|code| (code.clone(), AdUnitRecord::new(code.clone())))
            .collect::<HashMap<_, _>>();

        self.auctions
            .entry(auction_id.to_string())
            .or_insert(AuctionRecord {
                id: auction_id.to_string(),
                start_time,
                end_time: None,
                time_limit,
                auction_order: self.auction_order,
                state: AuctionState::Initialized,
                expected_ad_unit_count: ad_units.len(),
                rendered_ad_unit_count: 0,
                ad_units,
                user_ids: Vec::new(),
                pending_flush: None,
                sent: false,
            })
    }

    pub fn remove(&mut self, auction_id: &str) -> Option<AuctionRecord> {
        self.auctions.remove(auction_id)
    }

    /// Looks up a bid request via the (auction, adUnit, requestId) triple.
    pub fn bid_request_mut(
        &mut self,
        auction_id: &str,
        ad_unit_code: &str,
        request_id: &str,
    ) -> Option<&mut BidRequestRecord> {
        self.auctions
            .get_mut(auction_id)?
            .ad_units
            .get_mut(ad_unit_code)?
            .bid_requests
            .get_mut(request_id)
    }

    /// Looks up a bid via the full (auction, adUnit, requestId, adId) tuple.
    pub fn bid_mut(
        &mut self,
        auction_id: &str,
        ad_unit_code: &str,
        request_id: &str,
        ad_id: &str,
    ) -> Option<&mut BidRecord> {
        self.bid_request_mut(auction_id, ad_unit_code, request_id)?
            .bids
            .get_mut(ad_id)
    }

    /// Scans all non-completed auctions for a bid with the given ad-id and
    /// returns its path. Completed auctions are skipped so a recycled ad-id
    /// cannot resolve into an auction that already finished rendering.
    #[must_use]
    pub fn locate_bid_by_ad_id(&self, ad_id: &str) -> Option<BidPath> {
        for (auction_id, auction) in &self.auctions {
            if auction.state == AuctionState::Completed {
                continue;
            }
            for (code, ad_unit) in &auction.ad_units {
                for (request_id, request) in &ad_unit.bid_requests {
                    if request.bids.contains_key(ad_id) {
                        return Some(BidPath {
                            auction_id: auction_id.clone(),
                            ad_unit_code: code.clone(),
                            request_id: request_id.clone(),
                            ad_id: ad_id.to_string(),
                        });
                    }
                }
            }
        }
        None
    }

    /// Finds the non-completed auction owning any of the given ad-unit
    /// codes (slot element id or ad-unit path).
    #[must_use]
    pub fn locate_auction_by_codes(&self, codes: &[&str]) -> Option<String> {
        self.auctions.iter().find_map(|(auction_id, auction)| {
            if auction.state != AuctionState::Completed
                && codes.iter().any(|code| auction.ad_units.contains_key(*code))
            {
                Some(auction_id.clone())
            } else {
                None
            }
        })
    }

    /// Removes records older than `max_age_ms`, aborting their timers.
    /// Returns the number of evicted auctions.
    pub fn evict_stale(&mut self, now_ms: i64, max_age_ms: i64) -> usize {
        let stale: Vec<String> = self
            .auctions
            .iter()
            .filter(|(_, record)| now_ms.saturating_sub(record.start_time) > max_age_ms)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            if let Some(mut record) = self.auctions.remove(id) {
                record.clear_flush_timer();
                log::debug!("evicted stale auction record {id}");
            }
        }
        stale.len()
    }
}

/// Full path to a bid inside the record tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidPath {
    pub auction_id: String,
    pub ad_unit_code: String,
    pub request_id: String,
    pub ad_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| (*c).to_string()).collect()
    }

    fn sample_bid(ad_id: &str) -> BidRecord {
        BidRecord {
            ad_id: ad_id.to_string(),
            cpm: 0.5,
            currency: Some("USD".to_string()),
            creative_id: None,
            deal_id: None,
            ttl: Some(300),
            net_revenue: Some(true),
            media_type: Some("banner".to_string()),
            width: 300,
            height: 250,
            latency: Some(120),
            request_timestamp: None,
            response_timestamp: None,
            winner: false,
            rendered: false,
            render_time: None,
        }
    }

    fn store_with_bid() -> EventStore {
        let mut store = EventStore::new();
        let auction = store.insert_auction("a1", 1_000, 3_000, &codes(&["div1", "div2"]));
        let unit = auction.ad_units.get_mut("div1").unwrap();
        unit.bid_requests.insert(
            "r1".to_string(),
            BidRequestRecord {
                bidder: "openx".to_string(),
                params: serde_json::Value::Null,
                media_types: HashMap::new(),
                source: Some("client".to_string()),
                start_time: 1_001,
                timed_out: false,
                no_bid: false,
                time_to_respond: None,
                bids: HashMap::new(),
            },
        );
        unit.bid_requests
            .get_mut("r1")
            .unwrap()
            .bids
            .insert("ad-1".to_string(), sample_bid("ad-1"));
        store
    }

    #[test]
    fn insert_pre_populates_ad_units_and_counts() {
        let mut store = EventStore::new();
        let auction = store.insert_auction("a1", 1_000, 3_000, &codes(&["div1", "div2"]));
        assert_eq!(auction.state, AuctionState::Initialized);
        assert_eq!(auction.expected_ad_unit_count, 2);
        assert_eq!(auction.rendered_ad_unit_count, 0);
        assert_eq!(auction.auction_order, 1);
        assert!(auction.ad_units.contains_key("div1"));
        assert!(auction.ad_units.contains_key("div2"));
    }

    #[test]
    fn auction_order_increases_per_insert() {
        let mut store = EventStore::new();
        store.insert_auction("a1", 0, 0, &codes(&["div1"]));
        let second = store.insert_auction("a2", 0, 0, &codes(&["div1"]));
        assert_eq!(second.auction_order, 2);
    }

    #[test]
    fn reset_clears_records_and_counter() {
        let mut store = store_with_bid();
        store.reset();
        assert!(store.is_empty());
        let auction = store.insert_auction("a9", 0, 0, &codes(&["div1"]));
        assert_eq!(auction.auction_order, 1);
    }

    #[test]
    fn tuple_lookup_finds_the_bid() {
        let mut store = store_with_bid();
        assert!(store.bid_mut("a1", "div1", "r1", "ad-1").is_some());
        assert!(store.bid_mut("a1", "div1", "r1", "ad-2").is_none());
        assert!(store.bid_mut("a1", "div2", "r1", "ad-1").is_none());
        assert!(store.bid_mut("zz", "div1", "r1", "ad-1").is_none());
    }

    #[test]
    fn ad_id_scan_skips_completed_auctions() {
        let mut store = store_with_bid();
        let path = store.locate_bid_by_ad_id("ad-1").unwrap();
        assert_eq!(path.auction_id, "a1");
        assert_eq!(path.ad_unit_code, "div1");
        assert_eq!(path.request_id, "r1");

        store.get_mut("a1").unwrap().state = AuctionState::Completed;
        assert!(store.locate_bid_by_ad_id("ad-1").is_none());
    }

    #[test]
    fn code_lookup_matches_element_id_or_path() {
        let store = store_with_bid();
        assert_eq!(
            store.locate_auction_by_codes(&["div2", "/network/slot"]),
            Some("a1".to_string())
        );
        assert_eq!(store.locate_auction_by_codes(&["unknown"]), None);
    }

    #[test]
    fn evict_stale_removes_only_old_records() {
        let mut store = EventStore::new();
        store.insert_auction("old", 1_000, 0, &codes(&["div1"]));
        store.insert_auction("new", 290_000, 0, &codes(&["div1"]));
        let evicted = store.evict_stale(301_000, 300_000 - 1);
        assert_eq!(evicted, 1);
        assert!(!store.contains("old"));
        assert!(store.contains("new"));
    }
}
