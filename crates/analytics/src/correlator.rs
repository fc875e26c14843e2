//! Core event-correlation state machine.
//!
//! Consumes the host's lifecycle events, mutates the [`EventStore`], and
//! decides when an auction record is complete enough to flush. The event
//! stream is unreliable by design: the host may drop events, deliver them
//! for auctions this instance never saw (sampling), or render slots that
//! were won outside the header-bidding flow. Every missing-record lookup
//! is therefore a silent no-op, never an error, and a failure in one
//! auction's pipeline never affects other in-flight auctions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::AnalyticsConfig;
use crate::dispatcher::{DelayedDispatcher, STORE_LOCK};
use crate::events::{
    AnalyticsEvent, AuctionEnd, AuctionInit, BidRequested, BidResponse, BidWon, NoBid,
    SlotRendered, TimeoutEntry,
};
use crate::store::{AuctionState, BidRecord, BidRequestRecord, EventStore};
use crate::transport::{Transport, WinPing};

/// Abandoned records older than this are reaped on the next auction-init.
pub const MAX_RECORD_AGE_MS: i64 = 300_000;

pub struct Correlator {
    store: Arc<Mutex<EventStore>>,
    config: Arc<AnalyticsConfig>,
    transport: Arc<dyn Transport>,
    dispatcher: DelayedDispatcher,
}

impl Correlator {
    pub fn new(
        store: Arc<Mutex<EventStore>>,
        config: Arc<AnalyticsConfig>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let dispatcher = DelayedDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            Arc::clone(&config),
        );
        Self {
            store,
            config,
            transport,
            dispatcher,
        }
    }

    /// Processes one lifecycle event. Events for a given auction must be
    /// delivered in order; gaps are tolerated.
    pub fn handle(&self, event: AnalyticsEvent) {
        match event {
            AnalyticsEvent::AuctionInit(init) => self.on_auction_init(&init),
            AnalyticsEvent::BidRequested(requested) => self.on_bid_requested(requested),
            AnalyticsEvent::BidResponse(response) => self.on_bid_response(response),
            AnalyticsEvent::NoBid(no_bid) => self.on_no_bid(&no_bid),
            AnalyticsEvent::BidTimeout(entries) => self.on_bid_timeout(&entries),
            AnalyticsEvent::AuctionEnd(end) => self.on_auction_end(&end),
            AnalyticsEvent::BidWon(won) => self.on_bid_won(&won),
            AnalyticsEvent::SlotRendered(rendered) => self.on_slot_rendered(&rendered),
        }
    }

    fn on_auction_init(&self, init: &AuctionInit) {
        let mut store = self.store.lock().expect(STORE_LOCK);

        let evicted = store.evict_stale(now_ms(), MAX_RECORD_AGE_MS);
        if evicted > 0 {
            log::warn!("evicted {evicted} abandoned auction records");
        }

        // Retried or re-entrant orchestrator calls must not corrupt state.
        if store.contains(&init.auction_id) {
            log::debug!("duplicate auction-init for {} ignored", init.auction_id);
            return;
        }

        let tracked: Vec<String> = if self.config.ad_units.is_empty() {
            init.ad_unit_codes.clone()
        } else {
            init.ad_unit_codes
                .iter()
                .filter(|code| self.config.ad_units.contains(code))
                .cloned()
                .collect()
        };
        if tracked.is_empty() {
            log::debug!(
                "auction {} has no ad units on the allow-list; not tracking",
                init.auction_id
            );
            return;
        }

        store.insert_auction(&init.auction_id, init.timestamp, init.timeout, &tracked);
    }

    fn on_bid_requested(&self, requested: BidRequested) {
        let mut store = self.store.lock().expect(STORE_LOCK);
        // Auction unknown: sampled out or init never seen.
        let Some(auction) = store.get_mut(&requested.auction_id) else {
            return;
        };

        for request in requested.bids {
            if !self.config.bidders.is_empty() && !self.config.bidders.contains(&request.bidder)
            {
                continue;
            }
            let Some(ad_unit) = auction.ad_units.get_mut(&request.ad_unit_code) else {
                continue;
            };
            ad_unit.bid_requests.insert(
                request.bid_id,
                BidRequestRecord {
                    bidder: request.bidder,
                    params: request.params,
                    media_types: request.media_types,
                    source: request.src,
                    start_time: requested.start,
                    timed_out: false,
                    no_bid: false,
                    time_to_respond: None,
                    bids: HashMap::new(),
                },
            );
            auction.user_ids.push(request.user_id);
        }
    }

    fn on_bid_response(&self, response: BidResponse) {
        let mut store = self.store.lock().expect(STORE_LOCK);
        let Some(request) = store.bid_request_mut(
            &response.auction_id,
            &response.ad_unit_code,
            &response.request_id,
        ) else {
            return;
        };
        request.time_to_respond = response.time_to_respond;
        request.bids.insert(
            response.ad_id.clone(),
            BidRecord {
                ad_id: response.ad_id,
                cpm: response.cpm,
                currency: response.currency,
                creative_id: response.creative_id,
                deal_id: response.deal_id,
                ttl: response.ttl,
                net_revenue: response.net_revenue,
                media_type: response.media_type,
                width: response.width,
                height: response.height,
                latency: response.time_to_respond,
                request_timestamp: response.request_timestamp,
                response_timestamp: response.response_timestamp,
                winner: false,
                rendered: false,
                render_time: None,
            },
        );
    }

    fn on_no_bid(&self, no_bid: &NoBid) {
        let mut store = self.store.lock().expect(STORE_LOCK);
        let Some(request) =
            store.bid_request_mut(&no_bid.auction_id, &no_bid.ad_unit_code, &no_bid.request_id)
        else {
            return;
        };
        request.no_bid = true;
        request.time_to_respond = no_bid.time_to_respond;
    }

    fn on_bid_timeout(&self, entries: &[TimeoutEntry]) {
        let mut store = self.store.lock().expect(STORE_LOCK);
        for entry in entries {
            if let Some(request) =
                store.bid_request_mut(&entry.auction_id, &entry.ad_unit_code, &entry.bid_id)
            {
                request.timed_out = true;
            }
        }
    }

    fn on_auction_end(&self, end: &AuctionEnd) {
        {
            let mut store = self.store.lock().expect(STORE_LOCK);
            let Some(auction) = store.get_mut(&end.auction_id) else {
                return;
            };
            // State transitions are one-way; Completed stays Completed.
            if auction.state == AuctionState::Initialized {
                auction.state = AuctionState::Ended;
            }
            auction.end_time = Some(end.auction_end);
        }
        self.dispatcher.schedule(&end.auction_id);
    }

    fn on_bid_won(&self, won: &BidWon) {
        let late_win = {
            let mut store = self.store.lock().expect(STORE_LOCK);
            let Some(auction) = store.get_mut(&won.auction_id) else {
                return;
            };
            let sent = auction.sent;
            let Some(ad_unit) = auction.ad_units.get_mut(&won.ad_unit_code) else {
                return;
            };
            if !ad_unit
                .bid_requests
                .get(&won.request_id)
                .is_some_and(|request| request.bids.contains_key(&won.ad_id))
            {
                return;
            }

            // At most one winner per ad unit at flush time.
            let mut bidder = String::new();
            for (request_id, request) in &mut ad_unit.bid_requests {
                for (ad_id, bid) in &mut request.bids {
                    bid.winner = request_id == &won.request_id && ad_id == &won.ad_id;
                    if bid.winner {
                        bidder = request.bidder.clone();
                    }
                }
            }
            sent.then_some(bidder)
        };

        // The full payload already shipped; re-sending it would
        // double-count, so emit the minimal win signal instead.
        if let Some(bidder) = late_win {
            let transport = Arc::clone(&self.transport);
            let ping = WinPing {
                bidder,
                ad_id: won.ad_id.clone(),
                publisher_account_id: self.config.publisher_account_id,
                timestamp: now_ms(),
            };
            tokio::spawn(async move {
                if let Err(report) = transport.send_win_ping(&ping).await {
                    log::warn!("late win ping failed: {report:?}");
                }
            });
        }
    }

    fn on_slot_rendered(&self, rendered: &SlotRendered) {
        let render_time = now_ms();
        let auction_id = {
            let mut store = self.store.lock().expect(STORE_LOCK);

            let bid_path = rendered
                .targeting_ad_id
                .as_deref()
                .and_then(|ad_id| store.locate_bid_by_ad_id(ad_id));

            let auction_id = match &bid_path {
                Some(path) => path.auction_id.clone(),
                None => {
                    let mut codes = vec![rendered.element_id.as_str()];
                    if let Some(path) = rendered.ad_unit_path.as_deref() {
                        codes.push(path);
                    }
                    match store.locate_auction_by_codes(&codes) {
                        Some(id) => id,
                        // Slot is not part of any tracked auction.
                        None => return,
                    }
                }
            };

            let Some(auction) = store.get_mut(&auction_id) else {
                return;
            };
            if auction.rendered_ad_unit_count < auction.expected_ad_unit_count {
                auction.rendered_ad_unit_count += 1;
            }

            if let Some(path) = &bid_path {
                if let Some(ad_unit) = auction.ad_units.get_mut(&path.ad_unit_code) {
                    if let Some(geometry) = rendered.geometry {
                        ad_unit.ad_position = Some(geometry.ad_position());
                    }
                    if let Some(bid) = ad_unit
                        .bid_requests
                        .get_mut(&path.request_id)
                        .and_then(|request| request.bids.get_mut(&path.ad_id))
                    {
                        bid.rendered = true;
                        bid.render_time = Some(render_time);
                    }
                }
            }

            if auction.all_rendered() {
                auction.state = AuctionState::Completed;
            }
            auction_id
        };

        // Failsafe: prepare to send whether or not the auction is complete;
        // the dispatcher no-ops once the payload shipped.
        self.dispatcher.schedule(&auction_id);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
