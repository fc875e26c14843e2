//! Outbound transport: auction payload POSTs and late-win pings.
//!
//! Delivery is fire-and-forget from the engine's point of view: once a
//! flush is dispatched, the auction record is released whether or not the
//! POST ultimately succeeds. On a non-2xx response the payload is retried
//! against a randomly chosen alternate endpoint (excluding the one that
//! just failed) up to a fixed retry budget.

use std::io::Write;

use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::seq::SliceRandom;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::error::{AnalyticsError, Result};

/// Primary endpoint first; the rest serve as retry alternates.
pub const DEFAULT_ENDPOINTS: [&str; 3] = [
    "https://analytics.hbcollector.net/v1/auctions",
    "https://analytics-fb1.hbcollector.net/v1/auctions",
    "https://analytics-fb2.hbcollector.net/v1/auctions",
];

/// Retries performed after the initial attempt fails.
pub const MAX_SEND_RETRIES: usize = 2;

/// Minimal signal for a bid-won event arriving after the full auction
/// payload already shipped; re-sending the payload would double-count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinPing {
    pub bidder: String,
    pub ad_id: String,
    pub publisher_account_id: i64,
    /// Epoch milliseconds at which the win was observed.
    pub timestamp: i64,
}

/// Delivery seam between the correlation engine and the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ships one serialized auction payload.
    async fn send_payload(&self, body: String) -> Result<()>;

    /// Ships one late-win ping.
    async fn send_win_ping(&self, ping: &WinPing) -> Result<()>;
}

/// HTTP transport with optional gzip compression.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoints: Vec<String>,
    compress: bool,
}

impl HttpTransport {
    /// Builds a transport over the default endpoints; an override replaces
    /// the primary endpoint only, keeping the alternates for retries.
    #[must_use]
    pub fn new(endpoint_override: Option<String>) -> Self {
        let mut endpoints: Vec<String> =
            DEFAULT_ENDPOINTS.iter().map(|e| (*e).to_string()).collect();
        if let Some(primary) = endpoint_override {
            if let Some(first) = endpoints.first_mut() {
                *first = primary;
            }
        }
        Self {
            client: reqwest::Client::new(),
            endpoints,
            compress: false,
        }
    }

    /// Enables gzip payload compression (legacy pipeline variant).
    #[must_use]
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    fn primary(&self) -> Result<&str> {
        self.endpoints
            .first()
            .map(String::as_str)
            .ok_or_else(|| {
                Report::new(AnalyticsError::Transport {
                    message: "no endpoints configured".to_string(),
                })
            })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_payload(&self, body: String) -> Result<()> {
        let (body_bytes, content_type) = if self.compress {
            let compressed =
                gzip(body.as_bytes()).change_context(AnalyticsError::Serialization {
                    message: "gzip compression failed".to_string(),
                })?;
            (compressed, "application/gzip")
        } else {
            (body.into_bytes(), "application/json")
        };

        let mut endpoint = self.primary()?;
        let mut attempts = 0;
        loop {
            match self
                .client
                .post(endpoint)
                .header(CONTENT_TYPE, content_type)
                .body(body_bytes.clone())
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => log::warn!(
                    "analytics endpoint {endpoint} returned {}",
                    response.status()
                ),
                Err(err) => log::warn!("analytics endpoint {endpoint} unreachable: {err}"),
            }

            attempts += 1;
            if attempts > MAX_SEND_RETRIES {
                return Err(Report::new(AnalyticsError::Transport {
                    message: format!("payload delivery failed after {attempts} attempts"),
                }));
            }
            if let Some(alternate) = pick_alternate(&self.endpoints, endpoint) {
                endpoint = alternate;
            }
        }
    }

    async fn send_win_ping(&self, ping: &WinPing) -> Result<()> {
        let mut url =
            Url::parse(self.primary()?).change_context(AnalyticsError::Transport {
                message: "invalid analytics endpoint".to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("et", "win")
            .append_pair("adid", &ping.ad_id)
            .append_pair("pubacctid", &ping.publisher_account_id.to_string())
            .append_pair("bidder", &ping.bidder)
            .append_pair("ts", &ping.timestamp.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .change_context(AnalyticsError::Transport {
                message: "win ping request failed".to_string(),
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Report::new(AnalyticsError::Transport {
                message: format!("win ping returned {}", response.status()),
            }))
        }
    }
}

/// Picks a random alternate endpoint, excluding the one that just failed.
fn pick_alternate<'a>(endpoints: &'a [String], exclude: &str) -> Option<&'a str> {
    let candidates: Vec<&String> = endpoints.iter().filter(|e| *e != exclude).collect();
    candidates
        .choose(&mut rand::thread_rng())
        .map(|e| e.as_str())
}

fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn gzip_round_trips() {
        let original = br#"[{"microCpm":500000}]"#;
        let compressed = gzip(original).unwrap();
        assert_ne!(compressed.as_slice(), original.as_slice());

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed.as_slice(), original.as_slice());
    }

    #[test]
    fn pick_alternate_never_returns_the_failed_endpoint() {
        let endpoints: Vec<String> = DEFAULT_ENDPOINTS.iter().map(|e| (*e).to_string()).collect();
        for _ in 0..50 {
            let alternate = pick_alternate(&endpoints, DEFAULT_ENDPOINTS[0]).unwrap();
            assert_ne!(alternate, DEFAULT_ENDPOINTS[0]);
        }
    }

    #[test]
    fn pick_alternate_with_single_endpoint_yields_none() {
        let endpoints = vec!["https://only.example.com".to_string()];
        assert!(pick_alternate(&endpoints, "https://only.example.com").is_none());
    }

    #[test]
    fn endpoint_override_replaces_primary_only() {
        let transport =
            HttpTransport::new(Some("https://collector.example.com/v1".to_string()));
        assert_eq!(transport.endpoints[0], "https://collector.example.com/v1");
        assert_eq!(transport.endpoints.len(), DEFAULT_ENDPOINTS.len());
        assert_eq!(transport.endpoints[1], DEFAULT_ENDPOINTS[1]);
    }

    #[test]
    fn win_ping_url_is_query_encoded() {
        let mut url = Url::parse(DEFAULT_ENDPOINTS[0]).unwrap();
        let ping = WinPing {
            bidder: "openx".to_string(),
            ad_id: "ad 1".to_string(),
            publisher_account_id: 42,
            timestamp: 1_586_675_964_364,
        };
        url.query_pairs_mut()
            .append_pair("et", "win")
            .append_pair("adid", &ping.ad_id)
            .append_pair("pubacctid", &ping.publisher_account_id.to_string())
            .append_pair("bidder", &ping.bidder)
            .append_pair("ts", &ping.timestamp.to_string());
        let query = url.query().unwrap();
        assert!(query.contains("et=win"));
        assert!(query.contains("adid=ad+1"));
        assert!(query.contains("pubacctid=42"));
    }
}
