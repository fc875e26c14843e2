//! Adapter configuration: defaults, host-option validation, campaign merge.
//!
//! The host hands the adapter an untyped options object when enabling it.
//! Validation walks a field table in order and reports exactly one
//! structured error for the first failing field, distinguishing missing
//! required fields from mistyped ones. Sampling itself is applied by the
//! host before events reach this engine; the rate is carried through for
//! reporting only.

use derive_more::{Display, Error};
use serde_json::Value as JsonValue;

use crate::campaign::Campaign;

/// Default sampling rate: 5% of auctions.
pub const DEFAULT_SAMPLING: f64 = 0.05;
pub const DEFAULT_TEST_CODE: &str = "default";
/// Base wait before flushing an auction record, in milliseconds.
pub const DEFAULT_PAYLOAD_WAIT_MS: u64 = 1000;
/// Extra wait granted when not all ad units have rendered yet.
pub const DEFAULT_PAYLOAD_WAIT_PADDING_MS: u64 = 2000;

/// Page context captured by the host at enable time.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    /// Full page URL including the query string, for UTM attribution.
    pub url: Option<String>,
    pub user_agent: String,
}

/// Validated, defaulted adapter configuration.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub publisher_platform_id: String,
    /// Organization id; when supplied, `publisherPlatformId` is optional.
    pub org_id: Option<String>,
    pub publisher_account_id: i64,
    pub sampling: f64,
    pub test_pipeline: bool,
    pub test_code: String,
    /// Ad-unit allow-list; empty means no filtering.
    pub ad_units: Vec<String>,
    /// Bidder allow-list; empty means no filtering.
    pub bidders: Vec<String>,
    pub payload_wait_ms: u64,
    pub payload_wait_padding_ms: u64,
    /// UTM-derived attribution with config overrides already applied.
    pub campaign: Campaign,
    /// Analytics endpoint override; `None` uses the built-in endpoints.
    pub endpoint: Option<String>,
    pub page: PageContext,
}

/// How a configuration field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Missing,
    Mistyped,
}

/// The single structured error reported when the options object is invalid.
#[derive(Debug, Clone, Display, Error)]
#[display("{}", self.message())]
pub struct ConfigFieldError {
    pub field: &'static str,
    pub expected: &'static str,
    pub kind: FieldErrorKind,
}

impl ConfigFieldError {
    fn message(&self) -> String {
        match self.kind {
            FieldErrorKind::Missing => format!(
                "expected '{}' to exist and be of type '{}'",
                self.field, self.expected
            ),
            FieldErrorKind::Mistyped => {
                format!("expected '{}' to be of type '{}'", self.field, self.expected)
            }
        }
    }
}

#[derive(Clone, Copy)]
enum FieldType {
    Str,
    Number,
    Boolean,
    Object,
    StrArray,
}

impl FieldType {
    fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::StrArray => "array of strings",
        }
    }

    fn matches(self, value: &JsonValue) -> bool {
        match self {
            Self::Str => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::StrArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(JsonValue::is_string)),
        }
    }
}

// (field, type, required) -- checked in order, first failure wins.
const FIELD_VALIDATIONS: [(&str, FieldType, bool); 12] = [
    ("orgId", FieldType::Str, false),
    ("publisherPlatformId", FieldType::Str, true),
    ("publisherAccountId", FieldType::Number, true),
    ("sampling", FieldType::Number, false),
    ("testPipeline", FieldType::Boolean, false),
    ("testCode", FieldType::Str, false),
    ("adUnits", FieldType::StrArray, false),
    ("bidders", FieldType::StrArray, false),
    ("payloadWaitTime", FieldType::Number, false),
    ("payloadWaitTimePadding", FieldType::Number, false),
    ("campaign", FieldType::Object, false),
    ("endpoint", FieldType::Str, false),
];

fn validate(options: &JsonValue) -> Result<(), ConfigFieldError> {
    let has_org_id = options.get("orgId").is_some();
    for (field, field_type, required) in FIELD_VALIDATIONS {
        // An organization id stands in for the platform id.
        let required = required && !(field == "publisherPlatformId" && has_org_id);
        match options.get(field) {
            None if required => {
                return Err(ConfigFieldError {
                    field,
                    expected: field_type.name(),
                    kind: FieldErrorKind::Missing,
                })
            }
            None => {}
            Some(value) => {
                if !field_type.matches(value) {
                    return Err(ConfigFieldError {
                        field,
                        expected: field_type.name(),
                        kind: FieldErrorKind::Mistyped,
                    });
                }
            }
        }
    }
    Ok(())
}

impl AnalyticsConfig {
    /// Validates the host's options object and builds the typed config.
    ///
    /// # Errors
    ///
    /// Returns the structured error for the first failing field; the caller
    /// reports it once and leaves the adapter inactive.
    pub fn from_options(
        options: &JsonValue,
        page: PageContext,
    ) -> Result<Self, ConfigFieldError> {
        validate(options)?;

        let str_list = |field: &str| -> Vec<String> {
            options
                .get(field)
                .and_then(JsonValue::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(JsonValue::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let utm_campaign = page
            .url
            .as_deref()
            .map(Campaign::from_page_url)
            .unwrap_or_default();
        let campaign_overrides = options
            .get("campaign")
            .and_then(|value| serde_json::from_value::<Campaign>(value.clone()).ok())
            .unwrap_or_default();

        Ok(Self {
            publisher_platform_id: options
                .get("publisherPlatformId")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string(),
            org_id: options
                .get("orgId")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            publisher_account_id: options
                .get("publisherAccountId")
                .and_then(JsonValue::as_i64)
                .or_else(|| {
                    options
                        .get("publisherAccountId")
                        .and_then(JsonValue::as_f64)
                        .map(|n| n as i64)
                })
                .unwrap_or_default(),
            sampling: options
                .get("sampling")
                .and_then(JsonValue::as_f64)
                .unwrap_or(DEFAULT_SAMPLING),
            test_pipeline: options
                .get("testPipeline")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            test_code: options
                .get("testCode")
                .and_then(JsonValue::as_str)
                .unwrap_or(DEFAULT_TEST_CODE)
                .to_string(),
            ad_units: str_list("adUnits"),
            bidders: str_list("bidders"),
            payload_wait_ms: options
                .get("payloadWaitTime")
                .and_then(JsonValue::as_u64)
                .unwrap_or(DEFAULT_PAYLOAD_WAIT_MS),
            payload_wait_padding_ms: options
                .get("payloadWaitTimePadding")
                .and_then(JsonValue::as_u64)
                .unwrap_or(DEFAULT_PAYLOAD_WAIT_PADDING_MS),
            campaign: utm_campaign.overridden_by(&campaign_overrides),
            endpoint: options
                .get("endpoint")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            page,
        })
    }
}
