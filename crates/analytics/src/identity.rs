//! Identity-provider summary for the payload.
//!
//! Each bidder request may carry a map of identity-module name to the
//! module's resolved-identifier object. The payload reports the
//! deduplicated, sorted list of provider names whose identifier actually
//! resolved to a non-empty value. Most providers expose the identifier
//! directly; a small table covers the ones that nest it.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value as JsonValue;

/// Builds the deduplicated, sorted provider-name summary across all
/// identity maps observed on an auction's bid requests.
#[must_use]
pub fn provider_summary(user_ids: &[HashMap<String, JsonValue>]) -> Vec<String> {
    let mut providers = BTreeSet::new();
    for user_id in user_ids {
        for (provider, value) in user_id {
            if resolved_id(provider, value).is_some_and(has_value) {
                providers.insert(provider.clone());
            }
        }
    }
    providers.into_iter().collect()
}

/// Locates the identifier value within a provider's object shape.
fn resolved_id<'a>(provider: &str, value: &'a JsonValue) -> Option<&'a JsonValue> {
    match provider {
        "digitrustid" => value.pointer("/data/id"),
        "lipb" => value.get("lipbid"),
        _ => Some(value),
    }
}

fn has_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
        JsonValue::Bool(_) | JsonValue::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id_map(entries: &[(&str, JsonValue)]) -> HashMap<String, JsonValue> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn summary_is_deduplicated_and_sorted() {
        let maps = vec![
            id_map(&[("tdid", json!("abc")), ("criteoId", json!("xyz"))]),
            id_map(&[("tdid", json!("abc"))]),
        ];
        assert_eq!(provider_summary(&maps), vec!["criteoId", "tdid"]);
    }

    #[test]
    fn empty_identifiers_are_excluded() {
        let maps = vec![id_map(&[
            ("tdid", json!("")),
            ("pubcid", JsonValue::Null),
            ("idl_env", json!("present")),
        ])];
        assert_eq!(provider_summary(&maps), vec!["idl_env"]);
    }

    #[test]
    fn nested_provider_shapes_resolve_through_the_table() {
        let maps = vec![id_map(&[
            ("digitrustid", json!({"data": {"id": "dt-1"}})),
            ("lipb", json!({"lipbid": "li-1"})),
        ])];
        assert_eq!(provider_summary(&maps), vec!["digitrustid", "lipb"]);
    }

    #[test]
    fn nested_provider_with_empty_id_is_excluded() {
        let maps = vec![id_map(&[
            ("digitrustid", json!({"data": {"id": ""}})),
            ("lipb", json!({"other": "field"})),
        ])];
        assert!(provider_summary(&maps).is_empty());
    }
}
