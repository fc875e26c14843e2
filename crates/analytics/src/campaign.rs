//! Campaign attribution from UTM query tags, with config overrides.

use serde::{Deserialize, Serialize};
use url::Url;

const UTM_TO_CAMPAIGN: [(&str, CampaignField); 5] = [
    ("utm_campaign", CampaignField::Name),
    ("utm_source", CampaignField::Source),
    ("utm_medium", CampaignField::Medium),
    ("utm_term", CampaignField::Term),
    ("utm_content", CampaignField::Content),
];

#[derive(Clone, Copy)]
enum CampaignField {
    Name,
    Source,
    Medium,
    Term,
    Content,
}

/// Campaign attribution carried in the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Campaign {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Campaign {
    /// Derives campaign attribution from the page URL's UTM query tags.
    /// Unparseable URLs yield an empty campaign.
    #[must_use]
    pub fn from_page_url(page_url: &str) -> Self {
        let mut campaign = Self::default();
        let Ok(url) = Url::parse(page_url) else {
            return campaign;
        };

        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            for (utm_key, field) in UTM_TO_CAMPAIGN {
                if key == utm_key {
                    let value = value.to_string();
                    match field {
                        CampaignField::Name => campaign.name = Some(value),
                        CampaignField::Source => campaign.source = Some(value),
                        CampaignField::Medium => campaign.medium = Some(value),
                        CampaignField::Term => campaign.term = Some(value),
                        CampaignField::Content => campaign.content = Some(value),
                    }
                    break;
                }
            }
        }
        campaign
    }

    /// Merges `overrides` on top of `self`, field by field. Configured
    /// campaign values win over UTM-derived ones.
    #[must_use]
    pub fn overridden_by(self, overrides: &Self) -> Self {
        Self {
            name: overrides.name.clone().or(self.name),
            source: overrides.source.clone().or(self.source),
            medium: overrides.medium.clone().or(self.medium),
            term: overrides.term.clone().or(self.term),
            content: overrides.content.clone().or(self.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_utm_tags_from_page_url() {
        let campaign = Campaign::from_page_url(
            "https://example.com/article?utm_campaign=foo&utm_source=news&utm_medium=email",
        );
        assert_eq!(campaign.name.as_deref(), Some("foo"));
        assert_eq!(campaign.source.as_deref(), Some("news"));
        assert_eq!(campaign.medium.as_deref(), Some("email"));
        assert_eq!(campaign.term, None);
        assert_eq!(campaign.content, None);
    }

    #[test]
    fn ignores_empty_utm_values_and_unrelated_params() {
        let campaign =
            Campaign::from_page_url("https://example.com/?utm_campaign=&page=2&utm_term=shoes");
        assert_eq!(campaign.name, None);
        assert_eq!(campaign.term.as_deref(), Some("shoes"));
    }

    #[test]
    fn invalid_url_yields_empty_campaign() {
        assert_eq!(Campaign::from_page_url("not a url"), Campaign::default());
    }

    #[test]
    fn config_overrides_win_field_by_field() {
        let from_utm = Campaign::from_page_url("https://example.com/?utm_campaign=foo");
        let overrides = Campaign {
            name: Some("bar".to_string()),
            ..Campaign::default()
        };
        let merged = from_utm.overridden_by(&overrides);
        assert_eq!(merged.name.as_deref(), Some("bar"));
    }

    #[test]
    fn utm_value_survives_when_not_overridden() {
        let from_utm = Campaign::from_page_url("https://example.com/?utm_source=news");
        let merged = from_utm.overridden_by(&Campaign::default());
        assert_eq!(merged.source.as_deref(), Some("news"));
    }
}
