//! Request DTOs for the proxy API
//!
//! Query strings are deserialized into optional strings so that malformed
//! values produce the standard error envelope instead of an extractor
//! rejection.

use serde::Deserialize;

use crate::upstream::Params;

/// Largest page size the upstream accepts.
pub const MAX_RESULTS_LIMIT: u32 = 50;

/// Query for `GET /api/live-streams`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamsQuery {
    pub max_results: Option<String>,
    pub video_category_id: Option<String>,
    pub order: Option<String>,
    pub published_after: Option<String>,
    pub region_code: Option<String>,
}

impl LiveStreamsQuery {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_max_results(self.max_results.as_deref())
    }

    /// Supplied values only; operation defaults fill the rest.
    pub fn into_params(self) -> Params {
        collect_params([
            ("maxResults", self.max_results),
            ("videoCategoryId", self.video_category_id),
            ("order", self.order),
            ("publishedAfter", self.published_after),
            ("regionCode", self.region_code),
        ])
    }
}

/// Query for `GET /api/search`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: Option<String>,
    pub max_results: Option<String>,
    pub order: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl SearchQuery {
    pub fn validate(&self) -> Option<String> {
        match self.q.as_deref().map(str::trim) {
            None | Some("") => return Some("Search query is required".to_string()),
            Some(_) => {}
        }
        validate_max_results(self.max_results.as_deref())
    }

    pub fn into_params(self) -> Params {
        collect_params([
            ("q", self.q.map(|q| q.trim().to_string())),
            ("maxResults", self.max_results),
            ("order", self.order),
            ("type", self.kind),
        ])
    }
}

/// Request body for `POST /api/cache/clear`
///
/// Without `endpoint` the whole response cache is dropped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearCacheRequest {
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn validate_max_results(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    match raw.parse::<u32>() {
        Ok(n) if (1..=MAX_RESULTS_LIMIT).contains(&n) => None,
        _ => Some(format!(
            "maxResults must be an integer between 1 and {}",
            MAX_RESULTS_LIMIT
        )),
    }
}

fn collect_params<const N: usize>(pairs: [(&str, Option<String>); N]) -> Params {
    pairs
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (name.to_string(), v))
        })
        .collect()
}
