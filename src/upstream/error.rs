//! Upstream error taxonomy.

use thiserror::Error;

/// Failure of a call to the upstream video API.
///
/// Messages are safe to show to clients: they never contain the credential
/// or the request URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// No API credential configured
    #[error("YouTube API key is not configured")]
    NotConfigured,

    /// 403: quota exhausted or credential rejected
    #[error("YouTube API quota exceeded or API key invalid")]
    QuotaOrAuth,

    /// 429 from upstream
    #[error("YouTube API rate limit exceeded")]
    RateLimited,

    /// 5xx that persisted through every retry
    #[error("YouTube API server error (status {status}) after {attempts} attempts")]
    Server { status: u16, attempts: u32 },

    /// Any other non-success status
    #[error("YouTube API rejected the request (status {status})")]
    Rejected { status: u16 },

    #[error("YouTube API request timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("Network error contacting YouTube API: {0}")]
    Network(String),

    /// The body was not valid JSON
    #[error("Invalid response from YouTube API: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::Server { .. } | UpstreamError::Timeout { .. } | UpstreamError::Network(_)
        )
    }

    /// Stable machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::NotConfigured => "configuration",
            UpstreamError::QuotaOrAuth => "quota_or_auth",
            UpstreamError::RateLimited => "upstream_rate_limit",
            UpstreamError::Server { .. } => "transient_server",
            UpstreamError::Rejected { .. } => "rejected",
            UpstreamError::Timeout { .. } | UpstreamError::Network(_) => "network",
            UpstreamError::Decode(_) => "decode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(UpstreamError::Server { status: 503, attempts: 1 }.is_transient());
        assert!(UpstreamError::Timeout { attempts: 1 }.is_transient());
        assert!(UpstreamError::Network("reset".into()).is_transient());

        assert!(!UpstreamError::QuotaOrAuth.is_transient());
        assert!(!UpstreamError::RateLimited.is_transient());
        assert!(!UpstreamError::NotConfigured.is_transient());
        assert!(!UpstreamError::Rejected { status: 400 }.is_transient());
    }

    #[test]
    fn test_messages_are_distinct() {
        assert_eq!(
            UpstreamError::QuotaOrAuth.to_string(),
            "YouTube API quota exceeded or API key invalid"
        );
        assert_eq!(UpstreamError::RateLimited.to_string(), "YouTube API rate limit exceeded");
        assert!(UpstreamError::Server { status: 502, attempts: 4 }
            .to_string()
            .contains("after 4 attempts"));
    }
}
