//! Logical operations the broker serves.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::upstream::Params;

/// A kind of upstream lookup, each with its own TTL and stale policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    LiveStreams,
    Search,
    Channel,
    Video,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::LiveStreams,
        Operation::Search,
        Operation::Channel,
        Operation::Video,
    ];

    /// Namespace used in cache keys and stats.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::LiveStreams => "liveStreams",
            Operation::Search => "search",
            Operation::Channel => "channel",
            Operation::Video => "video",
        }
    }

    /// Upstream resource path.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Operation::LiveStreams | Operation::Search => "search",
            Operation::Channel => "channels",
            Operation::Video => "videos",
        }
    }

    /// Parameters sent unless the caller overrides them.
    pub fn default_params(&self) -> Params {
        let pairs: &[(&str, &str)] = match self {
            Operation::LiveStreams => &[
                ("part", "snippet"),
                ("eventType", "live"),
                ("type", "video"),
                ("maxResults", "10"),
                // Gaming
                ("videoCategoryId", "20"),
            ],
            Operation::Search => &[("part", "snippet"), ("type", "video"), ("maxResults", "10")],
            Operation::Channel => &[("part", "snippet,statistics")],
            Operation::Video => &[("part", "snippet,statistics,contentDetails")],
        };
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    /// Accepts camelCase, snake_case or kebab-case names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "livestreams" => Ok(Operation::LiveStreams),
            "search" => Ok(Operation::Search),
            "channel" => Ok(Operation::Channel),
            "video" => Ok(Operation::Video),
            _ => Err(format!("unknown operation: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spellings() {
        assert_eq!("liveStreams".parse::<Operation>(), Ok(Operation::LiveStreams));
        assert_eq!("live_streams".parse::<Operation>(), Ok(Operation::LiveStreams));
        assert_eq!("live-streams".parse::<Operation>(), Ok(Operation::LiveStreams));
        assert_eq!("VIDEO".parse::<Operation>(), Ok(Operation::Video));
        assert!("playlists".parse::<Operation>().is_err());
    }

    #[test]
    fn test_live_stream_defaults() {
        let params = Operation::LiveStreams.default_params();
        assert_eq!(params["eventType"], "live");
        assert_eq!(params["videoCategoryId"], "20");
        assert_eq!(params["maxResults"], "10");
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(Operation::LiveStreams.endpoint(), "search");
        assert_eq!(Operation::Channel.endpoint(), "channels");
        assert_eq!(Operation::Video.endpoint(), "videos");
    }
}
