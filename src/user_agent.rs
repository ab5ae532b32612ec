//! Shared User-Agent strings for fetch requests.
//!
//! Fetch targets are arbitrary sites, so requests present themselves as an
//! ordinary browser. Callers pick the desktop or the mobile variant per call.

use serde::{Deserialize, Serialize};

/// Desktop browser User-Agent.
const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_10_0) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/38.0.2125.122 Safari/537.36";

/// Mobile (WAP) browser User-Agent.
const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPad; U; CPU OS 3_2 like Mac OS X; en-us) \
    AppleWebKit/531.21.10 (KHTML, like Gecko) Version/4.0.4 Mobile/7B334b Safari/531.21.10";

/// User-Agent variant sent with a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAgent {
    /// Desktop browser identity.
    #[default]
    Desktop,
    /// Mobile browser identity, for sites serving a WAP layout.
    Mobile,
}

impl UserAgent {
    /// Returns the header value for this variant.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => DESKTOP_USER_AGENT,
            Self::Mobile => MOBILE_USER_AGENT,
        }
    }
}

impl From<bool> for UserAgent {
    /// `true` selects the mobile variant.
    fn from(mobile: bool) -> Self {
        if mobile { Self::Mobile } else { Self::Desktop }
    }
}
