use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Cookie bundle required by the primary provider.
#[derive(Clone, Debug, Default)]
pub struct Session {
    cookies: BTreeMap<String, String>,
    refreshed_at: Option<Instant>,
}

impl Session {
    /// Session built from freshly obtained cookies.
    pub fn new(cookies: BTreeMap<String, String>) -> Self {
        Self {
            cookies,
            refreshed_at: Some(Instant::now()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Empty sessions are always stale.
    pub fn is_stale(&self, refresh_interval: Duration) -> bool {
        match self.refreshed_at {
            _ if self.cookies.is_empty() => true,
            None => true,
            Some(at) => at.elapsed() >= refresh_interval,
        }
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    /// Renders the `Cookie` request header value.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookies(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_session_is_stale() {
        let session = Session::default();
        assert!(session.is_stale(Duration::from_secs(1800)));

        // Even a "fresh" session with no cookies is stale
        let session = Session::new(BTreeMap::new());
        assert!(session.is_stale(Duration::from_secs(1800)));
    }

    #[test]
    fn test_fresh_session_not_stale() {
        let session = Session::new(cookies(&[("nsit", "abc")]));
        assert!(!session.is_stale(Duration::from_secs(1800)));
        assert!(session.is_stale(Duration::ZERO));
    }

    #[test]
    fn test_cookie_header() {
        let session = Session::new(cookies(&[("nsit", "abc"), ("bm_sv", "xyz")]));
        assert_eq!(session.cookie_header(), "bm_sv=xyz; nsit=abc");
    }
}
