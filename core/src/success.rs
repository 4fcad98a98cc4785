use crate::provider::ProviderName;
use std::time::{Duration, Instant};
use url::Url;

pub const DEFAULT_CLOSE_AFTER: Duration = Duration::from_secs(5);

/// Standalone "integration successful" view shown when the app is launched
/// from the backend's post-OAuth redirect.
#[derive(Debug, Clone)]
pub struct SuccessNotice {
    provider: ProviderName,
    shown_at: Instant,
    close_after: Duration,
    cleaned_url: Url,
}

impl SuccessNotice {
    /// Recognises `?hubspot_success=true` or a `/hubspot-success` path.
    pub fn from_launch_url(url: &Url, close_after: Duration, now: Instant) -> Option<Self> {
        ProviderName::ALL
            .into_iter()
            .find(|provider| is_success_url(url, *provider))
            .map(|provider| Self {
                provider,
                shown_at: now,
                close_after,
                cleaned_url: strip_success_param(url, provider),
            })
    }

    pub fn provider(&self) -> ProviderName {
        self.provider
    }

    pub fn message(&self) -> String {
        format!("{} integration successful!", self.provider)
    }

    /// Whole seconds left on the countdown, rounded up.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.shown_at);
        let remaining = self.close_after.saturating_sub(elapsed);
        let secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= self.close_after
    }

    /// The launch URL with the success marker removed.
    pub fn cleaned_url(&self) -> &Url {
        &self.cleaned_url
    }
}

fn is_success_url(url: &Url, provider: ProviderName) -> bool {
    let param = provider.success_query_param();
    let flagged = url
        .query_pairs()
        .any(|(key, value)| key == param.as_str() && value == "true");
    let success_path = format!("/{}-success", provider.endpoint());
    flagged || url.path().trim_end_matches('/') == success_path
}

pub fn strip_success_param(url: &Url, provider: ProviderName) -> Url {
    let param = provider.success_query_param();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != param.as_str())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut cleaned = url.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept);
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("url")
    }

    #[test]
    fn recognises_success_redirects() {
        let now = Instant::now();
        let notice = SuccessNotice::from_launch_url(
            &url("http://localhost:3000/?hubspot_success=true"),
            DEFAULT_CLOSE_AFTER,
            now,
        )
        .expect("notice");
        assert_eq!(notice.provider(), ProviderName::Hubspot);
        assert_eq!(notice.message(), "HubSpot integration successful!");
        assert_eq!(notice.cleaned_url().as_str(), "http://localhost:3000/");

        assert!(SuccessNotice::from_launch_url(
            &url("http://localhost:3000/hubspot-success"),
            DEFAULT_CLOSE_AFTER,
            now
        )
        .is_some());
        assert!(SuccessNotice::from_launch_url(
            &url("http://localhost:3000/?hubspot_success=false"),
            DEFAULT_CLOSE_AFTER,
            now
        )
        .is_none());
    }

    #[test]
    fn strips_only_the_success_marker() {
        let cleaned = strip_success_param(
            &url("http://localhost:3000/?tab=data&hubspot_success=true"),
            ProviderName::Hubspot,
        );
        assert_eq!(cleaned.as_str(), "http://localhost:3000/?tab=data");
    }

    #[test]
    fn counts_down_and_expires() {
        let start = Instant::now();
        let notice = SuccessNotice::from_launch_url(
            &url("http://localhost:3000/?hubspot_success=true"),
            DEFAULT_CLOSE_AFTER,
            start,
        )
        .expect("notice");
        assert_eq!(notice.remaining_secs(start), 5);
        assert_eq!(notice.remaining_secs(start + Duration::from_millis(1500)), 4);
        assert!(!notice.is_expired(start + Duration::from_millis(4999)));
        assert!(notice.is_expired(start + Duration::from_secs(5)));
        assert_eq!(notice.remaining_secs(start + Duration::from_secs(9)), 0);
    }
}
