//! Status polling configuration and `Retry-After` handling.

use std::time::Duration;

use reqwest::header::HeaderMap;
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

/// Budget for a status poll.
///
/// The wait between attempts is `interval`, unless the server supplied a
/// `Retry-After` header, which takes precedence. Polling gives up after
/// `max_attempts` re-fetches, or as soon as `deadline` passes.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Wait between re-fetches when the server does not say otherwise.
    pub interval: Duration,

    /// Number of re-fetches before giving up with a poll-timeout error.
    pub max_attempts: usize,

    /// Hard cut-off; when it passes mid-poll the wait is aborted promptly
    /// with a cancellation error.
    pub deadline: Option<tokio::time::Instant>,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_secs(5),
            max_attempts: 10,
            deadline: None,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, max_attempts: usize) -> Self {
        PollConfig {
            interval,
            max_attempts,
            deadline: None,
        }
    }

    /// Abort polling once `deadline` passes, regardless of attempts left.
    pub fn with_deadline(mut self, deadline: tokio::time::Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// IMF-fixdate, the mandatory HTTP date format (RFC 7231 §7.1.1.1).
const IMF_FIXDATE: &[FormatItem<'_>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// The wait the server asked for via `Retry-After`, if any.
///
/// Handles both the delta-seconds and the HTTP-date form. An absent or
/// unparseable header yields `None`.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = time::PrimitiveDateTime::parse(value, IMF_FIXDATE)
        .ok()?
        .assume_utc();
    let wait = date - OffsetDateTime::now_utc();

    // a date in the past means "go now"
    Some(wait.try_into().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", "120".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(120)));
    }

    #[test]
    fn http_date_in_the_past_means_no_wait() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            "Fri, 31 Dec 1999 23:59:59 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after(&headers), Some(Duration::ZERO));
    }

    #[test]
    fn absent_or_garbage_header() {
        let headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("retry-after", "soon".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }
}
