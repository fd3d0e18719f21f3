//! HTTP plumbing shared by both platforms: rate limit retries and pagination
use std::{marker::PhantomData, time::Duration};

use log::{debug, warn};
use reqwest::{
    header::{HeaderMap, RETRY_AFTER},
    RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;

use crate::{
    errors::{MigrateError, MigrateErrorKind},
    platform::PlatformType,
};

/// Items requested per page
pub(crate) const PER_PAGE: usize = 100;

/// Bounded exponential backoff applied to rate limited requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included
    pub max_attempts: u32,

    /// Delay before the first retry, doubled for each following one
    pub base_delay: Duration,

    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (starting at 1)
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let backoff = self.base_delay.saturating_mul(factor);
        let delay = match retry_after {
            Some(requested) => requested.max(backoff),
            None => backoff,
        };
        delay.min(self.max_delay)
    }
}

/// Rate limits are a 429, or a 403 with an exhausted quota or a `Retry-After` (secondary limit)
fn is_rate_limited(response: &Response) -> bool {
    let headers = response.headers();
    match response.status() {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => {
            headers.contains_key(RETRY_AFTER)
                || headers
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.trim() == "0")
        }
        _ => false,
    }
}

/// `Retry-After` in seconds, if the server sent one
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Send a request, retrying while the platform answers with a rate limit
/// # Errors
/// `RateLimitExceeded` once every attempt was rate limited, `UnknownApi` on network failure
pub(crate) async fn send_with_retry(
    request: RequestBuilder,
    policy: &RetryPolicy,
    platform: PlatformType,
) -> Result<Response, MigrateError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let current = request.try_clone().ok_or_else(|| {
            MigrateError::new(MigrateErrorKind::UnknownApi)
                .with_platform(platform)
                .with_text("request can't be replayed")
        })?;
        let response = current
            .send()
            .await
            .map_err(|e| MigrateError::from(e).with_platform(platform))?;
        if !is_rate_limited(&response) {
            return Ok(response);
        }
        if attempt >= policy.max_attempts {
            return Err(MigrateError::new(MigrateErrorKind::RateLimitExceeded)
                .with_platform(platform)
                .with_text(&format!(
                    "gave up on {} after {attempt} attempts",
                    response.url().path()
                )));
        }
        let delay = policy.delay_for(attempt, retry_after(response.headers()));
        warn!(
            "Rate limited by {platform} on {}, retrying in {delay:?} ({attempt}/{})",
            response.url().path(),
            policy.max_attempts
        );
        tokio::time::sleep(delay).await;
    }
}

/// Turn a non-success status into an error carrying the response body
/// # Errors
/// `Auth` on 401, `UnknownApi` on any other failure status
pub(crate) async fn ensure_success(
    response: Response,
    platform: PlatformType,
) -> Result<Response, MigrateError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let kind = if status == StatusCode::UNAUTHORIZED {
        MigrateErrorKind::Auth
    } else {
        MigrateErrorKind::UnknownApi
    };
    Err(MigrateError::new(kind)
        .with_platform(platform)
        .with_text(&format!("{status}: {text}")))
}

/// Next page announced by the response headers
///
/// `None` when the platform sent no pagination header at all, `Some(None)`
/// when it says this was the last page.
fn next_page_from_headers(headers: &HeaderMap, page: u32) -> Option<Option<u32>> {
    if let Some(next) = headers.get("x-next-page").and_then(|v| v.to_str().ok()) {
        return Some(next.trim().parse::<u32>().ok());
    }
    if let Some(link) = headers.get("link").and_then(|v| v.to_str().ok()) {
        let has_next = link
            .split(',')
            .any(|part| part.contains("rel=\"next\""));
        return Some(has_next.then_some(page + 1));
    }
    None
}

/// Lazy page-by-page listing
///
/// Each call to [`Paginator::next_page`] fetches one page. Nothing is kept
/// between listings: a fresh paginator starts again at page 1.
pub(crate) struct Paginator<F, T> {
    /// Builds the request for the listing, page parameters are added on top
    build: F,

    /// Page to fetch next, `None` once exhausted
    next_page: Option<u32>,

    /// Retry policy for each page
    policy: RetryPolicy,

    /// Platform answering the requests
    platform: PlatformType,

    /// Item type
    item: PhantomData<fn() -> T>,
}

impl<F, T> Paginator<F, T>
where
    F: Fn() -> RequestBuilder,
    T: DeserializeOwned,
{
    /// Create a paginator starting at page 1
    pub(crate) fn new(platform: PlatformType, policy: RetryPolicy, build: F) -> Self {
        Self {
            build,
            next_page: Some(1),
            policy,
            platform,
            item: PhantomData,
        }
    }

    /// Fetch the next page, `None` when the listing is exhausted
    /// # Errors
    /// Error if the request fails or the page can't be parsed
    pub(crate) async fn next_page(&mut self) -> Result<Option<Vec<T>>, MigrateError> {
        let Some(page) = self.next_page else {
            return Ok(None);
        };
        let request = (self.build)().query(&[
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ]);
        let response = send_with_retry(request, &self.policy, self.platform).await?;
        let response = ensure_success(response, self.platform).await?;
        let announced = next_page_from_headers(response.headers(), page);
        let text = response.text().await?;
        let items: Vec<T> = serde_json::from_str(&text)?;
        debug!("Requested {} (page {page}): {}", self.platform, items.len());
        self.next_page = match announced {
            _ if items.is_empty() => None,
            Some(next) => next,
            None => (items.len() >= PER_PAGE).then_some(page + 1),
        };
        Ok(Some(items))
    }

    /// Drain every remaining page
    /// # Errors
    /// Error if any page fails
    pub(crate) async fn collect_all(mut self) -> Result<Vec<T>, MigrateError> {
        let mut all = vec![];
        while let Some(items) = self.next_page().await? {
            all.extend(items);
        }
        Ok(all)
    }
}
