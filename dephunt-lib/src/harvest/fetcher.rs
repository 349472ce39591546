//! Resilient HTTP fetching with bounded retries and exponential backoff.
//!
//! Requests run through a [`seatbelt`] retry and timeout stack. Every
//! attempt is classified into a [`FetchOutcome`]. Only transient
//! conditions (5xx responses, timeouts, dropped connections) are retried;
//! a "not found" response and every other client-side error are terminal on
//! the first attempt.

use super::FetchOutcome;
use crate::Result;
use bytes::Bytes;
use core::time::Duration;
use layered::{Execute, Service, Stack};
use ohno::{EnrichableExt, IntoAppError, app_err};
use reqwest::StatusCode;
use seatbelt::retry::{Backoff, Retry};
use seatbelt::timeout::Timeout;
use seatbelt::{RecoveryInfo, ResilienceContext};
use serde::de::DeserializeOwned;
use tick::Clock;
use url::Url;

const LOG_TARGET: &str = "   fetcher";

/// Default number of attempts per request (including the first one).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default timeout for a single network call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default unit of the `2^attempt` backoff schedule.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Retry and timeout settings applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed per request, including the first.
    pub max_attempts: u32,

    /// Time unit of the backoff schedule.
    pub base_delay: Duration,

    /// Timeout applied to each individual attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based): `2^attempt` units.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// HTTP GET client that retries transient failures.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Create a fetcher that identifies itself with `user_agent`.
    pub fn new(user_agent: &str, policy: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .into_app_err("unable to create HTTP client")?;

        Ok(Self { client, policy })
    }

    /// Returns the retry policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch the raw body at `url`, retrying transient failures.
    ///
    /// Never returns [`FetchOutcome::TransientError`]: once the attempt budget is
    /// spent the last transient error is reported as permanent.
    pub async fn fetch(&self, url: &Url) -> FetchOutcome<Bytes> {
        let max_attempts = self.policy.max_attempts.max(1);
        let timeout = self.policy.timeout;

        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name("registry_get");

        let client = self.client.clone();
        let target = url.to_string();
        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(|result: &Result<FetchOutcome<Bytes>>, _| recovery_for(result))
                .max_retry_attempts(max_attempts - 1)
                // seatbelt doubles from the base, so the first wait is 2^1 units
                .base_delay(self.policy.backoff_delay(1))
                .backoff(Backoff::Exponential)
                .on_retry(move |_output, args| {
                    log::debug!(
                        target: LOG_TARGET,
                        "Retrying GET {target} (attempt {} of {max_attempts}, delay {}ms)",
                        args.attempt().index() + 1,
                        args.retry_delay().as_millis(),
                    );
                }),
            Timeout::layer("timeout", &context)
                .timeout_error(move |_| app_err!("request timed out after {}ms", timeout.as_millis()))
                .timeout(timeout),
            Execute::new(move |url: Url| {
                let client = client.clone();
                async move { Ok::<_, ohno::AppError>(attempt(&client, &url).await) }
            }),
        )
            .into_service();

        match service.execute(url.clone()).await {
            Ok(FetchOutcome::TransientError(e)) | Err(e) => {
                FetchOutcome::PermanentError(e.enrich_with(|| format!("giving up on {url} after {max_attempts} attempt(s)")))
            }
            Ok(outcome) => outcome,
        }
    }

    /// Fetch and decode a JSON document. A body that does not decode is a permanent error.
    pub async fn fetch_json<T>(&self, url: &Url) -> FetchOutcome<T>
    where
        T: DeserializeOwned,
    {
        self.fetch(url).await.and_then(|body| {
            match serde_json::from_slice(&body).into_app_err_with(|| format!("malformed JSON response from {url}")) {
                Ok(data) => FetchOutcome::Success(data),
                Err(e) => FetchOutcome::PermanentError(e),
            }
        })
    }

    /// Fetch a UTF-8 text document. A body that is not valid UTF-8 is a permanent error.
    pub async fn fetch_text(&self, url: &Url) -> FetchOutcome<String> {
        self.fetch(url).await.and_then(|body| {
            match String::from_utf8(body.to_vec()).into_app_err_with(|| format!("response from {url} is not valid UTF-8")) {
                Ok(text) => FetchOutcome::Success(text),
                Err(e) => FetchOutcome::PermanentError(e),
            }
        })
    }
}

fn recovery_for(result: &Result<FetchOutcome<Bytes>>) -> RecoveryInfo {
    if is_retryable(result) {
        RecoveryInfo::retry()
    } else {
        RecoveryInfo::never()
    }
}

/// Timeouts and transient outcomes are retried; everything else is final.
fn is_retryable(result: &Result<FetchOutcome<Bytes>>) -> bool {
    match result {
        Err(_) => true,
        Ok(outcome) => outcome.is_retryable(),
    }
}

/// Perform a single GET and classify what came back.
async fn attempt(client: &reqwest::Client, url: &Url) -> FetchOutcome<Bytes> {
    let exchange = async {
        let response = client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok((status, None));
        }

        response.bytes().await.map(|body| (status, Some(body)))
    };

    match exchange.await {
        Err(e) => classify_transport_error(e, url),
        Ok((status, body)) => classify_status(status, url).map(|()| body.unwrap_or_default()),
    }
}

/// Classify an HTTP status code.
fn classify_status(status: StatusCode, url: &Url) -> FetchOutcome<()> {
    match status {
        s if s.is_success() => FetchOutcome::Success(()),

        // Not found is terminal and reported distinctly from other failures.
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchOutcome::NotFound,

        // Server errors (5xx) are transient.
        s if s.is_server_error() => FetchOutcome::TransientError(app_err!("HTTP {s} from {url}")),

        // Everything else (4xx client errors, unresolved redirects) is never retried.
        s => FetchOutcome::PermanentError(app_err!("HTTP {s} from {url}")),
    }
}

/// Classify a failure that happened before a complete response was received.
fn classify_transport_error(e: reqwest::Error, url: &Url) -> FetchOutcome<Bytes> {
    let permanent = e.is_builder() || e.is_redirect() || e.is_decode();
    let e = ohno::AppError::from(e).enrich_with(|| format!("requesting {url}"));

    if permanent {
        FetchOutcome::PermanentError(e)
    } else {
        FetchOutcome::TransientError(e)
    }
}
