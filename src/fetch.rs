use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, error};

use crate::error::KiraError;

pub const DEFAULT_RETRY_LIMIT: u32 = 5;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(3);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A single download attempt. Implementations must only report success once
/// the complete body sits at `destination`.
pub trait ImageClient: Send + Sync {
    fn download_image(&self, url: &str, destination: &Path) -> Result<u64, KiraError>;
}

/// Blocking sleep seam used for backoff and inter-request delays.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub limit: u32,
    pub initial_backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RETRY_LIMIT,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Waits taken before attempts 2..=limit: the initial backoff, doubled
    /// after every failure.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut backoff = self.initial_backoff;
        for _ in 1..self.limit {
            delays.push(backoff);
            backoff = backoff.saturating_mul(2);
        }
        delays
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { bytes: u64, attempts: u32 },
    Failed { attempts: u32, last_error: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Downloaded { .. })
    }
}

#[derive(Clone)]
pub struct ImageHttpClient {
    client: Client,
}

impl ImageHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-ih/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::ImageHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::ImageHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl ImageClient for ImageHttpClient {
    fn download_image(&self, url: &str, destination: &Path) -> Result<u64, KiraError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| KiraError::ImageHttp(err.to_string()))?;
        if !response.status().is_success() {
            return Err(KiraError::ImageStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        let expected = response.content_length();

        // Stream into a sibling temp file; it is removed on drop unless persisted.
        let parent = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut part = tempfile::Builder::new()
            .prefix(".kira-ih")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let received = io::copy(&mut response, part.as_file_mut())
            .map_err(|err| KiraError::ImageHttp(err.to_string()))?;

        if received == 0 {
            return Err(KiraError::EmptyBody(url.to_string()));
        }
        if let Some(expected) = expected.filter(|&expected| expected != received) {
            return Err(KiraError::Truncated {
                url: url.to_string(),
                expected,
                received,
            });
        }
        part.persist(destination)
            .map_err(|err| KiraError::Filesystem(err.error.to_string()))?;
        Ok(received)
    }
}

/// Wraps an [`ImageClient`] with bounded retries and exponential backoff.
pub struct RetryingFetcher<C: ImageClient, P: Pause> {
    client: C,
    pause: P,
    policy: RetryPolicy,
}

impl<C: ImageClient, P: Pause> RetryingFetcher<C, P> {
    pub fn new(client: C, pause: P, policy: RetryPolicy) -> Self {
        Self {
            client,
            pause,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Blocks for `duration` on the same seam the backoff uses.
    pub fn idle(&self, duration: Duration) {
        if !duration.is_zero() {
            self.pause.pause(duration);
        }
    }

    /// Never returns an error: exhausting every attempt yields
    /// [`FetchOutcome::Failed`] after logging once at error level.
    pub fn fetch(&self, url: &str, destination: &Path) -> FetchOutcome {
        let limit = self.policy.limit.max(1);
        let mut backoff = self.policy.initial_backoff;
        let mut last_error = String::new();

        for attempt in 1..=limit {
            match self.client.download_image(url, destination) {
                Ok(bytes) => {
                    debug!(url, attempt, bytes, "image downloaded");
                    return FetchOutcome::Downloaded {
                        bytes,
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    debug!(url, attempt, limit, error = %err, "download attempt failed");
                    last_error = err.to_string();
                    if attempt < limit {
                        self.pause.pause(backoff);
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }

        error!(url, attempts = limit, error = %last_error, "giving up on image download");
        FetchOutcome::Failed {
            attempts: limit,
            last_error,
        }
    }
}
