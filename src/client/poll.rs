use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounds for polling a long-running remote job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_attempts: u32,
    /// Sleep before each attempt
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(1),
        }
    }
}

/// Paces the attempts of a poll loop.
///
/// Each call to [`Poller::next_attempt`] sleeps `interval` and returns the
/// attempt number, or [`Error::PollTimeout`] once every attempt is used.
#[derive(Debug)]
pub struct Poller {
    api: String,
    config: PollConfig,
    attempt: u32,
}

impl Poller {
    pub fn new(api: &str, config: PollConfig) -> Self {
        Self {
            api: api.to_string(),
            config,
            attempt: 0,
        }
    }

    pub async fn next_attempt(&mut self) -> Result<u32> {
        if self.attempt >= self.config.max_attempts {
            return Err(Error::PollTimeout {
                api: self.api.clone(),
                attempts: self.config.max_attempts,
                interval: self.config.interval,
            });
        }
        tokio::time::sleep(self.config.interval).await;
        self.attempt += 1;
        Ok(self.attempt)
    }

    /// Attempts made so far
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempt
    }
}

/// Run `step` until it yields `Some`, pacing attempts with a [`Poller`].
///
/// Errors from `step` end the loop immediately.
pub async fn poll_until<T, F, Fut>(api: &str, config: PollConfig, mut step: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut poller = Poller::new(api, config);
    loop {
        let attempt = poller.next_attempt().await?;
        if let Some(value) = step(attempt).await? {
            debug!("{} job finished after {} poll(s)", api, attempt);
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_value() {
        let calls = AtomicU32::new(0);
        let result = poll_until("Test", PollConfig::default(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok((attempt == 3).then_some("done")) }
        })
        .await
        .unwrap();

        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_is_poll_timeout() {
        let config = PollConfig {
            max_attempts: 4,
            interval: Duration::from_millis(250),
        };
        let start = tokio::time::Instant::now();
        let err = poll_until("UniProt", config, |_| async { Ok(None::<()>) })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PollTimeout { attempts: 4, .. }));
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_counts_attempts() {
        let mut poller = Poller::new(
            "Test",
            PollConfig {
                max_attempts: 2,
                interval: Duration::from_millis(10),
            },
        );
        assert_eq!(poller.next_attempt().await.unwrap(), 1);
        assert_eq!(poller.next_attempt().await.unwrap(), 2);
        assert!(matches!(
            poller.next_attempt().await,
            Err(Error::PollTimeout { attempts: 2, .. })
        ));
        assert_eq!(poller.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_error_propagates() {
        let err = poll_until("Test", PollConfig::default(), |_| async {
            Err::<Option<()>, _>(Error::Service("boom".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Service error: boom");
    }
}
