//! Retrying vendor calls.
//!
//! A [`RetryPolicy`] says how often and how long to wait; a
//! [`FailedAttemptHandler`] looks at each failure and decides whether another
//! attempt is worth it. When it gives up, the failure is reported to the host
//! as an `ai-llm-errored` event and the original error is returned unchanged.

use crate::error::{LlmError, Result};
use lmchat_core::node::AiEvent;
use lmchat_core::{AbortSignal, SupplyDataContext};
use rand::Rng;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retrying failed operations
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: usize,

    /// Initial interval between retries in seconds
    pub initial_interval: f64,

    /// Multiplier for the interval after each retry
    pub backoff_factor: f64,

    /// Maximum interval between retries in seconds
    pub max_interval: f64,

    /// Whether to add random jitter to intervals
    pub jitter: bool,
}

impl RetryPolicy {
    /// Create a new retry policy with the given max attempts
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 30.0,
            jitter: true,
        }
    }

    /// Policy for a client configured with `max_retries` retries.
    pub fn from_max_retries(max_retries: u32) -> Self {
        Self::new(max_retries as usize + 1)
    }

    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-indexed).
    ///
    /// `initial_interval * backoff_factor^attempt`, capped at `max_interval`,
    /// scaled by a random factor in `0.5..=1.5` when jitter is on.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let base = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval).max(0.0);

        let delay = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.5)
        } else {
            capped
        };
        Duration::from_secs_f64(delay)
    }

    /// Attempts left after attempt `attempt` (0-indexed) failed.
    pub fn retries_left(&self, attempt: usize) -> usize {
        self.max_attempts.saturating_sub(attempt + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    /// Try again after the delay.
    Retry(Duration),
    /// Stop and return the error.
    Abort,
}

/// Decides whether failed vendor calls are retried, and reports final
/// failures to the host.
#[derive(Clone, Default)]
pub struct FailedAttemptHandler {
    ctx: Option<Arc<dyn SupplyDataContext>>,
}

impl FailedAttemptHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report final failures through the host's AI event log.
    pub fn reporting_to(ctx: Arc<dyn SupplyDataContext>) -> Self {
        Self { ctx: Some(ctx) }
    }

    /// Decide what follows failed attempt `attempt` (0-indexed).
    ///
    /// Aborted calls and errors a retry cannot fix (bad credentials, invalid
    /// requests, unknown models) stop immediately. Anything else is retried
    /// while the policy allows.
    pub fn on_failed_attempt(
        &self,
        error: &LlmError,
        attempt: usize,
        policy: &RetryPolicy,
        signal: Option<&AbortSignal>,
    ) -> AttemptDecision {
        if signal.map_or(false, AbortSignal::is_aborted) || matches!(error, LlmError::Aborted) {
            debug!("Request aborted, not retrying");
            return AttemptDecision::Abort;
        }

        let retries_left = policy.retries_left(attempt);
        if !error.is_retryable() || retries_left == 0 {
            self.report(error, attempt + 1);
            return AttemptDecision::Abort;
        }

        let delay = policy.calculate_delay(attempt);
        warn!(
            attempt = attempt + 1,
            retries_left,
            delay_ms = delay.as_millis() as u64,
            "LLM request failed, retrying: {}",
            error
        );
        AttemptDecision::Retry(delay)
    }

    fn report(&self, error: &LlmError, attempts: usize) {
        warn!(attempts, "LLM request failed: {}", error);
        if let Some(ctx) = &self.ctx {
            ctx.log_ai_event(
                AiEvent::LlmErrored,
                json!({ "error": error.to_string(), "attempts": attempts }),
            );
        }
    }
}

impl std::fmt::Debug for FailedAttemptHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailedAttemptHandler")
            .field("reports_to_host", &self.ctx.is_some())
            .finish()
    }
}

/// Run `operation` until it succeeds or `handler` gives up.
pub async fn call_with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    handler: &FailedAttemptHandler,
    signal: Option<&AbortSignal>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => match handler.on_failed_attempt(&error, attempt, policy, signal) {
                AttemptDecision::Retry(delay) => {
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                AttemptDecision::Abort => return Err(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lmchat_core::AbortController;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<(AiEvent, Value)>>,
    }

    #[async_trait]
    impl SupplyDataContext for EventLog {
        async fn get_credentials(&self, _kind: &str) -> lmchat_core::Result<Value> {
            Ok(Value::Null)
        }
        fn get_node_parameter(&self, _name: &str, _item_index: usize) -> Option<Value> {
            None
        }
        fn node_type_version(&self) -> f32 {
            1.0
        }
        fn node_name(&self) -> String {
            "Chat Model".into()
        }
        fn log_ai_event(&self, event: AiEvent, payload: Value) {
            self.events.lock().push((event, payload));
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_initial_interval(0.01)
            .with_jitter(false)
    }

    #[test]
    fn test_delay_backoff_and_cap() {
        let policy = RetryPolicy::new(10)
            .with_initial_interval(1.0)
            .with_max_interval(5.0)
            .with_jitter(false);
        assert_eq!(policy.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(policy.calculate_delay(2), Duration::from_secs(4));
        assert_eq!(policy.calculate_delay(6), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy::new(3).with_initial_interval(1.0);
        for _ in 0..50 {
            let delay = policy.calculate_delay(0).as_secs_f64();
            assert!((0.5..=1.5).contains(&delay));
        }
    }

    #[test]
    fn test_from_max_retries() {
        assert_eq!(RetryPolicy::from_max_retries(0).max_attempts, 1);
        assert_eq!(RetryPolicy::from_max_retries(3).max_attempts, 4);
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
    }

    #[test]
    fn test_decisions() {
        let handler = FailedAttemptHandler::new();
        let policy = fast_policy(3);
        let transient = LlmError::ServiceUnavailable("503".into());

        assert!(matches!(
            handler.on_failed_attempt(&transient, 0, &policy, None),
            AttemptDecision::Retry(_)
        ));
        assert_eq!(
            handler.on_failed_attempt(&transient, 2, &policy, None),
            AttemptDecision::Abort
        );
        assert_eq!(
            handler.on_failed_attempt(&LlmError::AuthenticationError("401".into()), 0, &policy, None),
            AttemptDecision::Abort
        );

        let controller = AbortController::new();
        controller.abort();
        assert_eq!(
            handler.on_failed_attempt(&transient, 0, &policy, Some(&controller.signal())),
            AttemptDecision::Abort
        );
    }

    #[test]
    fn test_final_failure_reported_to_host() {
        let log = Arc::new(EventLog::default());
        let handler = FailedAttemptHandler::reporting_to(log.clone());

        handler.on_failed_attempt(
            &LlmError::InvalidRequest("bad".into()),
            0,
            &fast_policy(3),
            None,
        );

        let events = log.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, AiEvent::LlmErrored);
        assert_eq!(events[0].1["error"], "Invalid request: bad");
    }

    #[test]
    fn test_aborted_calls_not_reported() {
        let log = Arc::new(EventLog::default());
        let handler = FailedAttemptHandler::reporting_to(log.clone());
        handler.on_failed_attempt(&LlmError::Aborted, 0, &fast_policy(3), None);
        assert!(log.events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_recovers() {
        let calls = AtomicUsize::new(0);
        let result = call_with_retry(&fast_policy(3), &FailedAttemptHandler::new(), None, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::RateLimitExceeded("slow down".into()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_with_retry_returns_last_error() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> =
            call_with_retry(&fast_policy(2), &FailedAttemptHandler::new(), None, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::ServiceUnavailable("down".into())) }
            })
            .await;

        assert!(matches!(result, Err(LlmError::ServiceUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_call_with_retry_no_retry_on_auth() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> =
            call_with_retry(&fast_policy(5), &FailedAttemptHandler::new(), None, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LlmError::AuthenticationError("401".into())) }
            })
            .await;

        assert!(result.unwrap_err().is_auth_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
