//! Retry executor for running attempts with retries.
//!
//! The blocking and async entry points share one state machine, which owns
//! the attempt counter and every decision. They differ only in how an
//! attempt is awaited and how the wait is performed ([`Sleep`] vs
//! [`AsyncSleep`]).

use crate::classify::{AsyncBody, AttemptOutcome, BlockingBody, Failure, ResponseHead, TransportError};
use crate::error::ClientError;
use crate::observer::{RetryEvent, RetryObserver, TracingObserver};
use crate::policy::RetryPolicy;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Blocking wait between attempts.
pub trait Sleep: Send + Sync {
    /// Suspend the current thread.
    fn sleep(&self, duration: Duration);
}

/// Waits with [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Cooperative wait between attempts.
#[async_trait]
pub trait AsyncSleep: Send + Sync {
    /// Yield to the scheduler for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Waits with [`tokio::time::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleep;

#[async_trait]
impl AsyncSleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What the loop does next.
enum Step<R, E> {
    Finish(Result<R, Failure<R, E>>),
    Wait(Duration),
}

/// Per-call retry state. Holds no I/O.
struct RetryLoop<'a> {
    policy: &'a RetryPolicy,
    observer: &'a dyn RetryObserver,
    attempt: u32,
}

impl<'a> RetryLoop<'a> {
    fn new(policy: &'a RetryPolicy, observer: &'a dyn RetryObserver) -> Self {
        Self {
            policy,
            observer,
            attempt: 0,
        }
    }

    fn begin(&self) {
        debug!(
            attempt = self.attempt + 1,
            max_attempts = self.policy.max_attempts(),
            "Executing attempt"
        );
    }

    fn advance<R: ResponseHead, E>(&mut self, outcome: AttemptOutcome<R, E>) -> Step<R, E> {
        let decision = self.policy.decide(self.attempt, &outcome);
        let failure = match outcome.into_result() {
            Ok(response) => return Step::Finish(Ok(response)),
            Err(failure) => failure,
        };

        if !decision.should_retry {
            debug!(
                attempt = self.attempt + 1,
                cause = %failure.cause(),
                "Retries exhausted or failure not retryable"
            );
            return Step::Finish(Err(failure));
        }

        self.observer.on_retry(&RetryEvent {
            attempt: self.attempt,
            max_attempts: self.policy.max_attempts(),
            delay: decision.delay,
            cause: failure.cause(),
        });
        self.attempt += 1;
        Step::Wait(decision.delay)
    }
}

/// Runs attempt functions under a [`RetryPolicy`].
///
/// Returns the first successful response, or the last failure once the
/// budget is spent or a failure is not retryable. Intermediate failures are
/// only visible through the [`RetryObserver`].
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    observer: Arc<dyn RetryObserver>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryExecutor {
    /// Create an executor that logs retries through `tracing`.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the retry observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Replace the retry observer with a shared one.
    #[must_use]
    pub fn with_shared_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The policy in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `attempt_fn` on the current thread, sleeping between attempts.
    pub fn run<F, R, E>(&self, attempt_fn: F) -> Result<R, Failure<R, E>>
    where
        F: FnMut() -> Result<R, E>,
        R: ResponseHead,
        E: TransportError,
    {
        self.run_with(&ThreadSleep, attempt_fn)
    }

    /// Like [`run`](Self::run), waiting with `sleeper`.
    pub fn run_with<S, F, R, E>(&self, sleeper: &S, mut attempt_fn: F) -> Result<R, Failure<R, E>>
    where
        S: Sleep + ?Sized,
        F: FnMut() -> Result<R, E>,
        R: ResponseHead,
        E: TransportError,
    {
        let mut state = RetryLoop::new(&self.policy, self.observer.as_ref());
        loop {
            state.begin();
            match state.advance(AttemptOutcome::classify(attempt_fn())) {
                Step::Finish(result) => return result,
                Step::Wait(delay) => sleeper.sleep(delay),
            }
        }
    }

    /// Run `attempt_fn` and map a terminal failure to a [`ClientError`].
    pub fn execute<F, R, E>(&self, attempt_fn: F) -> Result<R, ClientError>
    where
        F: FnMut() -> Result<R, E>,
        R: BlockingBody,
        E: TransportError,
    {
        self.run(attempt_fn).map_err(Failure::into_error)
    }

    /// Run `attempt_fn` cooperatively, yielding between attempts.
    ///
    /// Dropping the returned future while it waits stops the loop; no
    /// further attempts are made.
    pub async fn run_async<F, Fut, R, E>(&self, attempt_fn: F) -> Result<R, Failure<R, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: ResponseHead,
        E: TransportError,
    {
        self.run_async_with(&TokioSleep, attempt_fn).await
    }

    /// Like [`run_async`](Self::run_async), waiting with `sleeper`.
    pub async fn run_async_with<S, F, Fut, R, E>(
        &self,
        sleeper: &S,
        mut attempt_fn: F,
    ) -> Result<R, Failure<R, E>>
    where
        S: AsyncSleep + ?Sized,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: ResponseHead,
        E: TransportError,
    {
        let mut state = RetryLoop::new(&self.policy, self.observer.as_ref());
        loop {
            state.begin();
            match state.advance(AttemptOutcome::classify(attempt_fn().await)) {
                Step::Finish(result) => return result,
                Step::Wait(delay) => sleeper.sleep(delay).await,
            }
        }
    }

    /// Run `attempt_fn` cooperatively and map a terminal failure to a [`ClientError`].
    pub async fn execute_async<F, Fut, R, E>(&self, attempt_fn: F) -> Result<R, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        R: AsyncBody,
        E: TransportError,
    {
        match self.run_async(attempt_fn).await {
            Ok(response) => Ok(response),
            Err(failure) => Err(failure.into_error_async().await),
        }
    }
}

/// Execute an async attempt function under `policy`.
///
/// # Example
///
/// ```ignore
/// use restwell_retries::{with_retry, RetryPolicy};
///
/// let policy = RetryPolicy::new().max_retries(2);
/// let response = with_retry(&policy, || client.get(url).send()).await?;
/// ```
pub async fn with_retry<F, Fut, R, E>(policy: &RetryPolicy, attempt_fn: F) -> Result<R, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: AsyncBody,
    E: TransportError,
{
    RetryExecutor::new(policy.clone())
        .execute_async(attempt_fn)
        .await
}

/// Execute a blocking attempt function under `policy`.
pub fn with_retry_blocking<F, R, E>(policy: &RetryPolicy, attempt_fn: F) -> Result<R, ClientError>
where
    F: FnMut() -> Result<R, E>,
    R: BlockingBody,
    E: TransportError,
{
    RetryExecutor::new(policy.clone()).execute(attempt_fn)
}
