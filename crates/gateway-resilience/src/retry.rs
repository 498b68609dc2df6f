//! Credential failover loop.
//!
//! Every backend call runs inside a [`RetryOrchestrator`]: an attempt that
//! fails with a retryable error is counted against its credential and the
//! call is repeated with a replacement from the pool, until the attempt
//! budget is spent.

use async_stream::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use gateway_core::{AttemptRecord, AttemptSink, ErrorRecord, GatewayError, GatewayResult};
use gateway_routing::{Credential, CredentialPool};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Status recorded for a successful attempt
const SUCCESS_STATUS: u16 = 200;

/// State of one logical client request
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempts started so far, numbered from 1
    pub attempt: u32,
    /// Attempt budget
    pub max_attempts: u32,
    /// Credential for the current attempt
    pub credential: Credential,
    /// Error of the previous attempt
    pub last_error: Option<GatewayError>,
}

impl RetryContext {
    /// Fresh context starting on `credential`
    #[must_use]
    pub fn new(credential: Credential, max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            credential,
            last_error: None,
        }
    }
}

/// Runs units of work against pooled credentials with failover
#[derive(Clone)]
pub struct RetryOrchestrator {
    pool: Arc<CredentialPool>,
    sink: Arc<dyn AttemptSink>,
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl RetryOrchestrator {
    /// Create a new orchestrator
    pub fn new(pool: Arc<CredentialPool>, sink: Arc<dyn AttemptSink>) -> Self {
        Self { pool, sink }
    }

    /// The credential pool
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Run `unit` until it succeeds or the budget of `max_retries` attempts
    /// is spent
    ///
    /// # Errors
    /// Returns non-retryable errors unchanged, and `RetriesExhausted`
    /// carrying the last error once the budget is spent
    pub async fn execute<T, F, Fut>(&self, model: &str, max_retries: u32, unit: F) -> GatewayResult<T>
    where
        F: Fn(Credential) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let mut ctx = RetryContext::new(self.pool.next_working(), max_retries);
        let (value, started) = self.attempt_until_ok(model, &unit, &mut ctx).await?;
        self.report_success(model, &ctx, started.elapsed());
        Ok(value)
    }

    /// Open a stream with failover, then keep it alive across mid-stream
    /// failures
    ///
    /// Failures before the stream opens behave as in
    /// [`execute`](Self::execute). After that, a failed stream is counted
    /// against its credential and `unit` is invoked again from scratch with a
    /// replacement; items already delivered are not retracted. When the
    /// budget runs out mid-stream, the item built by `error_frame` ends the
    /// stream. One attempt counter spans both phases.
    ///
    /// # Errors
    /// Returns an error only if no stream could be opened
    pub async fn execute_stream<T, F, Fut, E>(
        &self,
        model: &str,
        max_retries: u32,
        unit: F,
        error_frame: E,
    ) -> GatewayResult<BoxStream<'static, T>>
    where
        T: Send + 'static,
        F: Fn(Credential) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = GatewayResult<BoxStream<'static, GatewayResult<T>>>> + Send + 'static,
        E: Fn(&GatewayError) -> T + Send + Sync + 'static,
    {
        let mut ctx = RetryContext::new(self.pool.next_working(), max_retries);
        let (first, first_started) = self.attempt_until_ok(model, &unit, &mut ctx).await?;

        let this = self.clone();
        let model = model.to_string();

        let relayed = stream! {
            let mut current = first;
            let mut started = first_started;

            loop {
                let failure = match current.next().await {
                    Some(Ok(item)) => {
                        yield item;
                        continue;
                    }
                    None => {
                        this.report_success(&model, &ctx, started.elapsed());
                        break;
                    }
                    Some(Err(e)) => e,
                };

                warn!(
                    model = %model,
                    attempt = ctx.attempt,
                    credential = %ctx.credential,
                    error = %failure,
                    "Stream failed after start"
                );

                if !failure.is_retryable() {
                    this.report_failure(&model, &ctx, &failure, started.elapsed());
                    yield error_frame(&failure);
                    break;
                }

                if let Err(exhausted) = this.fail_over(&model, &mut ctx, failure, started.elapsed()) {
                    yield error_frame(&exhausted);
                    break;
                }

                match this.attempt_until_ok(&model, &unit, &mut ctx).await {
                    Ok((next, next_started)) => {
                        current = next;
                        started = next_started;
                    }
                    Err(e) => {
                        yield error_frame(&e);
                        break;
                    }
                }
            }
        };

        Ok(relayed.boxed())
    }

    /// Attempt loop shared by both entry points. Returns the value and the
    /// start time of the successful attempt.
    async fn attempt_until_ok<T, F, Fut>(
        &self,
        model: &str,
        unit: &F,
        ctx: &mut RetryContext,
    ) -> GatewayResult<(T, Instant)>
    where
        F: Fn(Credential) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        loop {
            ctx.attempt += 1;
            let started = Instant::now();
            debug!(
                model = %model,
                attempt = ctx.attempt,
                max_attempts = ctx.max_attempts,
                credential = %ctx.credential,
                "Dispatching attempt"
            );

            match unit(ctx.credential.clone()).await {
                Ok(value) => {
                    if ctx.attempt > 1 {
                        debug!(attempt = ctx.attempt, "Failover succeeded");
                    }
                    return Ok((value, started));
                }
                Err(e) if !e.is_retryable() => {
                    self.report_failure(model, ctx, &e, started.elapsed());
                    return Err(e);
                }
                Err(e) => self.fail_over(model, ctx, e, started.elapsed())?,
            }
        }
    }

    /// Count a retryable failure and move `ctx` to a replacement credential
    fn fail_over(
        &self,
        model: &str,
        ctx: &mut RetryContext,
        failure: GatewayError,
        latency: Duration,
    ) -> GatewayResult<()> {
        self.report_failure(model, ctx, &failure, latency);

        match self
            .pool
            .record_failure(&ctx.credential, ctx.attempt, ctx.max_attempts)
        {
            Some(next) => {
                warn!(
                    model = %model,
                    attempt = ctx.attempt,
                    max_attempts = ctx.max_attempts,
                    failed = %ctx.credential,
                    next = %next,
                    error = %failure,
                    "Attempt failed, switching credential"
                );
                ctx.credential = next;
                ctx.last_error = Some(failure);
                Ok(())
            }
            None => {
                error!(
                    model = %model,
                    attempts = ctx.attempt,
                    error = %failure,
                    "Retry budget exhausted"
                );
                Err(GatewayError::RetriesExhausted {
                    attempts: ctx.attempt,
                    last: Box::new(failure),
                })
            }
        }
    }

    fn report_success(&self, model: &str, ctx: &RetryContext, latency: Duration) {
        self.report(
            AttemptRecord {
                model: model.to_string(),
                credential: ctx.credential.masked(),
                success: true,
                status_code: SUCCESS_STATUS,
                latency,
            },
            None,
        );
    }

    fn report_failure(&self, model: &str, ctx: &RetryContext, failure: &GatewayError, latency: Duration) {
        let status_code = failure.status_code();
        let error_body = match failure {
            GatewayError::Upstream {
                body: Some(body), ..
            } => body.clone(),
            other => other.to_string(),
        };

        self.report(
            AttemptRecord {
                model: model.to_string(),
                credential: ctx.credential.masked(),
                success: false,
                status_code,
                latency,
            },
            Some(ErrorRecord {
                credential: ctx.credential.masked(),
                model: model.to_string(),
                error_type: failure.error_type().to_string(),
                error_body,
                status_code,
            }),
        );
    }

    /// Hand records to the sink without waiting on it
    fn report(&self, attempt: AttemptRecord, failure: Option<ErrorRecord>) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink.record_attempt(attempt).await {
                warn!(error = %e, "Failed to record attempt");
            }
            if let Some(record) = failure {
                if let Err(e) = sink.record_error(record).await {
                    warn!(error = %e, "Failed to record error");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        attempts: Mutex<Vec<AttemptRecord>>,
        errors: Mutex<Vec<ErrorRecord>>,
    }

    #[async_trait]
    impl AttemptSink for RecordingSink {
        async fn record_attempt(&self, record: AttemptRecord) -> GatewayResult<()> {
            self.attempts.lock().push(record);
            Ok(())
        }

        async fn record_error(&self, record: ErrorRecord) -> GatewayResult<()> {
            self.errors.lock().push(record);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AttemptSink for FailingSink {
        async fn record_attempt(&self, _record: AttemptRecord) -> GatewayResult<()> {
            Err(GatewayError::internal("log store down"))
        }

        async fn record_error(&self, _record: ErrorRecord) -> GatewayResult<()> {
            Err(GatewayError::internal("log store down"))
        }
    }

    const KEY_A: &str = "AIzaKeyAlpha0000000000000000000000000001";
    const KEY_B: &str = "AIzaKeyBravo0000000000000000000000000002";
    const KEY_C: &str = "AIzaKeyCharlie00000000000000000000000003";

    fn orchestrator(keys: &[&str], max_failures: u32) -> (RetryOrchestrator, Arc<RecordingSink>) {
        let pool = Arc::new(CredentialPool::new(keys.iter().copied(), max_failures).unwrap());
        let sink = Arc::new(RecordingSink::default());
        (RetryOrchestrator::new(pool, sink.clone()), sink)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn quota() -> GatewayError {
        GatewayError::upstream(429, "quota exceeded", Some(r#"{"error":{"code":429}}"#.into()))
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let (orchestrator, sink) = orchestrator(&[KEY_A, KEY_B], 3);

        let used = orchestrator
            .execute("gemini-2.0-flash", 3, |cred| async move { Ok::<_, GatewayError>(cred.expose().to_string()) })
            .await
            .unwrap();

        assert_eq!(used, KEY_A);
        settle().await;
        let attempts = sink.attempts.lock();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].success);
        assert!(!attempts[0].credential.contains(KEY_A));
    }

    #[tokio::test]
    async fn test_success_on_second_attempt_uses_replacement() {
        let (orchestrator, sink) = orchestrator(&[KEY_A, KEY_B], 3);

        let used = orchestrator
            .execute("m", 3, |cred| async move {
                if cred.expose() == KEY_A {
                    Err(quota())
                } else {
                    Ok(cred.expose().to_string())
                }
            })
            .await
            .unwrap();

        assert_eq!(used, KEY_B);
        let pool = orchestrator.pool();
        assert_eq!(pool.failure_count(&pool.find(KEY_A).unwrap()), Some(1));
        assert_eq!(pool.failure_count(&pool.find(KEY_B).unwrap()), Some(0));

        settle().await;
        assert_eq!(sink.attempts.lock().len(), 2);
        let errors = sink.errors.lock();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_type, "rate_limited");
        assert_eq!(errors[0].status_code, 429);
        assert!(errors[0].error_body.contains("429"));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_after_three_attempts() {
        let (orchestrator, _) = orchestrator(&[KEY_A, KEY_B, KEY_C], 5);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let err = orchestrator
            .execute("m", 3, move |_cred| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(GatewayError::upstream(500, "boom", None)) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            GatewayError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, GatewayError::Upstream { status: 500, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let (orchestrator, _) = orchestrator(&[KEY_A, KEY_B], 1);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let err = orchestrator
            .execute("m", 3, move |_cred| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(GatewayError::validation("bad request", None)) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Validation { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(orchestrator.pool().status().invalid.is_empty());
    }

    #[tokio::test]
    async fn test_failed_credential_is_skipped_afterwards() {
        let (orchestrator, _) = orchestrator(&[KEY_A, KEY_B], 1);

        let first = orchestrator
            .execute("m", 3, |cred| async move {
                if cred.expose() == KEY_A {
                    Err(GatewayError::upstream(400, "API key not valid", None))
                } else {
                    Ok(cred.expose().to_string())
                }
            })
            .await
            .unwrap();
        assert_eq!(first, KEY_B);

        for _ in 0..3 {
            let used = orchestrator
                .execute("m", 3, |cred| async move { Ok::<_, GatewayError>(cred.expose().to_string()) })
                .await
                .unwrap();
            assert_eq!(used, KEY_B);
        }

        let pool = orchestrator.pool();
        assert!(pool.reset(&pool.find(KEY_A).unwrap()));
        let picks: Vec<String> = [0, 1]
            .iter()
            .map(|_| pool.next_working().expose().to_string())
            .collect();
        assert!(picks.contains(&KEY_A.to_string()));
    }

    #[tokio::test]
    async fn test_sink_failures_are_swallowed() {
        let pool = Arc::new(CredentialPool::new([KEY_A], 3).unwrap());
        let orchestrator = RetryOrchestrator::new(pool, Arc::new(FailingSink));

        let value = orchestrator
            .execute("m", 3, |_cred| async { Ok::<_, GatewayError>(7) })
            .await
            .unwrap();
        settle().await;
        assert_eq!(value, 7);
    }

    fn items(values: Vec<GatewayResult<String>>) -> BoxStream<'static, GatewayResult<String>> {
        stream::iter(values).boxed()
    }

    fn error_frame(e: &GatewayError) -> String {
        format!("error:{}", e.error_type())
    }

    #[tokio::test]
    async fn test_stream_restarts_after_mid_stream_failure() {
        let (orchestrator, _) = orchestrator(&[KEY_A, KEY_B], 3);

        let frames: Vec<String> = orchestrator
            .execute_stream(
                "m",
                3,
                |cred: Credential| async move {
                    if cred.expose() == KEY_A {
                        Ok(items(vec![
                            Ok("a1".into()),
                            Err(GatewayError::stream_interrupted("reset by peer")),
                        ]))
                    } else {
                        Ok(items(vec![Ok("b1".into()), Ok("b2".into())]))
                    }
                },
                error_frame,
            )
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(frames, vec!["a1", "b1", "b2"]);
        let pool = orchestrator.pool();
        assert_eq!(pool.failure_count(&pool.find(KEY_A).unwrap()), Some(1));
    }

    #[tokio::test]
    async fn test_stream_open_failure_fails_over() {
        let (orchestrator, _) = orchestrator(&[KEY_A, KEY_B], 3);

        let frames: Vec<String> = orchestrator
            .execute_stream(
                "m",
                3,
                |cred: Credential| async move {
                    if cred.expose() == KEY_A {
                        Err(GatewayError::stream_init(400, "API key not valid"))
                    } else {
                        Ok(items(vec![Ok("ok".into())]))
                    }
                },
                error_frame,
            )
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(frames, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_stream_open_exhaustion_is_an_error() {
        let (orchestrator, _) = orchestrator(&[KEY_A, KEY_B], 3);

        let result = orchestrator
            .execute_stream(
                "m",
                2,
                |_cred: Credential| async { Err::<BoxStream<'static, GatewayResult<String>>, _>(quota()) },
                error_frame,
            )
            .await;

        assert!(matches!(result, Err(GatewayError::RetriesExhausted { attempts: 2, .. })));
    }

    #[tokio::test]
    async fn test_stream_exhaustion_mid_stream_emits_error_frame() {
        let (orchestrator, _) = orchestrator(&[KEY_A, KEY_B], 3);
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let frames: Vec<String> = orchestrator
            .execute_stream(
                "m",
                2,
                move |_cred: Credential| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async {
                        Ok(items(vec![
                            Ok("partial".into()),
                            Err(GatewayError::stream_interrupted("reset")),
                        ]))
                    }
                },
                error_frame,
            )
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(frames, vec!["partial", "partial", "error:retries_exhausted"]);
    }
}
