//! Provider stream wrapper that settles breaker and metrics bookkeeping

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::future::Future;
use std::time::{Duration, Instant};

use futures::{stream, Stream, StreamExt};
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Sleep;
use tracing::warn;

use crate::domain::{CallPermit, ChunkStream, DomainError, ProviderMetrics, StreamChunk};
use crate::infrastructure::observability::{record_provider_request, AttemptOutcome};

/// A streaming completion from the provider that accepted it.
///
/// Exhausting the stream counts as a success and a mid-stream error as a
/// failure. A provider that sends nothing for `idle_timeout` is cut off with
/// a timeout, which also counts as a failure. Dropping the stream early
/// counts as neither: the connection is closed, the breaker permit is
/// abandoned and the concurrency slot is freed.
pub struct CompletionStream {
    provider: String,
    model: String,
    inner: ChunkStream,
    permit: Option<CallPermit>,
    metrics: Arc<ProviderMetrics>,
    started: Instant,
    slot: Option<OwnedSemaphorePermit>,
    idle_timeout: Duration,
    idle: Pin<Box<Sleep>>,
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("settled", &self.permit.is_none())
            .finish_non_exhaustive()
    }
}

impl CompletionStream {
    pub(crate) fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        inner: ChunkStream,
        permit: CallPermit,
        metrics: Arc<ProviderMetrics>,
        started: Instant,
        slot: OwnedSemaphorePermit,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            inner,
            permit: Some(permit),
            metrics,
            started,
            slot: Some(slot),
            idle_timeout,
            idle: Box::pin(tokio::time::sleep(idle_timeout)),
        }
    }

    /// Provider serving this stream
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Provider-native model name
    pub fn model(&self) -> &str {
        &self.model
    }

    fn settle(&mut self, error: Option<&DomainError>) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        let elapsed = self.started.elapsed();

        match error {
            None => {
                permit.succeed();
                self.metrics.record_success(elapsed);
                record_provider_request(&self.provider, "stream", AttemptOutcome::Success, elapsed);
            }
            Some(e) if e.is_recoverable() => {
                let outcome = match e {
                    DomainError::ProviderTimeout { .. } => AttemptOutcome::Timeout,
                    _ => AttemptOutcome::Failure,
                };

                warn!(provider = %self.provider, error = %e, "Stream failed mid-flight");
                permit.fail();
                self.metrics.record_failure(elapsed);
                record_provider_request(&self.provider, "stream", outcome, elapsed);
            }
            Some(e) => {
                warn!(provider = %self.provider, error = %e, "Stream ended with error");
                permit.release();
            }
        }

        self.slot = None;
    }
}

impl Stream for CompletionStream {
    type Item = Result<StreamChunk, DomainError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.permit.is_none() {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let deadline = tokio::time::Instant::now() + this.idle_timeout;
                this.idle.as_mut().reset(deadline);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.settle(Some(&e));
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.settle(None);
                Poll::Ready(None)
            }
            Poll::Pending => match this.idle.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    let e = DomainError::provider_timeout(
                        this.provider.clone(),
                        this.idle_timeout.as_millis() as u64,
                    );
                    this.settle(Some(&e));
                    // Close the stalled connection now rather than on drop
                    this.inner = stream::empty().boxed();
                    Poll::Ready(Some(Err(e)))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Semaphore;

    use super::*;
    use crate::domain::{CircuitBreaker, CircuitBreakerSettings, CircuitStatus};

    fn breaker(cooldown: Duration) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "slow",
            CircuitBreakerSettings {
                failure_threshold: 1,
                failure_window: Duration::from_secs(60),
                cooldown,
            },
        ))
    }

    async fn slot(limiter: &Arc<Semaphore>) -> OwnedSemaphorePermit {
        Arc::clone(limiter).acquire_owned().await.unwrap()
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out_and_frees_trial() {
        let breaker = breaker(Duration::from_millis(10));
        breaker.try_acquire().unwrap().fail();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let trial = breaker.try_acquire().unwrap();
        assert!(trial.is_trial());

        let limiter = Arc::new(Semaphore::new(1));
        let metrics = Arc::new(ProviderMetrics::new());
        let chunks = stream::iter(vec![Ok(StreamChunk::delta("first"))])
            .chain(stream::pending())
            .boxed();

        let mut completion = CompletionStream::new(
            "slow",
            "model",
            chunks,
            trial,
            Arc::clone(&metrics),
            Instant::now(),
            slot(&limiter).await,
            Duration::from_millis(50),
        );

        let first = completion.next().await.unwrap().unwrap();
        assert_eq!(first.delta.as_deref(), Some("first"));

        let stalled = tokio::time::timeout(Duration::from_secs(2), completion.next())
            .await
            .expect("idle timeout should end the stream");
        assert!(matches!(stalled, Some(Err(DomainError::ProviderTimeout { .. }))));
        assert!(completion.next().await.is_none());

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.status, CircuitStatus::Open);
        assert!(!snapshot.trial_in_flight);
        assert_eq!(limiter.available_permits(), 1);
        assert_eq!(metrics.snapshot("slow").failure_count, 1);
    }

    #[tokio::test]
    async fn test_each_chunk_restarts_idle_timer() {
        let breaker = breaker(Duration::from_secs(30));
        let limiter = Arc::new(Semaphore::new(1));
        let metrics = Arc::new(ProviderMetrics::new());
        let chunks = stream::iter(0..4)
            .then(|i| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(StreamChunk::delta(i.to_string()))
            })
            .boxed();

        let completion = CompletionStream::new(
            "slow",
            "model",
            chunks,
            breaker.try_acquire().unwrap(),
            Arc::clone(&metrics),
            Instant::now(),
            slot(&limiter).await,
            Duration::from_millis(100),
        );

        let received: Vec<_> = completion.collect().await;

        assert_eq!(received.len(), 4);
        assert!(received.iter().all(|chunk| chunk.is_ok()));
        assert_eq!(breaker.status(), CircuitStatus::Closed);
        assert_eq!(metrics.snapshot("slow").success_count, 1);
        assert_eq!(limiter.available_permits(), 1);
    }
}
