/// Email consumer loop
///
/// Pulls [`EmailJob`]s off an [`EmailQueue`], renders them and hands them to
/// a [`Mailer`]. Each job is delivered in its own task so one job's backoff
/// never holds up the queue.
///
/// # Retries
///
/// A job gets `max_attempts` tries. After failed attempt `n` the worker waits
/// `base_backoff * 2^(n-1)` (5 s, 10 s, ... by default). A job that fails
/// every attempt is logged and dropped.
///
/// # Shutdown
///
/// Cancelling the [`shutdown_token`](EmailWorker::shutdown_token) stops
/// dequeuing. In-flight jobs waiting on a backoff are pushed back onto the
/// queue; jobs mid-send finish first.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use todolist_shared::mail::MemoryEmailQueue;
/// use todolist_worker::config::RetryPolicy;
/// use todolist_worker::mailer::LogMailer;
/// use todolist_worker::worker::EmailWorker;
///
/// # async fn example() {
/// let worker = EmailWorker::new(
///     Arc::new(MemoryEmailQueue::new()),
///     Arc::new(LogMailer),
///     RetryPolicy::default(),
///     Duration::from_secs(5),
/// );
///
/// let shutdown = worker.shutdown_token();
/// tokio::spawn(async move { worker.run().await });
/// shutdown.cancel();
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use todolist_shared::mail::{EmailJob, EmailQueue, QueueError};

use crate::config::RetryPolicy;
use crate::mailer::Mailer;
use crate::templates::render;

/// How one job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent { attempts: u32 },

    /// Every attempt failed; `error` is the last failure
    Failed { attempts: u32, error: String },

    /// Shutdown arrived while waiting to retry
    Interrupted { attempts: u32 },
}

pub struct EmailWorker {
    queue: Arc<dyn EmailQueue>,
    mailer: Arc<dyn Mailer>,
    retry: RetryPolicy,
    poll_wait: Duration,
    shutdown_token: CancellationToken,
}

impl EmailWorker {
    pub fn new(
        queue: Arc<dyn EmailQueue>,
        mailer: Arc<dyn Mailer>,
        retry: RetryPolicy,
        poll_wait: Duration,
    ) -> Self {
        Self {
            queue,
            mailer,
            retry,
            poll_wait,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Replaces the worker's own token, e.g. with a child of the host's
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Used to signal graceful shutdown from external handlers
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs until shutdown or until the queue closes
    pub async fn run(&self) {
        tracing::info!(
            queue = self.queue.name(),
            mailer = self.mailer.name(),
            max_attempts = self.retry.max_attempts,
            "Email worker starting"
        );

        let mut in_flight = JoinSet::new();

        // A dequeue is only ever dropped on shutdown. Redis BRPOP keeps
        // waiting server-side after its client future goes away, and the job
        // it pops would be discarded.
        let mut pending = self.queue.dequeue(self.poll_wait);

        loop {
            let next = tokio::select! {
                biased;

                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Shutdown requested, stopping email worker");
                    break;
                }

                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => continue,

                next = &mut pending => next,
            };

            match next {
                Ok(Some(job)) => {
                    in_flight.spawn(process(
                        self.queue.clone(),
                        self.mailer.clone(),
                        self.retry,
                        job,
                        self.shutdown_token.clone(),
                    ));
                }
                Ok(None) => {}
                Err(QueueError::Closed) => {
                    tracing::info!("Email queue closed, stopping email worker");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to dequeue email job");
                    tokio::select! {
                        _ = self.shutdown_token.cancelled() => {}
                        _ = tokio::time::sleep(self.poll_wait) => {}
                    }
                }
            }

            pending = self.queue.dequeue(self.poll_wait);
        }

        if !in_flight.is_empty() {
            tracing::info!(count = in_flight.len(), "Waiting for in-flight emails");
        }
        while in_flight.join_next().await.is_some() {}

        tracing::info!("Email worker shut down");
    }
}

async fn process(
    queue: Arc<dyn EmailQueue>,
    mailer: Arc<dyn Mailer>,
    retry: RetryPolicy,
    job: EmailJob,
    shutdown: CancellationToken,
) {
    match deliver(mailer.as_ref(), retry, &job, &shutdown).await {
        Delivery::Sent { attempts } => {
            tracing::info!(job_id = %job.id, kind = job.kind.as_str(), attempts, "Email sent");
        }
        Delivery::Failed { attempts, error } => {
            tracing::error!(
                job_id = %job.id,
                kind = job.kind.as_str(),
                attempts,
                error = %error,
                "Email failed permanently"
            );
        }
        Delivery::Interrupted { attempts } => {
            tracing::warn!(job_id = %job.id, attempts, "Email retry interrupted by shutdown, requeueing");
            if let Err(e) = queue.enqueue(job).await {
                tracing::error!(error = %e, "Failed to requeue email job");
            }
        }
    }
}

/// Sends one job, retrying with exponential backoff
pub async fn deliver(
    mailer: &dyn Mailer,
    retry: RetryPolicy,
    job: &EmailJob,
    shutdown: &CancellationToken,
) -> Delivery {
    let email = render(job);
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match mailer.send(&email).await {
            Ok(()) => return Delivery::Sent { attempts: attempt },
            Err(e) => e.to_string(),
        };

        if attempt >= max_attempts {
            return Delivery::Failed {
                attempts: attempt,
                error,
            };
        }

        let backoff = retry.backoff(attempt);
        tracing::warn!(
            job_id = %job.id,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %error,
            "Email attempt failed, retrying"
        );

        tokio::select! {
            _ = shutdown.cancelled() => return Delivery::Interrupted { attempts: attempt },
            _ = tokio::time::sleep(backoff) => {}
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MailerError;
    use crate::templates::RenderedEmail;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use todolist_shared::mail::MemoryEmailQueue;
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    /// Fails the first `failures` sends, then records successes
    struct FlakyMailer {
        failures: u32,
        calls: Mutex<Vec<Instant>>,
        sent: Mutex<Vec<RenderedEmail>>,
    }

    impl FlakyMailer {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn send(&self, email: &RenderedEmail) -> Result<(), MailerError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Instant::now());
                calls.len() as u32
            };

            if call <= self.failures {
                return Err(MailerError::Rejected {
                    status: 503,
                    body: "try later".to_string(),
                });
            }

            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_exponential_backoff() {
        let mailer = FlakyMailer::new(2);
        let job = EmailJob::welcome("ada@example.com", "Ada");

        let outcome = deliver(&mailer, RetryPolicy::default(), &job, &CancellationToken::new()).await;
        assert_eq!(outcome, Delivery::Sent { attempts: 3 });

        let calls = mailer.calls.lock().unwrap().clone();
        assert_eq!(calls[1] - calls[0], Duration::from_secs(5));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let mailer = FlakyMailer::new(u32::MAX);
        let job = EmailJob::welcome("ada@example.com", "Ada");

        let outcome = deliver(&mailer, RetryPolicy::default(), &job, &CancellationToken::new()).await;

        assert!(matches!(outcome, Delivery::Failed { attempts: 3, .. }));
        assert_eq!(mailer.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_backoff() {
        let mailer = FlakyMailer::new(u32::MAX);
        let job = EmailJob::welcome("ada@example.com", "Ada");
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let outcome = deliver(&mailer, RetryPolicy::default(), &job, &shutdown).await;

        assert_eq!(outcome, Delivery::Interrupted { attempts: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_token_stops_worker() {
        let parent = CancellationToken::new();
        let worker = EmailWorker::new(
            Arc::new(MemoryEmailQueue::new()),
            Arc::new(FlakyMailer::new(0)),
            RetryPolicy::default(),
            Duration::from_secs(1),
        )
        .with_shutdown_token(parent.child_token());

        let handle = tokio::spawn(async move { worker.run().await });
        parent.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_drains_queue() {
        let queue = Arc::new(MemoryEmailQueue::new());
        let mailer = Arc::new(FlakyMailer::new(1));

        queue
            .enqueue(EmailJob::verify_otp("ada@example.com", "Ada Lovelace", "123456"))
            .await
            .unwrap();

        let worker = EmailWorker::new(
            queue.clone(),
            mailer.clone(),
            RetryPolicy::default(),
            Duration::from_secs(1),
        );
        let shutdown = worker.shutdown_token();
        let handle = tokio::spawn(async move { worker.run().await });

        for _ in 0..100 {
            if !mailer.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        shutdown.cancel();
        handle.await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html.contains("123456"));
        assert_eq!(mailer.call_count(), 2);
    }

    /// Queue whose blocking pops behave like Redis `BRPOP`: a waiting pop
    /// stays registered until its deadline even if the caller stops polling,
    /// and a job handed to such an abandoned pop is gone.
    #[derive(Default)]
    struct BlockingPopQueue {
        state: Mutex<BlockingPopState>,
    }

    #[derive(Default)]
    struct BlockingPopState {
        jobs: VecDeque<EmailJob>,
        waiters: VecDeque<Waiter>,
        next_waiter: u64,
        discarded: usize,
    }

    struct Waiter {
        id: u64,
        deadline: Instant,
        tx: oneshot::Sender<EmailJob>,
    }

    impl BlockingPopQueue {
        fn discarded(&self) -> usize {
            self.state.lock().unwrap().discarded
        }
    }

    #[async_trait]
    impl EmailQueue for BlockingPopQueue {
        fn name(&self) -> &'static str {
            "blocking-pop"
        }

        async fn enqueue(&self, job: EmailJob) -> Result<(), QueueError> {
            let mut state = self.state.lock().unwrap();
            let now = Instant::now();

            while let Some(waiter) = state.waiters.pop_front() {
                if waiter.deadline <= now {
                    continue;
                }
                if waiter.tx.send(job).is_err() {
                    state.discarded += 1;
                }
                return Ok(());
            }

            state.jobs.push_back(job);
            Ok(())
        }

        async fn dequeue(&self, wait: Duration) -> Result<Option<EmailJob>, QueueError> {
            let (id, rx) = {
                let mut state = self.state.lock().unwrap();
                if let Some(job) = state.jobs.pop_front() {
                    return Ok(Some(job));
                }

                let (tx, rx) = oneshot::channel();
                let id = state.next_waiter;
                state.next_waiter += 1;
                state.waiters.push_back(Waiter {
                    id,
                    deadline: Instant::now() + wait,
                    tx,
                });
                (id, rx)
            };

            match tokio::time::timeout(wait, rx).await {
                Ok(Ok(job)) => Ok(Some(job)),
                Ok(Err(_)) => Ok(None),
                Err(_) => {
                    self.state.lock().unwrap().waiters.retain(|w| w.id != id);
                    Ok(None)
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_arriving_after_delivery_is_not_lost() {
        let queue = Arc::new(BlockingPopQueue::default());
        let mailer = Arc::new(FlakyMailer::new(0));

        queue
            .enqueue(EmailJob::welcome("first@example.com", "First"))
            .await
            .unwrap();

        let worker = EmailWorker::new(
            queue.clone(),
            mailer.clone(),
            RetryPolicy::default(),
            Duration::from_secs(5),
        );
        let shutdown = worker.shutdown_token();
        let handle = tokio::spawn(async move { worker.run().await });

        // The first delivery finishes while the next pop is already waiting
        tokio::time::sleep(Duration::from_millis(100)).await;
        queue
            .enqueue(EmailJob::verify_otp("second@example.com", "Second", "654321"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(queue.discarded(), 0);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].html.contains("654321"));
    }
}
