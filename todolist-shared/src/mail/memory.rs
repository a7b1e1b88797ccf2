/// In-process email queue over an unbounded tokio channel

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use super::{EmailJob, EmailQueue, QueueError};

pub struct MemoryEmailQueue {
    tx: mpsc::UnboundedSender<EmailJob>,
    rx: Mutex<mpsc::UnboundedReceiver<EmailJob>>,
}

impl Default for MemoryEmailQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEmailQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

#[async_trait]
impl EmailQueue for MemoryEmailQueue {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn enqueue(&self, job: EmailJob) -> Result<(), QueueError> {
        self.tx.send(job).map_err(|_| QueueError::Closed)
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<EmailJob>, QueueError> {
        let mut rx = self.rx.lock().await;

        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(job)) => Ok(Some(job)),
            Ok(None) => Err(QueueError::Closed),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_delivery() {
        let queue = MemoryEmailQueue::new();
        let first = EmailJob::welcome("a@example.com", "Ada");
        let second = EmailJob::welcome("b@example.com", "Bob");

        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        let wait = Duration::from_millis(10);
        assert_eq!(queue.dequeue(wait).await.unwrap(), Some(first));
        assert_eq!(queue.dequeue(wait).await.unwrap(), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_times_out() {
        let queue = MemoryEmailQueue::new();
        assert_eq!(queue.dequeue(Duration::from_secs(1)).await.unwrap(), None);
    }
}
