//! Capacity-zero hand-off between tile producers and dispatch calls.
//!
//! A background manager task pairs producer offers with receiver demands. A
//! `send` only completes once a receiver has taken the item, so a producer can
//! never run ahead of its consumers, and a receiver that gives up on its wait
//! never strands an item that was already handed to it.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::QueueError;

const COMMAND_CAPACITY: usize = 100;

enum QueueCommand<T> {
    Offer {
        item: T,
        delivered: oneshot::Sender<()>,
    },
    Demand {
        reply: oneshot::Sender<T>,
    },
}

struct Offer<T> {
    item: T,
    delivered: oneshot::Sender<()>,
}

/// Rendezvous channel shared by any number of producers and receivers.
pub struct JobQueue<T> {
    command_tx: mpsc::Sender<QueueCommand<T>>,
    shutdown: CancellationToken,
}

impl<T> fmt::Debug for JobQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("closed", &self.shutdown.is_cancelled())
            .field("queued_commands", &(COMMAND_CAPACITY - self.command_tx.capacity()))
            .finish()
    }
}

impl<T: Send + 'static> JobQueue<T> {
    /// Create the queue and spawn its manager on the current runtime.
    pub fn new() -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let shutdown = CancellationToken::new();

        tokio::spawn(run_manager(command_rx, shutdown.clone()));

        Self {
            command_tx,
            shutdown,
        }
    }

    /// Hand `item` to the next ready receiver, waiting until one takes it.
    ///
    /// Fails with [`QueueError::Closed`] once the queue is closed, including
    /// while this call is still waiting.
    pub async fn send(&self, item: T) -> Result<(), QueueError> {
        let (delivered, delivered_rx) = oneshot::channel();
        self.command_tx
            .send(QueueCommand::Offer { item, delivered })
            .await
            .map_err(|_| QueueError::Closed)?;

        delivered_rx.await.map_err(|_| QueueError::Closed)
    }

    /// Wait up to `wait` for a producer. Every call gets a fresh window.
    pub async fn recv_timeout(&self, wait: Duration) -> Result<T, QueueError> {
        let deadline = Instant::now() + wait;
        let (reply, mut reply_rx) = oneshot::channel();

        tokio::select! {
            sent = self.command_tx.send(QueueCommand::Demand { reply }) => {
                sent.map_err(|_| QueueError::Closed)?;
            }
            _ = sleep_until(deadline) => return Err(QueueError::Timeout),
        }

        tokio::select! {
            received = &mut reply_rx => received.map_err(|_| QueueError::Closed),
            _ = sleep_until(deadline) => {
                // A producer may have matched us right at the deadline.
                reply_rx.close();
                reply_rx.try_recv().map_err(|_| QueueError::Timeout)
            }
        }
    }

    /// Close the queue. Waiting and future senders fail, waiting receivers
    /// return [`QueueError::Closed`].
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.command_tx.is_closed()
    }
}

impl<T: Send + 'static> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for JobQueue<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_manager<T>(
    mut command_rx: mpsc::Receiver<QueueCommand<T>>,
    shutdown: CancellationToken,
) {
    let mut offers: VecDeque<Offer<T>> = VecDeque::new();
    let mut waiters: VecDeque<oneshot::Sender<T>> = VecDeque::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            command = command_rx.recv() => match command {
                Some(QueueCommand::Offer { item, delivered }) => {
                    offers.push_back(Offer { item, delivered });
                }
                Some(QueueCommand::Demand { reply }) => {
                    // Receivers whose window already closed.
                    waiters.retain(|waiter| !waiter.is_closed());
                    waiters.push_back(reply);
                }
                None => break,
            },
        }

        match_pending(&mut offers, &mut waiters);
    }

    // Dropping the pending halves wakes both sides with a closed error.
    command_rx.close();
    info!(
        pending_offers = offers.len(),
        pending_receivers = waiters.len(),
        "job queue closed"
    );
}

fn match_pending<T>(offers: &mut VecDeque<Offer<T>>, waiters: &mut VecDeque<oneshot::Sender<T>>) {
    while let Some(Offer { mut item, delivered }) = offers.pop_front() {
        loop {
            let Some(waiter) = waiters.pop_front() else {
                offers.push_front(Offer { item, delivered });
                return;
            };

            match waiter.send(item) {
                Ok(()) => {
                    let _ = delivered.send(());
                    break;
                }
                Err(returned) => {
                    debug!("receiver left before hand-off, trying the next one");
                    item = returned;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn recv_times_out_on_an_empty_queue() {
        let queue: JobQueue<u32> = JobQueue::new();

        let started = std::time::Instant::now();
        let result = queue.recv_timeout(Duration::from_millis(1)).await;

        assert_eq!(result, Err(QueueError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn send_blocks_until_a_receiver_takes_the_item() {
        let queue = Arc::new(JobQueue::new());

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.send(7u32).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished(), "send returned without a receiver");

        let item = queue.recv_timeout(Duration::from_secs(1)).await;
        assert_eq!(item, Ok(7));
        assert_eq!(producer.await.expect("producer task"), Ok(()));
    }

    #[tokio::test]
    async fn items_arrive_in_send_order() {
        let queue = Arc::new(JobQueue::new());

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                for item in 0..5u32 {
                    queue.send(item).await?;
                }
                Ok::<_, QueueError>(())
            })
        };

        let mut received = Vec::new();
        for _ in 0..5 {
            received.push(queue.recv_timeout(Duration::from_secs(1)).await.expect("item"));
        }

        assert_eq!(received, vec![0, 1, 2, 3, 4]);
        assert_eq!(producer.await.expect("producer task"), Ok(()));
    }

    #[tokio::test]
    async fn one_item_reaches_exactly_one_of_two_receivers() {
        let queue = Arc::new(JobQueue::new());

        let receivers: Vec<_> = (0..2)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.recv_timeout(Duration::from_millis(200)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.send(42u32).await.expect("delivered");

        let mut delivered = 0;
        let mut timed_out = 0;
        for receiver in receivers {
            match receiver.await.expect("receiver task") {
                Ok(42) => delivered += 1,
                Err(QueueError::Timeout) => timed_out += 1,
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!((delivered, timed_out), (1, 1));
    }

    #[tokio::test]
    async fn timed_out_receivers_do_not_swallow_items() {
        let queue = Arc::new(JobQueue::new());

        assert_eq!(
            queue.recv_timeout(Duration::from_millis(1)).await,
            Err(QueueError::Timeout)
        );

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.send(9u32).await })
        };

        assert_eq!(queue.recv_timeout(Duration::from_secs(1)).await, Ok(9));
        assert_eq!(producer.await.expect("producer task"), Ok(()));
    }

    #[tokio::test]
    async fn close_fails_blocked_and_future_senders() {
        let queue = Arc::new(JobQueue::new());

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.send(1u32).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.close();

        assert_eq!(producer.await.expect("producer task"), Err(QueueError::Closed));
        assert!(queue.is_closed());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.send(2).await, Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn close_releases_waiting_receivers() {
        let queue: Arc<JobQueue<u32>> = Arc::new(JobQueue::new());

        let receiver = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.recv_timeout(Duration::from_secs(30)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.close();

        let outcome = tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .expect("receiver released promptly")
            .expect("receiver task");
        assert_eq!(outcome, Err(QueueError::Closed));
    }
}
