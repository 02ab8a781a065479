//! One background loop servicing a min-heap of party deadlines.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::chat::RoomId;

use super::model::PartyId;

/// Identifies one scheduled party instance. The token changes whenever a room
/// reuses a party id, so a stale deadline never matches a newer party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerKey {
    pub room: RoomId,
    pub party: PartyId,
    pub token: u64,
}

enum Command<K> {
    Schedule(K, DateTime<Utc>),
    Cancel(K),
}

/// Handle to the deadline loop. Due keys arrive on the receiver returned by
/// [`DeadlineQueue::spawn`].
#[derive(Clone)]
pub struct DeadlineQueue<K> {
    commands: mpsc::UnboundedSender<Command<K>>,
}

impl<K> DeadlineQueue<K>
where
    K: Ord + Copy + Debug + Send + 'static,
{
    /// Start the loop on the current tokio runtime.
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<K>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(command_rx, due_tx));
        (Self { commands }, due_rx)
    }

    pub fn schedule(&self, key: K, at: DateTime<Utc>) {
        if self.commands.send(Command::Schedule(key, at)).is_err() {
            tracing::warn!("Deadline loop is gone, {:?} will never fire", key);
        }
    }

    pub fn cancel(&self, key: K) {
        let _ = self.commands.send(Command::Cancel(key));
    }
}

fn instant_for(at: DateTime<Utc>) -> Instant {
    let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Instant::now() + wait
}

async fn run<K>(mut commands: mpsc::UnboundedReceiver<Command<K>>, due: mpsc::UnboundedSender<K>)
where
    K: Ord + Copy + Debug,
{
    let mut heap: BinaryHeap<Reverse<(DateTime<Utc>, K)>> = BinaryHeap::new();

    loop {
        let next = heap.peek().map(|Reverse((at, _))| *at);
        let wake = async move {
            match next {
                Some(at) => sleep_until(instant_for(at)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Schedule(key, at)) => {
                    tracing::debug!("Deadline scheduled: {:?} at {}", key, at);
                    heap.push(Reverse((at, key)));
                }
                Some(Command::Cancel(key)) => {
                    heap.retain(|Reverse((_, k))| *k != key);
                    tracing::debug!("Deadline cancelled: {:?}", key);
                }
                None => break,
            },
            _ = wake => {
                let now = Utc::now();
                while let Some(Reverse((at, key))) = heap.peek().copied() {
                    if at > now {
                        break;
                    }
                    heap.pop();
                    if due.send(key).is_err() {
                        return;
                    }
                }
            }
        }
    }

    tracing::debug!("Deadline loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn in_ms(ms: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::milliseconds(ms)
    }

    #[tokio::test]
    async fn fires_in_deadline_order() {
        let (queue, mut due) = DeadlineQueue::<u32>::spawn();
        queue.schedule(2, in_ms(80));
        queue.schedule(1, in_ms(20));

        let first = timeout(Duration::from_secs(2), due.recv()).await.unwrap();
        let second = timeout(Duration::from_secs(2), due.recv()).await.unwrap();
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
    }

    #[tokio::test]
    async fn cancelled_deadline_never_fires() {
        let (queue, mut due) = DeadlineQueue::<u32>::spawn();
        queue.schedule(7, in_ms(30));
        queue.cancel(7);
        queue.schedule(8, in_ms(60));

        let got = timeout(Duration::from_secs(2), due.recv()).await.unwrap();
        assert_eq!(got, Some(8));
        assert!(timeout(Duration::from_millis(100), due.recv()).await.is_err());
    }

    #[tokio::test]
    async fn past_deadline_fires_immediately() {
        let (queue, mut due) = DeadlineQueue::<u32>::spawn();
        queue.schedule(3, in_ms(-1_000));
        let got = timeout(Duration::from_millis(500), due.recv()).await.unwrap();
        assert_eq!(got, Some(3));
    }
}
