//! InMemoryComm - 同一プロセス内の Communicator 実装
//!
//! # 実装詳細
//! - rank ごとに bounded `mpsc` の受信箱を 1 つ持つ（全送信元で共有）
//! - `recv(Source::Rank(r))` は他の送信元のメッセージを stash に退避する
//! - `isend` はまず `try_send`、受信箱が満杯なら tokio task に送信を任せる

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::domain::Rank;
use crate::ports::{CommError, Communicator, Envelope, SendRequest, Source};

struct Inbox<M> {
    rx: mpsc::Receiver<Envelope<M>>,
    /// Messages received while waiting for a specific source.
    stash: VecDeque<Envelope<M>>,
}

/// One rank's endpoint in an in-process world.
///
/// # 使用例
/// ```ignore
/// let (manager, workers) = InMemoryComm::with_workers(3, 16);
/// manager.send(msg, Rank::new(1)).await?;
/// let env = workers[0].recv(Source::Rank(Rank::MANAGER)).await?;
/// ```
pub struct InMemoryComm<M> {
    rank: Rank,
    peers: Arc<[mpsc::Sender<Envelope<M>>]>,
    inbox: Mutex<Inbox<M>>,
}

impl<M: Send + 'static> InMemoryComm<M> {
    /// Create `size` connected endpoints, index = rank.
    ///
    /// `capacity` is the number of messages each inbox buffers before a
    /// blocking send has to wait (at least 1).
    pub fn world(size: usize, capacity: usize) -> Vec<Self> {
        let capacity = capacity.max(1);
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| mpsc::channel(capacity)).unzip();
        let peers: Arc<[mpsc::Sender<Envelope<M>>]> = senders.into();

        receivers
            .into_iter()
            .enumerate()
            .map(|(index, rx)| Self {
                rank: Rank::new(index),
                peers: Arc::clone(&peers),
                inbox: Mutex::new(Inbox {
                    rx,
                    stash: VecDeque::new(),
                }),
            })
            .collect()
    }

    /// A world of one manager plus `n_workers` workers.
    pub fn with_workers(n_workers: usize, capacity: usize) -> (Self, Vec<Self>) {
        let mut world = Self::world(n_workers + 1, capacity);
        let workers = world.split_off(1);
        // world has n_workers + 1 >= 1 endpoints, so index 0 is present
        let manager = world.remove(0);
        (manager, workers)
    }

    fn peer(&self, dest: Rank) -> Result<&mpsc::Sender<Envelope<M>>, CommError> {
        self.peers
            .get(dest.index())
            .ok_or(CommError::UnknownRank {
                rank: dest,
                size: self.peers.len(),
            })
    }

    fn envelope(&self, message: M) -> Envelope<M> {
        Envelope {
            source: self.rank,
            message,
        }
    }
}

#[async_trait]
impl<M: Send + 'static> Communicator<M> for InMemoryComm<M> {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    async fn send(&self, message: M, dest: Rank) -> Result<(), CommError> {
        let tx = self.peer(dest)?;
        tx.send(self.envelope(message))
            .await
            .map_err(|_| CommError::Disconnected { rank: dest })
    }

    fn isend(&self, message: M, dest: Rank) -> Result<SendRequest, CommError> {
        let tx = self.peer(dest)?;
        match tx.try_send(self.envelope(message)) {
            Ok(()) => Ok(SendRequest::completed(dest)),
            Err(TrySendError::Closed(_)) => Err(CommError::Disconnected { rank: dest }),
            Err(TrySendError::Full(envelope)) => {
                let tx = tx.clone();
                let (done_tx, done_rx) = oneshot::channel();
                tokio::spawn(async move {
                    let outcome = tx
                        .send(envelope)
                        .await
                        .map_err(|_| CommError::Disconnected { rank: dest });
                    // the request may have been dropped without waiting
                    let _ = done_tx.send(outcome);
                });
                Ok(SendRequest::pending(dest, done_rx))
            }
        }
    }

    async fn recv(&self, source: Source) -> Result<Envelope<M>, CommError> {
        let mut inbox = self.inbox.lock().await;

        if let Some(pos) = inbox.stash.iter().position(|env| source.matches(env.source))
            && let Some(envelope) = inbox.stash.remove(pos)
        {
            return Ok(envelope);
        }

        loop {
            let envelope = inbox
                .rx
                .recv()
                .await
                .ok_or(CommError::Disconnected { rank: self.rank })?;
            if source.matches(envelope.source) {
                return Ok(envelope);
            }
            inbox.stash.push_back(envelope);
        }
    }
}
