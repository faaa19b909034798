//! Communicator port - point-to-point message passing between ranks
//!
//! The farm only needs a handful of capabilities from its transport:
//! rank identity, world size, blocking send/recv, and a non-blocking send
//! whose completion can be awaited later.
//!
//! # 実装
//! - **InMemoryComm**: bounded tokio channels inside one process (`impls::inmem_comm`)

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::Rank;

/// CommError は transport 層のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommError {
    #[error("{rank} is outside a world of {size} ranks")]
    UnknownRank { rank: Rank, size: usize },

    #[error("inbox of {rank} is closed")]
    Disconnected { rank: Rank },

    #[error("send to {dest} was dropped before it completed")]
    SendDropped { dest: Rank },
}

/// Where a receive may take its message from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// First message from anyone.
    Any,
    /// Only messages from this rank; others stay queued.
    Rank(Rank),
}

impl Source {
    pub fn matches(&self, rank: Rank) -> bool {
        match self {
            Source::Any => true,
            Source::Rank(expected) => *expected == rank,
        }
    }
}

impl From<Rank> for Source {
    fn from(rank: Rank) -> Self {
        Source::Rank(rank)
    }
}

/// A received message together with the rank that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<M> {
    pub source: Rank,
    pub message: M,
}

enum RequestState {
    Pending(oneshot::Receiver<Result<(), CommError>>),
    Done(Result<(), CommError>),
}

/// Completion handle for a non-blocking send.
///
/// `wait()` resolves once the message has been handed to the destination.
/// Calling it again after that returns the same outcome immediately.
pub struct SendRequest {
    dest: Rank,
    state: RequestState,
}

impl SendRequest {
    /// A send that finished synchronously.
    pub fn completed(dest: Rank) -> Self {
        Self {
            dest,
            state: RequestState::Done(Ok(())),
        }
    }

    /// A send still in flight; the transport reports its outcome on `done`.
    pub fn pending(dest: Rank, done: oneshot::Receiver<Result<(), CommError>>) -> Self {
        Self {
            dest,
            state: RequestState::Pending(done),
        }
    }

    /// Non-blocking completion check.
    pub fn is_complete(&mut self) -> bool {
        let outcome = match &mut self.state {
            RequestState::Done(_) => return true,
            RequestState::Pending(done) => match done.try_recv() {
                Ok(outcome) => outcome,
                Err(oneshot::error::TryRecvError::Empty) => return false,
                Err(oneshot::error::TryRecvError::Closed) => {
                    Err(CommError::SendDropped { dest: self.dest })
                }
            },
        };
        self.state = RequestState::Done(outcome);
        true
    }

    /// Block until the send is confirmed.
    pub async fn wait(&mut self) -> Result<(), CommError> {
        let outcome = match &mut self.state {
            RequestState::Done(outcome) => return outcome.clone(),
            RequestState::Pending(done) => done
                .await
                .unwrap_or(Err(CommError::SendDropped { dest: self.dest })),
        };
        self.state = RequestState::Done(outcome.clone());
        outcome
    }
}

impl std::fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            RequestState::Pending(_) => "pending",
            RequestState::Done(Ok(())) => "done",
            RequestState::Done(Err(_)) => "failed",
        };
        f.debug_struct("SendRequest")
            .field("dest", &self.dest)
            .field("state", &state)
            .finish()
    }
}

/// Communicator は rank 間の point-to-point 通信
///
/// # 設計原則
/// - `recv(Source::Any)` は全送信元の共有受信箱から 1 件取り出す
/// - `isend` は待たずに `SendRequest` を返す（完了確認は `wait()`）
/// - 同じ宛先へのメッセージ順は保証しない（farm は 1 worker につき 1 件しか流さない）
#[async_trait]
pub trait Communicator<M: Send + 'static>: Send + Sync {
    /// This participant's rank.
    fn rank(&self) -> Rank;

    /// Number of participants, manager included.
    fn size(&self) -> usize;

    /// Send and wait until the destination has accepted the message.
    async fn send(&self, message: M, dest: Rank) -> Result<(), CommError>;

    /// Start a send without waiting for it.
    fn isend(&self, message: M, dest: Rank) -> Result<SendRequest, CommError>;

    /// Block until a message from `source` arrives.
    async fn recv(&self, source: Source) -> Result<Envelope<M>, CommError>;
}

#[async_trait]
impl<M: Send + 'static, T: Communicator<M> + ?Sized> Communicator<M> for Arc<T> {
    fn rank(&self) -> Rank {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    async fn send(&self, message: M, dest: Rank) -> Result<(), CommError> {
        (**self).send(message, dest).await
    }

    fn isend(&self, message: M, dest: Rank) -> Result<SendRequest, CommError> {
        (**self).isend(message, dest)
    }

    async fn recv(&self, source: Source) -> Result<Envelope<M>, CommError> {
        (**self).recv(source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_request_waits_immediately() {
        let mut req = SendRequest::completed(Rank::new(1));
        assert!(req.is_complete());
        assert_eq!(req.wait().await, Ok(()));
        assert_eq!(req.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn pending_request_resolves_once_signalled() {
        let (tx, rx) = oneshot::channel();
        let mut req = SendRequest::pending(Rank::new(2), rx);
        assert!(!req.is_complete());

        tx.send(Ok(())).unwrap();
        assert_eq!(req.wait().await, Ok(()));
        // idempotent
        assert_eq!(req.wait().await, Ok(()));
        assert!(req.is_complete());
    }

    #[tokio::test]
    async fn dropped_sender_is_reported() {
        let (tx, rx) = oneshot::channel::<Result<(), CommError>>();
        let mut req = SendRequest::pending(Rank::new(3), rx);
        drop(tx);
        assert_eq!(
            req.wait().await,
            Err(CommError::SendDropped { dest: Rank::new(3) })
        );
    }

    #[test]
    fn source_matching() {
        assert!(Source::Any.matches(Rank::new(5)));
        assert!(Source::from(Rank::new(1)).matches(Rank::new(1)));
        assert!(!Source::Rank(Rank::new(1)).matches(Rank::new(2)));
    }
}
