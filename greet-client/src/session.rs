use std::fmt;

use futures::{stream::BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to open call: {0}")]
    Connection(tonic::Status),
    #[error("Transport failure: {0}")]
    Transport(tonic::Status),
    #[error("Call no longer accepts requests")]
    CallEnded,
    #[error("Outbound stream already closed")]
    StreamClosed,
    #[error("Inbound stream already finished")]
    Finished,
    #[error("Sender task was aborted")]
    SenderAborted,
}

impl SessionError {
    /// Classify the failure of a call that never got as far as streaming; tonic reports
    /// connection level failures as unavailable
    pub fn from_call(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::Unavailable => SessionError::Connection(status),
            _ => SessionError::Transport(status),
        }
    }
}

/// Outbound direction of a call
#[derive(Debug)]
pub struct SessionSender<T> {
    outbound: Option<mpsc::Sender<T>>,
}

impl<T> SessionSender<T> {
    pub fn new(outbound: mpsc::Sender<T>) -> Self {
        Self {
            outbound: Some(outbound),
        }
    }

    pub async fn send(&mut self, message: T) -> Result<(), SessionError> {
        let outbound = self.outbound.as_ref().ok_or(SessionError::StreamClosed)?;
        outbound
            .send(message)
            .await
            .map_err(|_| SessionError::CallEnded)
    }

    /// Half-close the call; the remote sees the end of the request stream once all queued
    /// messages are delivered. Only the first call succeeds.
    pub fn close_send(&mut self) -> Result<(), SessionError> {
        let outbound = self.outbound.take().ok_or(SessionError::StreamClosed)?;
        debug!("Closing outbound stream");
        drop(outbound);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundState {
    Open,
    Ended,
    Errored,
}

/// Inbound direction of a call
pub struct SessionReceiver<T> {
    inbound: BoxStream<'static, Result<T, SessionError>>,
    state: InboundState,
}

impl<T> SessionReceiver<T> {
    /// Receive from a response stream of an established call; every failure on it is a
    /// transport failure
    pub fn new<S>(inbound: S) -> Self
    where
        S: Stream<Item = Result<T, tonic::Status>> + Send + 'static,
    {
        Self::with_errors(inbound.map(|r| r.map_err(SessionError::Transport)))
    }

    pub fn with_errors<S>(inbound: S) -> Self
    where
        S: Stream<Item = Result<T, SessionError>> + Send + 'static,
    {
        Self {
            inbound: inbound.boxed(),
            state: InboundState::Open,
        }
    }

    /// Wait for the next message. `Ok(None)` marks the end of the stream; after that, or after
    /// an error, the stream is not polled again.
    pub async fn receive(&mut self) -> Result<Option<T>, SessionError> {
        if self.state != InboundState::Open {
            return Err(SessionError::Finished);
        }

        match self.inbound.next().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => {
                self.state = InboundState::Errored;
                Err(e)
            }
            None => {
                self.state = InboundState::Ended;
                Ok(None)
            }
        }
    }

    pub fn state(&self) -> InboundState {
        self.state
    }
}

impl<T> fmt::Debug for SessionReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionReceiver")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// One open call with independent outbound and inbound directions
#[derive(Debug)]
pub struct DuplexSession<Req, Resp> {
    sender: SessionSender<Req>,
    receiver: SessionReceiver<Resp>,
}

impl<Req, Resp> DuplexSession<Req, Resp> {
    pub fn new<S>(outbound: mpsc::Sender<Req>, inbound: S) -> Self
    where
        S: Stream<Item = Result<Resp, tonic::Status>> + Send + 'static,
    {
        Self {
            sender: SessionSender::new(outbound),
            receiver: SessionReceiver::new(inbound),
        }
    }

    pub fn with_errors<S>(outbound: mpsc::Sender<Req>, inbound: S) -> Self
    where
        S: Stream<Item = Result<Resp, SessionError>> + Send + 'static,
    {
        Self {
            sender: SessionSender::new(outbound),
            receiver: SessionReceiver::with_errors(inbound),
        }
    }

    /// Separate the two directions so they can be driven from different tasks
    pub fn split(self) -> (SessionSender<Req>, SessionReceiver<Resp>) {
        (self.sender, self.receiver)
    }

    pub async fn send(&mut self, message: Req) -> Result<(), SessionError> {
        self.sender.send(message).await
    }

    pub fn close_send(&mut self) -> Result<(), SessionError> {
        self.sender.close_send()
    }

    pub async fn receive(&mut self) -> Result<Option<Resp>, SessionError> {
        self.receiver.receive().await
    }

    /// A call is only complete once the inbound side has ended or failed
    pub fn is_complete(&self) -> bool {
        self.receiver.state() != InboundState::Open
    }
}
