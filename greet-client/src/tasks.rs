use std::{fmt::Debug, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::{DuplexSession, SessionError, SessionReceiver, SessionSender};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Every request was sent and the outbound side half-closed
    Completed { sent: usize },
    /// Stopped early because the call finished before all requests went out
    Cancelled { sent: usize },
}

impl SendOutcome {
    pub fn sent(&self) -> usize {
        match self {
            SendOutcome::Completed { sent } | SendOutcome::Cancelled { sent } => *sent,
        }
    }
}

/// A sender that stopped on a failing send, with the number of requests that went out before
#[derive(Debug, thiserror::Error)]
#[error("Sending failed after {sent} requests")]
pub struct SendFailure {
    pub sent: usize,
    #[source]
    pub error: SessionError,
}

impl From<SendFailure> for SessionError {
    fn from(failure: SendFailure) -> Self {
        failure.error
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DuplexSummary {
    pub sent: SendOutcome,
    pub received: usize,
}

/// Send all requests in order, waiting `pacing` between two consecutive requests, then
/// half-close. The first failing send ends the task.
pub async fn send_all<T, I>(
    mut sender: SessionSender<T>,
    requests: I,
    pacing: Duration,
    cancel: CancellationToken,
) -> Result<SendOutcome, SendFailure>
where
    T: Debug,
    I: IntoIterator<Item = T>,
{
    let mut sent = 0;
    for request in requests {
        if sent > 0 {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(SendOutcome::Cancelled { sent }),
                _ = tokio::time::sleep(pacing) => (),
            }
        }

        info!("Sending request {:?}", request);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(SendOutcome::Cancelled { sent }),
            r = sender.send(request) => r.map_err(|error| SendFailure { sent, error })?,
        }
        sent += 1;
    }

    sender
        .close_send()
        .map_err(|error| SendFailure { sent, error })?;
    Ok(SendOutcome::Completed { sent })
}

/// Hand every response to `consumer` as it arrives until the remote ends the stream. Returns the
/// number of responses delivered.
pub async fn receive_all<T, F>(
    receiver: &mut SessionReceiver<T>,
    mut consumer: F,
) -> Result<usize, SessionError>
where
    F: FnMut(T),
{
    let mut received = 0;
    while let Some(response) = receiver.receive().await? {
        consumer(response);
        received += 1;
    }
    debug!("Inbound stream ended after {} responses", received);
    Ok(received)
}

/// Drive a bidirectional call to completion.
///
/// Requests are sent from a spawned task while responses are consumed on the calling task. The
/// call is done when the inbound side ends or fails; a sender still busy at that point is
/// cancelled and joined before returning.
pub async fn run_duplex<Req, Resp, I, F>(
    session: DuplexSession<Req, Resp>,
    requests: I,
    pacing: Duration,
    consumer: F,
) -> Result<DuplexSummary, SessionError>
where
    Req: Debug + Send + 'static,
    I: IntoIterator<Item = Req>,
    I::IntoIter: Send + 'static,
    F: FnMut(Resp),
{
    let (sender, mut receiver) = session.split();
    let cancel = CancellationToken::new();
    let sending = tokio::spawn(send_all(
        sender,
        requests.into_iter(),
        pacing,
        cancel.clone(),
    ));

    let received = receive_all(&mut receiver, consumer).await;

    cancel.cancel();
    let sent = sending.await.map_err(|e| match e.try_into_panic() {
        Ok(panic) => std::panic::resume_unwind(panic),
        Err(_) => SessionError::SenderAborted,
    });

    let received = received?;
    let sent = match sent? {
        Ok(sent) => sent,
        // The remote ended the call while requests were still going out
        Err(SendFailure {
            sent,
            error: SessionError::CallEnded,
        }) => SendOutcome::Cancelled { sent },
        Err(failure) => return Err(failure.into()),
    };
    if let SendOutcome::Cancelled { sent } = sent {
        warn!("Call ended by remote after {} requests were sent", sent);
    }

    Ok(DuplexSummary { sent, received })
}
