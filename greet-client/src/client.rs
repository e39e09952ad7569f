use std::{future::Future, time::Duration};

use futures::{stream, Stream, StreamExt};
use greet_protocol::{
    greet_service_client::GreetServiceClient, GreetEveryoneRequest, GreetEveryoneResponse,
    GreetManyTimesRequest, GreetManyTimesResponse, GreetRequest, Greeting, LongGreetRequest,
    LongGreetResponse,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};
use tracing::{info, warn};

use crate::{
    session::{DuplexSession, SessionError, SessionReceiver},
    tasks::{receive_all, run_duplex, send_all, DuplexSummary, SendFailure},
};

/// Requests queued on an outbound direction before `send` has to wait for the transport
const OUTBOUND_BUFFER: usize = 8;

#[derive(Debug, thiserror::Error)]
#[error("Could not connect to {uri}")]
pub struct ConnectError {
    uri: tonic::transport::Uri,
    #[source]
    source: tonic::transport::Error,
}

#[derive(Clone, Debug)]
pub struct GreetBuilder {
    uri: tonic::transport::Uri,
}

impl GreetBuilder {
    pub fn new(uri: tonic::transport::Uri) -> Self {
        Self { uri }
    }

    pub async fn connect(self) -> Result<Greet, ConnectError> {
        info!("Connecting to {}", self.uri);
        let endpoint = tonic::transport::Endpoint::from(self.uri.clone());
        let channel = endpoint.connect().await.map_err(|source| ConnectError {
            uri: self.uri,
            source,
        })?;
        Ok(Greet::new(channel))
    }
}

/// Start a call on its own task and tie its two directions into a session.
///
/// The call is dispatched right away so requests flow even while the remote holds back its
/// response headers; a call that cannot be started surfaces as the first inbound item. The
/// call task is aborted when the inbound side is dropped before the call got established.
fn open_session<Req, Resp, C, Fut, S>(call: C) -> DuplexSession<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    C: FnOnce(ReceiverStream<Req>) -> Fut,
    Fut: Future<Output = Result<S, tonic::Status>> + Send + 'static,
    S: Stream<Item = Result<Resp, tonic::Status>> + Send + 'static,
{
    let (outbound, requests) = mpsc::channel(OUTBOUND_BUFFER);
    let call = AbortOnDropHandle::new(tokio::spawn(call(ReceiverStream::new(requests))));

    let inbound = stream::once(call).flat_map(|joined| match joined {
        Ok(Ok(responses)) => responses
            .map(|r| r.map_err(SessionError::Transport))
            .boxed(),
        Ok(Err(status)) => stream::iter([Err(SessionError::from_call(status))]).boxed(),
        Err(e) => match e.try_into_panic() {
            Ok(panic) => std::panic::resume_unwind(panic),
            Err(_) => stream::iter([Err(SessionError::Transport(tonic::Status::cancelled(
                "Call task was cancelled",
            )))])
            .boxed(),
        },
    });

    DuplexSession::with_errors(outbound, inbound)
}

#[derive(Clone, Debug)]
pub struct Greet {
    client: GreetServiceClient<tonic::transport::Channel>,
}

impl Greet {
    pub fn new(channel: tonic::transport::Channel) -> Self {
        Self {
            client: GreetServiceClient::new(channel),
        }
    }

    /// Single request, single response
    pub async fn greet(&mut self, greeting: Greeting) -> Result<String, SessionError> {
        info!("Calling Greet for {}", greeting);
        let response = self
            .client
            .greet(GreetRequest::from(greeting))
            .await
            .map_err(SessionError::from_call)?;
        Ok(response.into_inner().result)
    }

    /// Single request, then every streamed response is handed to `consumer` until the server
    /// ends the stream. Returns the number of responses.
    pub async fn greet_many_times<F>(
        &mut self,
        greeting: Greeting,
        consumer: F,
    ) -> Result<usize, SessionError>
    where
        F: FnMut(GreetManyTimesResponse),
    {
        info!("Calling GreetManyTimes for {}", greeting);
        let responses = self
            .client
            .greet_many_times(GreetManyTimesRequest::from(greeting))
            .await
            .map_err(SessionError::from_call)?
            .into_inner();
        let mut receiver = SessionReceiver::new(responses);
        receive_all(&mut receiver, consumer).await
    }

    pub fn open_long_greet(&self) -> DuplexSession<LongGreetRequest, LongGreetResponse> {
        let mut client = self.client.clone();
        open_session(move |requests| async move {
            // The single response only exists once the whole call succeeded
            let response = client.long_greet(requests).await?.into_inner();
            Ok::<_, tonic::Status>(stream::iter([Ok(response)]))
        })
    }

    /// Stream all greetings with `pacing` between them, half-close and wait for the single
    /// aggregated response.
    pub async fn long_greet<I>(
        &mut self,
        greetings: I,
        pacing: Duration,
    ) -> Result<String, SessionError>
    where
        I: IntoIterator<Item = Greeting>,
    {
        let (sender, mut receiver) = self.open_long_greet().split();
        let sent = send_all(
            sender,
            greetings.into_iter().map(LongGreetRequest::from),
            pacing,
            CancellationToken::new(),
        )
        .await;

        // A failed send means the call is gone; its own status explains why
        let response = receiver.receive().await?;
        let response = response.ok_or_else(|| {
            SessionError::Transport(tonic::Status::internal(
                "LongGreet finished without a response",
            ))
        })?;
        match sent {
            Ok(_) => (),
            Err(SendFailure {
                sent,
                error: SessionError::CallEnded,
            }) => warn!("LongGreet answered after {} requests were sent", sent),
            Err(failure) => return Err(failure.into()),
        }
        Ok(response.result)
    }

    pub fn open_greet_everyone(
        &self,
    ) -> DuplexSession<GreetEveryoneRequest, GreetEveryoneResponse> {
        let mut client = self.client.clone();
        open_session(move |requests| async move {
            let responses = client.greet_everyone(requests).await?;
            Ok::<_, tonic::Status>(responses.into_inner())
        })
    }

    /// Stream all greetings with `pacing` between them while handing every response to
    /// `consumer`; returns once the server has ended the response stream.
    pub async fn greet_everyone<I, F>(
        &mut self,
        greetings: I,
        pacing: Duration,
        consumer: F,
    ) -> Result<DuplexSummary, SessionError>
    where
        I: IntoIterator<Item = Greeting>,
        I::IntoIter: Send + 'static,
        F: FnMut(GreetEveryoneResponse),
    {
        let session = self.open_greet_everyone();
        run_duplex(
            session,
            greetings.into_iter().map(GreetEveryoneRequest::from),
            pacing,
            consumer,
        )
        .await
    }
}
