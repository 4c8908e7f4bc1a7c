//! Credit-based producer/consumer endpoints
//!
//! The producer starts Blocked. Each `PULL` from the consumer makes it Ready
//! for exactly one `WRITE`, after which it is Blocked again until the next
//! grant. Extra grants while Ready are not accumulated. A consumer `ERROR`
//! moves the producer to Errored for good and releases the link.

use crate::channel::ChannelId;
use crate::message::ChannelMessage;
use bytes::Bytes;
use core_types::{FsError, FsResult};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, info, warn};
use std::task::Poll;
use std::time::{Duration, Instant};

const CLOSED_MESSAGE: &str = "Cannot write to a CLOSED channel";
const NO_CREDIT_MESSAGE: &str = "no credit available; the previous write has not been acknowledged";
const CREDIT_TIMEOUT_MESSAGE: &str = "timed out waiting for a credit grant";

/// State of a producer endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerState {
    /// No credit; the consumer has not asked for more yet
    Blocked,
    /// One credit available
    Ready,
    /// Closed or aborted by the producer
    Closed,
    /// The consumer failed, or its end disappeared
    Errored(FsError),
}

impl ProducerState {
    /// Closed and Errored are final: no further traffic is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProducerState::Closed | ProducerState::Errored(_))
    }
}

/// Event seen by the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerEvent {
    Chunk(Bytes),
    Closed,
    Aborted(String),
}

struct Link {
    outbound: Sender<ChannelMessage>,
    inbound: Receiver<ChannelMessage>,
}

/// Creates a connected producer/consumer pair
pub fn channel() -> (ProducerEndpoint, ConsumerEndpoint) {
    let id = ChannelId::new();
    let (to_consumer, from_producer) = unbounded();
    let (to_producer, from_consumer) = unbounded();

    let producer = ProducerEndpoint {
        id,
        link: Some(Link {
            outbound: to_consumer,
            inbound: from_consumer,
        }),
        state: ProducerState::Blocked,
        in_flight: 0,
        chunks_sent: 0,
    };
    let consumer = ConsumerEndpoint {
        id,
        outbound: to_producer,
        inbound: from_producer,
    };
    (producer, consumer)
}

/// Sending side of a channel
pub struct ProducerEndpoint {
    id: ChannelId,
    link: Option<Link>,
    state: ProducerState,
    in_flight: usize,
    chunks_sent: u64,
}

impl ProducerEndpoint {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn state(&self) -> &ProducerState {
        &self.state
    }

    /// Chunks sent and not yet acknowledged by a credit grant (0 or 1)
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    /// Waits for the first credit grant.
    pub fn start(&mut self) -> CreditWait<'_> {
        CreditWait { endpoint: self }
    }

    /// Transmits `chunk` and spends the current credit.
    ///
    /// The returned wait resolves on the next grant. Fails without touching
    /// the link when no credit is held, after close, or after a consumer
    /// error (with that error's reason).
    pub fn write(&mut self, chunk: Bytes) -> FsResult<CreditWait<'_>> {
        self.pump();
        match &self.state {
            ProducerState::Ready => {}
            ProducerState::Blocked => return Err(FsError::invalid_state(NO_CREDIT_MESSAGE)),
            ProducerState::Closed => return Err(FsError::invalid_state(CLOSED_MESSAGE)),
            ProducerState::Errored(err) => return Err(err.clone()),
        }

        let len = chunk.len();
        let sent = match &self.link {
            Some(link) => link.outbound.send(ChannelMessage::Write { chunk }).is_ok(),
            None => false,
        };
        if !sent {
            self.disconnected();
            return Err(FsError::EndpointGone);
        }

        self.state = ProducerState::Blocked;
        self.in_flight = 1;
        self.chunks_sent += 1;
        debug!(
            "event=channel_write channel={} bytes={} seq={}",
            self.id, len, self.chunks_sent
        );
        Ok(CreditWait { endpoint: self })
    }

    /// Sends `CLOSE` and releases the link.
    pub fn close(&mut self) -> FsResult<()> {
        self.pump();
        match &self.state {
            ProducerState::Closed => return Err(FsError::invalid_state(CLOSED_MESSAGE)),
            ProducerState::Errored(err) => return Err(err.clone()),
            ProducerState::Blocked | ProducerState::Ready => {}
        }

        if let Some(link) = self.link.take() {
            let _ = link.outbound.send(ChannelMessage::Close);
        }
        self.state = ProducerState::Closed;
        info!(
            "event=channel_close channel={} chunks={}",
            self.id, self.chunks_sent
        );
        Ok(())
    }

    /// Sends `ABORT{reason}` and releases the link.
    pub fn abort(&mut self, reason: &str) {
        if let Some(link) = self.link.take() {
            let _ = link.outbound.send(ChannelMessage::Abort {
                reason: reason.to_string(),
            });
            warn!("event=channel_abort channel={} reason={}", self.id, reason);
        }
        if !matches!(self.state, ProducerState::Errored(_)) {
            self.state = ProducerState::Closed;
        }
        self.in_flight = 0;
    }

    /// Applies every control message already queued, without blocking.
    fn pump(&mut self) {
        loop {
            let Some(link) = &self.link else {
                return;
            };
            match link.inbound.try_recv() {
                Ok(message) => self.handle(message),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected();
                    return;
                }
            }
        }
    }

    fn handle(&mut self, message: ChannelMessage) {
        match message {
            ChannelMessage::Pull => {
                if self.state == ProducerState::Blocked {
                    self.state = ProducerState::Ready;
                    self.in_flight = 0;
                    debug!("event=channel_credit channel={}", self.id);
                }
            }
            ChannelMessage::Error { reason } => {
                warn!(
                    "event=channel_consumer_error channel={} reason={}",
                    self.id, reason
                );
                self.state = ProducerState::Errored(FsError::Aborted(reason));
                self.in_flight = 0;
                self.link = None;
            }
            other => {
                warn!(
                    "event=channel_unexpected_message channel={} tag={}",
                    self.id,
                    other.tag()
                );
            }
        }
    }

    fn disconnected(&mut self) {
        self.link = None;
        if matches!(self.state, ProducerState::Blocked | ProducerState::Ready) {
            warn!("event=channel_consumer_gone channel={}", self.id);
            self.state = ProducerState::Errored(FsError::EndpointGone);
        }
    }

    fn resolution(&self) -> Poll<FsResult<()>> {
        match &self.state {
            ProducerState::Ready => Poll::Ready(Ok(())),
            ProducerState::Blocked => Poll::Pending,
            ProducerState::Closed => Poll::Ready(Err(FsError::invalid_state(CLOSED_MESSAGE))),
            ProducerState::Errored(err) => Poll::Ready(Err(err.clone())),
        }
    }
}

/// Pending credit grant
///
/// Resolves Ok when the consumer sends `PULL`, or with the consumer's reason
/// when it sends `ERROR`. It never resolves on its own: a consumer that
/// stays silent keeps it pending.
pub struct CreditWait<'a> {
    endpoint: &'a mut ProducerEndpoint,
}

impl CreditWait<'_> {
    /// Checks for a grant without blocking.
    pub fn poll(&mut self) -> Poll<FsResult<()>> {
        self.endpoint.pump();
        self.endpoint.resolution()
    }

    /// Blocks until the wait resolves.
    pub fn wait(self) -> FsResult<()> {
        loop {
            if let Poll::Ready(result) = self.endpoint.resolution() {
                return result;
            }
            let received = match &self.endpoint.link {
                Some(link) => link.inbound.recv().ok(),
                None => None,
            };
            match received {
                Some(message) => self.endpoint.handle(message),
                None => self.endpoint.disconnected(),
            }
        }
    }

    /// Blocks for at most `timeout`. On timeout the endpoint stays Blocked
    /// and can be waited on again.
    pub fn wait_timeout(self, timeout: Duration) -> FsResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Poll::Ready(result) = self.endpoint.resolution() {
                return result;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = match &self.endpoint.link {
                Some(link) => link.inbound.recv_timeout(remaining),
                None => Err(RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(message) => self.endpoint.handle(message),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(FsError::invalid_state(CREDIT_TIMEOUT_MESSAGE))
                }
                Err(RecvTimeoutError::Disconnected) => self.endpoint.disconnected(),
            }
        }
    }
}

/// Receiving side of a channel
pub struct ConsumerEndpoint {
    id: ChannelId,
    outbound: Sender<ChannelMessage>,
    inbound: Receiver<ChannelMessage>,
}

impl ConsumerEndpoint {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Grants the producer one credit.
    pub fn pull(&self) -> FsResult<()> {
        self.outbound
            .send(ChannelMessage::Pull)
            .map_err(|_| FsError::EndpointGone)
    }

    /// Fails the producer with `reason` and releases this end.
    pub fn error(self, reason: impl Into<String>) -> FsResult<()> {
        let reason = reason.into();
        debug!("event=channel_error_sent channel={} reason={}", self.id, reason);
        self.outbound
            .send(ChannelMessage::Error { reason })
            .map_err(|_| FsError::EndpointGone)
    }

    /// Blocks until the producer sends something.
    pub fn recv(&self) -> FsResult<ProducerEvent> {
        let message = self.inbound.recv().map_err(|_| FsError::EndpointGone)?;
        Self::decode(message)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> FsResult<Option<ProducerEvent>> {
        match self.inbound.recv_timeout(timeout) {
            Ok(message) => Self::decode(message).map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(FsError::EndpointGone),
        }
    }

    pub fn try_recv(&self) -> FsResult<Option<ProducerEvent>> {
        match self.inbound.try_recv() {
            Ok(message) => Self::decode(message).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(FsError::EndpointGone),
        }
    }

    fn decode(message: ChannelMessage) -> FsResult<ProducerEvent> {
        match message {
            ChannelMessage::Write { chunk } => Ok(ProducerEvent::Chunk(chunk)),
            ChannelMessage::Close => Ok(ProducerEvent::Closed),
            ChannelMessage::Abort { reason } => Ok(ProducerEvent::Aborted(reason)),
            other => Err(FsError::invalid_state(format!(
                "unexpected {} from producer",
                other.tag()
            ))),
        }
    }
}
