//! One framed connection, split into a receive task and a writer task.
//!
//! The receive task decodes frames into an unbounded inbox that the owner
//! drains at its own pace. Sends are synchronous: the frame is encoded on the
//! caller's thread and queued for the single writer task, so concurrent
//! producers never interleave frames and never wait on a slow peer.

use crate::codec::{self, FrameError};
use crate::protocol::Message;
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Messages decoded by a channel's receive task. Yields `None` once closed.
pub type Inbox = mpsc::UnboundedReceiver<Message>;

/// How long [`MessageChannel::shutdown`] waits for queued frames to drain.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel to {0} is closed")]
    Closed(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Queue endpoints shared by the channel and its tasks. Dropping both senders
/// is what closes the channel.
struct Endpoints {
    inbound: Option<mpsc::UnboundedSender<Message>>,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl Endpoints {
    fn shut(&mut self) {
        self.inbound = None;
        self.outbound = None;
    }
}

pub struct MessageChannel {
    peer: String,
    endpoints: Arc<Mutex<Endpoints>>,
    receiver: JoinHandle<()>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl MessageChannel {
    /// Starts the receive and writer tasks for `stream`. Must be called from
    /// inside a tokio runtime.
    pub fn open<S>(stream: S, peer: impl Into<String>) -> (Self, Inbox)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let peer = peer.into();
        let (reader, writer) = tokio::io::split(stream);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let endpoints = Arc::new(Mutex::new(Endpoints {
            inbound: Some(inbound_tx),
            outbound: Some(outbound_tx),
        }));

        let receiver = tokio::spawn(receive_loop(
            BufReader::new(reader),
            Arc::clone(&endpoints),
            peer.clone(),
        ));
        let writer = tokio::spawn(send_loop(
            writer,
            outbound_rx,
            Arc::clone(&endpoints),
            peer.clone(),
        ));

        let channel = MessageChannel {
            peer,
            endpoints,
            receiver,
            writer: Mutex::new(Some(writer)),
        };
        (channel, inbound_rx)
    }

    pub fn from_tcp(stream: TcpStream) -> (Self, Inbox) {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown peer".to_string());
        if let Err(e) = stream.set_nodelay(true) {
            debug!("{}: could not disable Nagle: {}", peer, e);
        }
        Self::open(stream, peer)
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.endpoints.lock().outbound.is_none()
    }

    /// Encodes `message` and queues it for the writer task. Never blocks.
    pub fn send(&self, message: &Message) -> Result<(), ChannelError> {
        let frame = codec::encode_message(message)?;

        let endpoints = self.endpoints.lock();
        let outbound = endpoints
            .outbound
            .as_ref()
            .ok_or_else(|| ChannelError::Closed(self.peer.clone()))?;
        outbound
            .send(frame)
            .map_err(|_| ChannelError::Closed(self.peer.clone()))?;

        trace!("{}: queued {}", self.peer, message.action());
        Ok(())
    }

    /// Stops receiving. Idempotent; once this returns the inbox gets nothing
    /// new. Frames already queued are still written.
    pub fn close(&self) {
        self.endpoints.lock().shut();
        self.receiver.abort();
    }

    /// Closes the channel and waits (bounded) for queued frames to be written.
    pub async fn shutdown(&self) {
        self.close();
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            if tokio::time::timeout(FLUSH_TIMEOUT, writer).await.is_err() {
                warn!("{}: gave up flushing outbound frames", self.peer);
            }
        }
    }
}

impl Drop for MessageChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn receive_loop<R>(mut reader: R, endpoints: Arc<Mutex<Endpoints>>, peer: String)
where
    R: AsyncRead + Unpin,
{
    loop {
        let message = match codec::read_frame(&mut reader).await {
            Ok(payload) => codec::decode_message(&payload),
            Err(e) => Err(e),
        };

        let message = match message {
            Ok(message) => message,
            Err(FrameError::ConnectionClosed) => {
                debug!("{}: connection closed", peer);
                break;
            }
            Err(e) if e.is_malformed() => {
                warn!("{}: dropping connection: {}", peer, e);
                break;
            }
            Err(e) => {
                error!("{}: receive failed: {}", peer, e);
                break;
            }
        };

        trace!("{}: received {}", peer, message.action());
        let guard = endpoints.lock();
        match guard.inbound.as_ref() {
            Some(inbound) if inbound.send(message).is_ok() => {}
            _ => return,
        }
    }

    endpoints.lock().shut();
}

async fn send_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    endpoints: Arc<Mutex<Endpoints>>,
    peer: String,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = codec::write_frame(&mut writer, &frame).await {
            match e {
                FrameError::ConnectionClosed => debug!("{}: peer went away while writing", peer),
                e => warn!("{}: write failed: {}", peer, e),
            }
            endpoints.lock().shut();
            return;
        }
    }

    let _ = writer.shutdown().await;
}
