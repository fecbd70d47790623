//! Inter-context broadcast channel (lane a)
//!
//! A [`ChannelHub`] hands out [`ChannelPort`]s on named channels. Every frame
//! posted on a port reaches every other port opened on the same name,
//! including ports owned by the same context, but never the posting port
//! itself.
//!
//! Frames are JSON-encoded [`Envelope`]s so the hub behaves like a real
//! cross-process transport would: receivers decode what they get and drop
//! what they cannot parse.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::ChannelError;
use crate::Envelope;
use crate::Result;
use crate::SyncMessage;

/// Factory for inter-context channel ports.
#[cfg_attr(test, automock)]
pub trait InterContextChannel: Send + Sync + 'static {
    /// Open a port on the channel called `name`.
    ///
    /// # Errors
    /// - [`ChannelError::HubClosed`] once the backing hub is shut down
    /// - [`ChannelError::InvalidName`] for blank names
    fn open(
        &self,
        name: &str,
    ) -> Result<Box<dyn ChannelPort>>;
}

/// One endpoint on a named channel.
#[cfg_attr(test, automock)]
pub trait ChannelPort: Send + Sync + 'static {
    /// Unique id of this port; used to filter out our own frames
    fn id(&self) -> u64;

    /// Post `message` to every other port on the channel.
    fn post(
        &self,
        message: &SyncMessage,
    ) -> Result<()>;

    /// A fresh receiver for frames posted by other ports.
    ///
    /// Returns `None` if the port cannot receive (closed, or send-only).
    fn receiver(&self) -> Option<PortReceiver>;

    /// Stop posting and receiving. Idempotent.
    fn close(&self);
}

/// What a port receiver yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(SyncMessage),
    /// The receiver fell behind and `n` frames were lost
    Lagged(u64),
}

/// Receiving half of a port.
#[derive(Debug)]
pub struct PortReceiver {
    port_id: u64,
    channel: String,
    rx: broadcast::Receiver<Arc<str>>,
}

impl PortReceiver {
    pub fn new(
        port_id: u64,
        channel: String,
        rx: broadcast::Receiver<Arc<str>>,
    ) -> Self {
        Self { port_id, channel, rx }
    }

    /// Next frame posted by another port, `None` once the channel is gone.
    ///
    /// Undecodable frames are logged and skipped.
    pub async fn recv(&mut self) -> Option<Inbound> {
        loop {
            match self.rx.recv().await {
                Ok(frame) => match Envelope::decode(&frame) {
                    Ok(envelope) if envelope.origin == self.port_id => continue,
                    Ok(envelope) => return Some(Inbound::Message(envelope.message)),
                    Err(e) => {
                        warn!(channel = %self.channel, error = %e, "Dropping undecodable frame");
                        continue;
                    }
                },
                Err(RecvError::Lagged(n)) => {
                    warn!(channel = %self.channel, skipped = n, "Port receiver lagged");
                    return Some(Inbound::Lagged(n));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

struct HubInner {
    /// One broadcast sender per channel name
    channels: DashMap<String, broadcast::Sender<Arc<str>>>,

    /// Buffered frames per channel before slow receivers start lagging
    capacity: usize,

    next_port_id: AtomicU64,

    closed: AtomicBool,
}

/// In-process inter-context channel hub.
///
/// Cloning is cheap and every clone refers to the same set of channels.
#[derive(Clone)]
pub struct ChannelHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for ChannelHub {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ChannelHub")
            .field("channels", &self.inner.channels.len())
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.inner.closed)
            .finish()
    }
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                channels: DashMap::new(),
                capacity: capacity.max(1),
                next_port_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Refuse new ports from now on. Existing ports keep working until closed.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.channels.clear();
        debug!("Channel hub shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of receivers currently attached to channel `name`
    pub fn receiver_count(
        &self,
        name: &str,
    ) -> usize {
        self.inner.channels.get(name).map(|tx| tx.receiver_count()).unwrap_or(0)
    }
}

impl InterContextChannel for ChannelHub {
    fn open(
        &self,
        name: &str,
    ) -> Result<Box<dyn ChannelPort>> {
        if self.is_shut_down() {
            return Err(ChannelError::HubClosed.into());
        }
        if name.trim().is_empty() {
            return Err(ChannelError::InvalidName(name.to_string()).into());
        }

        let sender = self
            .inner
            .channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .clone();
        let id = self.inner.next_port_id.fetch_add(1, Ordering::Relaxed);

        trace!(port_id = id, channel = %name, "Port opened");
        Ok(Box::new(HubPort {
            id,
            channel: name.to_string(),
            sender,
            closed: AtomicBool::new(false),
        }))
    }
}

struct HubPort {
    id: u64,
    channel: String,
    sender: broadcast::Sender<Arc<str>>,
    closed: AtomicBool,
}

impl ChannelPort for HubPort {
    fn id(&self) -> u64 {
        self.id
    }

    fn post(
        &self,
        message: &SyncMessage,
    ) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::PortClosed { port_id: self.id }.into());
        }

        let frame = Envelope {
            origin: self.id,
            message: message.clone(),
        }
        .encode()?;

        self.sender.send(Arc::from(frame)).map_err(|_| ChannelError::NoPeers {
            channel: self.channel.clone(),
        })?;
        Ok(())
    }

    fn receiver(&self) -> Option<PortReceiver> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        Some(PortReceiver::new(self.id, self.channel.clone(), self.sender.subscribe()))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            trace!(port_id = self.id, channel = %self.channel, "Port closed");
        }
    }
}
