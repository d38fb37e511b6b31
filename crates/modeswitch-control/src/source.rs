//! Mode sources and acknowledgment handles.
//!
//! A mode source delivers [`ModeUpdate`]s in the order they should take
//! effect. Each update carries an [`Ack`] that the controller fires exactly
//! once, after every tier action implied by the update has completed. The
//! source must not assume an update is in effect before that.

use std::fmt;

use async_trait::async_trait;
use modeswitch_core::Mode;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{ControlError, Result};

/// One-shot acknowledgment handle.
///
/// Firing consumes the handle, so a single update can never be acknowledged
/// twice.
pub struct Ack(AckInner);

enum AckInner {
    Callback(Box<dyn FnOnce() + Send>),
    Channel(oneshot::Sender<()>),
    Noop,
}

impl Ack {
    /// Acknowledge by running `f`.
    #[must_use]
    pub fn from_fn(f: impl FnOnce() + Send + 'static) -> Self {
        Self(AckInner::Callback(Box::new(f)))
    }

    /// Acknowledge through a oneshot channel; the receiver resolves when fired.
    #[must_use]
    pub fn channel(mode: Mode) -> (Self, AckReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self(AckInner::Channel(tx)), AckReceiver { mode, rx })
    }

    /// An acknowledgment nobody waits for.
    #[must_use]
    pub const fn noop() -> Self {
        Self(AckInner::Noop)
    }

    /// Signal that the update is fully in effect.
    pub fn ack(self) {
        match self.0 {
            AckInner::Callback(f) => f(),
            AckInner::Channel(tx) => {
                // The waiter may have given up; the mode is in effect regardless.
                let _ = tx.send(());
            }
            AckInner::Noop => {}
        }
    }
}

impl fmt::Debug for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.0 {
            AckInner::Callback(_) => "callback",
            AckInner::Channel(_) => "channel",
            AckInner::Noop => "noop",
        };
        f.debug_tuple("Ack").field(&kind).finish()
    }
}

/// Waits for the acknowledgment of one mode update.
#[derive(Debug)]
pub struct AckReceiver {
    mode: Mode,
    rx: oneshot::Receiver<()>,
}

impl AckReceiver {
    /// The mode this acknowledgment refers to.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Wait until the controller acknowledges the update.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AckDropped` if the update was discarded without
    /// acknowledgment, which happens when the controller shuts down first.
    pub async fn wait(self) -> Result<()> {
        self.rx.await.map_err(|_| ControlError::AckDropped(self.mode))
    }
}

/// A requested mode plus the handle used to confirm it took effect.
#[derive(Debug)]
pub struct ModeUpdate {
    target: Mode,
    ack: Ack,
}

impl ModeUpdate {
    /// Create an update with an explicit acknowledgment handle.
    #[must_use]
    pub const fn new(target: Mode, ack: Ack) -> Self {
        Self { target, ack }
    }

    /// Create an update acknowledged by running `f`.
    #[must_use]
    pub fn with_ack(target: Mode, f: impl FnOnce() + Send + 'static) -> Self {
        Self::new(target, Ack::from_fn(f))
    }

    /// The requested mode.
    #[must_use]
    pub const fn target(&self) -> Mode {
        self.target
    }

    /// Split into the requested mode and its acknowledgment handle.
    #[must_use]
    pub fn into_parts(self) -> (Mode, Ack) {
        (self.target, self.ack)
    }
}

/// Serial stream of mode updates consumed by the controller.
///
/// `next_update` is raced against cancellation, so implementations must be
/// cancel-safe: dropping the future before it resolves must not lose an
/// update.
#[async_trait]
pub trait ModeSource: Send {
    /// Wait for the next update. `None` means the source is exhausted.
    async fn next_update(&mut self) -> Option<ModeUpdate>;
}

#[async_trait]
impl ModeSource for mpsc::Receiver<ModeUpdate> {
    async fn next_update(&mut self) -> Option<ModeUpdate> {
        self.recv().await
    }
}

#[async_trait]
impl<S: ModeSource + ?Sized> ModeSource for Box<S> {
    async fn next_update(&mut self) -> Option<ModeUpdate> {
        (**self).next_update().await
    }
}

/// Create a channel-backed mode source and the sender that feeds it.
#[must_use]
pub fn channel(buffer: usize) -> (ModeSender, ChannelModeSource) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ModeSender { tx }, ChannelModeSource { rx })
}

/// Mode source fed by a [`ModeSender`].
#[derive(Debug)]
pub struct ChannelModeSource {
    rx: mpsc::Receiver<ModeUpdate>,
}

#[async_trait]
impl ModeSource for ChannelModeSource {
    async fn next_update(&mut self) -> Option<ModeUpdate> {
        self.rx.recv().await
    }
}

/// Handle used by whatever decides the cluster mode to push updates.
#[derive(Debug, Clone)]
pub struct ModeSender {
    tx: mpsc::Sender<ModeUpdate>,
}

impl ModeSender {
    /// Queue a prebuilt update.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::SourceClosed` if the controller has stopped.
    pub async fn send_update(&self, update: ModeUpdate) -> Result<()> {
        self.tx
            .send(update)
            .await
            .map_err(|_| ControlError::SourceClosed)
    }

    /// Request `mode` and return a receiver for its acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::SourceClosed` if the controller has stopped.
    pub async fn send(&self, mode: Mode) -> Result<AckReceiver> {
        let (ack, receiver) = Ack::channel(mode);
        self.send_update(ModeUpdate::new(mode, ack)).await?;
        debug!(mode = %mode, "Queued mode update");
        Ok(receiver)
    }

    /// Request `mode` and wait until it is fully in effect.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::SourceClosed` if the controller has stopped, or
    /// `ControlError::AckDropped` if it shut down before applying the update.
    pub async fn send_and_wait(&self, mode: Mode) -> Result<()> {
        self.send(mode).await?.wait().await
    }

    /// Whether the consuming controller has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Source that requests a single fixed mode and is then exhausted.
///
/// Useful for single-mode deployments where no control plane drives the
/// node. The update is acknowledged into the void.
#[derive(Debug, Clone)]
pub struct StaticModeSource {
    mode: Option<Mode>,
}

impl StaticModeSource {
    /// Create a source that yields `mode` once.
    #[must_use]
    pub const fn new(mode: Mode) -> Self {
        Self { mode: Some(mode) }
    }
}

#[async_trait]
impl ModeSource for StaticModeSource {
    async fn next_update(&mut self) -> Option<ModeUpdate> {
        self.mode
            .take()
            .map(|mode| ModeUpdate::new(mode, Ack::noop()))
    }
}
