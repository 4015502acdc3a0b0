//! Long-poll channel. Holds a GET open against the server so commands reach
//! the device as soon as they are issued, acknowledges them and passes them
//! on to the registered listeners.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::ack::AckSender;
use crate::config::RemoteConfig;
use crate::listener::{CommandListener, ListenerRegistry};
use crate::parser;
use crate::request::{Poll, RequestMetrics};
use crate::util::http::ClientError;
use crate::util::interrupt::Interrupt;
use crate::util::types::DeviceId;

/// Lifecycle of a [`LongPollChannel`]. A channel only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel is already running")]
    AlreadyRunning,

    #[error("channel has been closed")]
    Closed,
}

/// What one poll response amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cycle {
    /// The server released the poll without a payload
    NoData,
    /// A payload arrived but held no usable commands
    NoCommands,
    /// Commands were acknowledged and handed to `handled` listeners
    Dispatched { commands: usize, handled: usize },
}

struct Inner {
    state: ChannelState,
    task: Option<JoinHandle<()>>,
}

/// Background receiver of instant commands for one device.
///
/// Created idle. [`LongPollChannel::start`] spawns the poll loop on the
/// current tokio runtime, and it keeps polling through any error until
/// [`LongPollChannel::close`] is called or the channel is dropped.
pub struct LongPollChannel {
    poll: Arc<Poll>,
    acks: AckSender,
    listeners: Arc<ListenerRegistry>,
    interrupt: Interrupt,
    inner: Mutex<Inner>,
}

impl LongPollChannel {
    /// Create an idle channel polling on behalf of `device_id`.
    ///
    /// Received commands are acknowledged through `acks`.
    pub fn new(
        config: &RemoteConfig,
        device_id: impl Into<DeviceId>,
        acks: AckSender,
    ) -> Result<Self, ClientError> {
        let poll = Poll::new(
            config.api_endpoint.clone(),
            device_id.into(),
            config.request.poll_timeout_secs(),
        )?;

        Ok(Self {
            poll: Arc::new(poll),
            acks,
            listeners: Arc::new(ListenerRegistry::new()),
            interrupt: Interrupt::new(),
            inner: Mutex::new(Inner {
                state: ChannelState::Idle,
                task: None,
            }),
        })
    }

    pub fn device_id(&self) -> &DeviceId {
        self.poll.device_id()
    }

    pub fn state(&self) -> ChannelState {
        self.lock().state
    }

    /// Metrics for the poll requests made so far
    pub fn metrics(&self) -> RequestMetrics {
        self.poll.metrics()
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Register a listener. See [`ListenerRegistry::add`].
    pub fn add_listener(&self, listener: Arc<dyn CommandListener>) -> bool {
        self.listeners.add(listener)
    }

    /// Unregister a listener. See [`ListenerRegistry::remove`].
    pub fn remove_listener(&self, listener: &Arc<dyn CommandListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Start polling.
    ///
    /// Must be called from within a tokio runtime. A channel can only be
    /// started once.
    pub fn start(&self) -> Result<(), ChannelError> {
        let mut inner = self.lock();
        match inner.state {
            ChannelState::Running => return Err(ChannelError::AlreadyRunning),
            ChannelState::Stopped => return Err(ChannelError::Closed),
            ChannelState::Idle => {}
        }

        inner.task = Some(tokio::spawn(background_task(
            Arc::clone(&self.poll),
            self.acks.clone(),
            Arc::clone(&self.listeners),
            self.interrupt.clone(),
        )));
        inner.state = ChannelState::Running;
        Ok(())
    }

    /// Stop polling.
    ///
    /// An outstanding request is aborted. If a response was already in hand
    /// it is still processed before the loop exits. Closing more than once
    /// has no further effect.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.state != ChannelState::Stopped {
            debug!(device = %self.poll.device_id(), "closing channel");
            inner.state = ChannelState::Stopped;
        }
        self.interrupt.trigger();
    }

    /// Wait for the poll loop to exit. Returns immediately if the channel
    /// was never started or has already been waited on.
    pub async fn closed(&self) {
        let task = self.lock().task.take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!("poll task failed: {e}");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LongPollChannel {
    fn drop(&mut self) {
        self.interrupt.trigger();
    }
}

#[instrument(name = "poll", skip_all, fields(device = %poll.device_id()))]
async fn background_task(
    poll: Arc<Poll>,
    acks: AckSender,
    listeners: Arc<ListenerRegistry>,
    interrupt: Interrupt,
) {
    info!(timeout = poll.timeout_secs(), "waiting for commands");

    while !interrupt.is_triggered() {
        let response = tokio::select! {
            biased;

            response = poll.get() => response,
            _ = interrupt.wait() => {
                debug!("poll request aborted");
                break;
            }
        };

        match response {
            Ok(body) => {
                if let Cycle::Dispatched { commands, handled } =
                    handle_response(&body, &acks, &listeners).await
                {
                    debug!(commands, handled, "cycle complete");
                }
            }
            // try again right away, the server paces the loop
            Err(e) => warn!("poll failed: {e}"),
        }
    }

    info!("stopped");
}

/// Act on one poll response: acknowledge every command it carries, then
/// dispatch them.
pub(crate) async fn handle_response(
    body: &str,
    acks: &AckSender,
    listeners: &ListenerRegistry,
) -> Cycle {
    if body.chars().count() <= 1 {
        trace!("no data");
        return Cycle::NoData;
    }

    let commands = parser::parse(body);
    if commands.is_empty() {
        return Cycle::NoCommands;
    }

    debug!(count = commands.len(), "received commands");
    if let Err(e) = acks.ack_multiple_commands(&commands).await {
        error!("failed to acknowledge commands: {e}");
    }

    let handled = listeners.dispatch(&commands);
    Cycle::Dispatched {
        commands: commands.len(),
        handled,
    }
}
