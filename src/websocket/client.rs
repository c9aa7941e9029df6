use super::listeners::{DeliveryOutcome, ListenerRegistry};
use super::supervisor::ReconnectSupervisor;
use super::transport::{Connector, Frame, TungsteniteConnector};
use crate::config::ChannelConfig;
use crate::error::Result;
use crate::types::PushMessage;
use futures_util::{SinkExt, StreamExt};
use log::*;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use url::Url;

// Upper bound on waiting for the close frame to go out before aborting the task.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a [`PushChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

// Everything that must change together under one lock.
struct Link {
    // Bumped on every attempt and on close; events tagged with an older value are stale.
    generation: u64,
    // Present only while Open.
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    task: Option<JoinHandle<()>>,
    supervisor: ReconnectSupervisor,
}

struct Shared {
    url: Url,
    connector: Arc<dyn Connector>,
    listeners: ListenerRegistry,
    state_tx: watch::Sender<ChannelState>,
    link: Mutex<Link>,
}

impl Shared {
    fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ChannelState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Push channel {}: {:?} -> {:?}", self.url, previous, state);
        }
    }

    fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts a connection attempt unless one is live. Caller holds the link lock.
    fn start_attempt(self: &Arc<Self>, link: &mut Link) {
        match self.state() {
            ChannelState::Disconnected => {}
            state => {
                debug!("Connect ignored: channel is {:?}.", state);
                return;
            }
        }

        // A manual connect supersedes any scheduled retry.
        link.supervisor.cancel();
        link.generation += 1;
        let generation = link.generation;
        self.set_state(ChannelState::Connecting);

        info!("Attempting connection to {} (generation {})...", self.url, generation);
        let shared = Arc::clone(self);
        link.task = Some(tokio::spawn(async move {
            shared.run_connection(generation).await;
        }));
    }

    async fn run_connection(self: Arc<Self>, generation: u64) {
        // --- Handshake ---
        let (mut sink, mut stream) = match self.connector.connect(&self.url).await {
            Ok(io) => io,
            Err(e) => {
                error!("Failed to establish connection to {}: {}", self.url, e);
                self.link_down(generation);
                return;
            }
        };

        // --- Publish the link ---
        // The outbound sender is what makes `send` deliver; it only exists while Open.
        let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
        {
            let mut link = self.lock_link();
            if link.generation != generation {
                debug!("Dropping connection from superseded attempt {}.", generation);
                return;
            }
            link.supervisor.cancel();
            link.outbound = Some(tx);
            self.set_state(ChannelState::Open);
        }
        info!("Connection to {} established.", self.url);

        // --- Reader/Writer Loop ---
        // Inbound frames go to the listeners; outbound frames come from `send` and `close`.
        let mut closed_locally = false;
        loop {
            tokio::select! {
                inbound = stream.next() => match inbound {
                    Some(Ok(Frame::Text(text))) => {
                        self.dispatch(&text);
                    }
                    Some(Ok(Frame::Close)) => {
                        warn!("Server closed the connection to {}.", self.url);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended (read None).");
                        break;
                    }
                },
                outbound = rx.recv() => match outbound {
                    Some(Frame::Close) => {
                        closed_locally = true;
                        if let Err(e) = sink.send(Frame::Close).await {
                            debug!("Close frame not delivered: {}", e);
                        }
                        break;
                    }
                    Some(frame) => {
                        trace!("Sending WS frame: {:?}", frame);
                        if let Err(e) = sink.send(frame).await {
                            error!("WebSocket send error: {}", e);
                            break;
                        }
                    }
                    // Sender dropped: the channel was torn down without a close frame.
                    None => {
                        closed_locally = true;
                        break;
                    }
                },
            }
        }

        // --- Teardown ---
        // A local close never schedules a retry; everything else hands over to the supervisor.
        info!("Connection task for generation {} finished.", generation);
        if !closed_locally {
            self.link_down(generation);
        }
    }

    /// Handles the transport going away on its own (handshake failure, error or remote close).
    fn link_down(self: &Arc<Self>, generation: u64) {
        let mut link = self.lock_link();
        if link.generation != generation || self.state() == ChannelState::Closing {
            debug!("Ignoring link-down from stale generation {}.", generation);
            return;
        }

        link.outbound = None;
        self.set_state(ChannelState::Disconnected);

        let weak: Weak<Self> = Arc::downgrade(self);
        link.supervisor.schedule(move |ticket| {
            if let Some(shared) = weak.upgrade() {
                shared.on_retry_timer(ticket);
            }
        });
    }

    fn on_retry_timer(self: &Arc<Self>, ticket: u64) {
        let mut link = self.lock_link();
        if !link.supervisor.complete(ticket) {
            return;
        }
        info!("Attempting to reconnect to {}...", self.url);
        self.start_attempt(&mut link);
    }

    fn dispatch(&self, text: &str) -> Vec<DeliveryOutcome> {
        let message = match PushMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding malformed frame ({}): {}", e, text);
                return Vec::new();
            }
        };
        if let PushMessage::Unknown(_) = message {
            debug!("Unrecognised push message type {:?}", message.message_type());
        }
        self.listeners.publish(&message)
    }
}

/// A push feed that stays connected.
///
/// After any transport failure a single retry is scheduled after the configured
/// delay, forever, until [`close`](Self::close) is called or the channel is dropped.
/// Outbound messages are best-effort: while the channel is not open they are
/// dropped without an error.
///
/// All operations must be called from within a tokio runtime.
pub struct PushChannel {
    shared: Arc<Shared>,
}

impl PushChannel {
    /// Creates a channel for `config.url`. Nothing is connected until [`connect`](Self::connect).
    pub fn new(config: ChannelConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let url = config.endpoint()?;
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        Ok(Self {
            shared: Arc::new(Shared {
                url,
                connector,
                listeners: ListenerRegistry::new(),
                state_tx,
                link: Mutex::new(Link {
                    generation: 0,
                    outbound: None,
                    task: None,
                    supervisor: ReconnectSupervisor::new(config.reconnect_delay),
                }),
            }),
        })
    }

    pub fn with_tungstenite(config: ChannelConfig) -> Result<Self> {
        Self::new(config, Arc::new(TungsteniteConnector))
    }

    pub fn url(&self) -> &Url {
        &self.shared.url
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    /// Receiver notified on every state transition.
    pub fn state_receiver(&self) -> watch::Receiver<ChannelState> {
        self.shared.state_tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Starts a connection attempt in the background.
    ///
    /// Does nothing while connecting, open or closing. Otherwise any pending
    /// retry timer is cancelled first.
    pub fn connect(&self) {
        let mut link = self.shared.lock_link();
        self.shared.start_attempt(&mut link);
    }

    /// Serializes `payload` to JSON and transmits it if the channel is open.
    ///
    /// When the channel is not open the message is dropped and `Ok(())` is
    /// returned. The only error is a payload that fails to serialize.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let text = serde_json::to_string(payload)?;
        let link = self.shared.lock_link();
        let state = self.shared.state();
        match (&link.outbound, state) {
            (Some(tx), ChannelState::Open) => {
                if tx.send(Frame::Text(text)).is_err() {
                    debug!("Connection task gone; dropping outbound message.");
                }
            }
            _ => debug!("Channel is {:?}; dropping outbound message.", state),
        }
        Ok(())
    }

    /// Registers a listener for every inbound message, after those already registered.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&PushMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(Arc::new(listener));
    }

    /// Tears the channel down and cancels any pending retry.
    ///
    /// Sends a close frame if open, aborts an in-flight handshake, and returns
    /// once the connection task is gone. The channel can be connected again afterwards.
    pub async fn close(&self) {
        info!("Closing push channel to {}...", self.shared.url);
        let task = {
            let mut link = self.shared.lock_link();
            if self.shared.state() == ChannelState::Closing {
                None
            } else {
                link.supervisor.cancel();
                link.generation += 1;
                self.shared.set_state(ChannelState::Closing);
                match link.outbound.take() {
                    Some(tx) => {
                        let _ = tx.send(Frame::Close);
                    }
                    None => {
                        if let Some(task) = &link.task {
                            task.abort();
                        }
                    }
                }
                Some(link.task.take())
            }
        };

        // Another close is already tearing down; wait for it instead of racing it.
        let Some(task) = task else {
            let mut state_rx = self.shared.state_tx.subscribe();
            let _ = state_rx
                .wait_for(|state| *state != ChannelState::Closing)
                .await;
            return;
        };

        if let Some(task) = task {
            wait_or_abort(task).await;
        }

        let _link = self.shared.lock_link();
        if self.shared.state() == ChannelState::Closing {
            self.shared.set_state(ChannelState::Disconnected);
        }
        info!("Push channel to {} closed.", self.shared.url);
    }
}

// Gives the connection task CLOSE_TIMEOUT to flush its close frame, then aborts it.
async fn wait_or_abort(mut task: JoinHandle<()>) {
    if timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
        warn!("Connection task did not finish within {:?}; aborting.", CLOSE_TIMEOUT);
        task.abort();
        let _ = task.await;
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        let mut link = self.shared.lock_link();
        link.supervisor.cancel();
        link.generation += 1;
        let task = link.task.take();
        match (link.outbound.take(), task) {
            // Let the close frame go out, but never leave the task waiting on a stuck peer.
            (Some(tx), Some(task)) => {
                let _ = tx.send(Frame::Close);
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn(wait_or_abort(task));
                    }
                    Err(_) => task.abort(),
                }
            }
            (_, Some(task)) => task.abort(),
            (_, None) => {}
        }
        self.shared.set_state(ChannelState::Disconnected);
    }
}
