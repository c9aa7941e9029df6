//! Resilient push-channel client for the charging platform's live feeds.
//!
//! A [`PushChannel`] keeps one WebSocket connection to a push endpoint (pile
//! status changes, fault alerts) and hands every inbound message to the
//! registered listeners.
//!
//! # Architecture
//!
//! - [`transport`]: the [`Connector`] seam and the tokio-tungstenite implementation
//! - [`listeners`]: ordered listener registry with per-listener failure isolation
//! - [`supervisor`]: the single delayed-retry timer
//! - [`client`]: [`PushChannel`], its state machine and the outbound gate
//!
//! # Usage
//!
//! ```no_run
//! use evcharge_push::config::ChannelConfig;
//! use evcharge_push::types::{ClientRequest, PushMessage};
//! use evcharge_push::websocket::PushChannel;
//!
//! #[tokio::main]
//! async fn main() -> evcharge_push::Result<()> {
//!     let channel = PushChannel::with_tungstenite(ChannelConfig::new("ws://localhost:8080/ws/pile-status"))?;
//!
//!     channel.subscribe(|msg: &PushMessage| {
//!         if let PushMessage::FaultAlert { pile_no, fault_description, .. } = msg {
//!             println!("Fault on {}: {}", pile_no, fault_description);
//!         }
//!         Ok(())
//!     });
//!
//!     channel.connect();
//!     channel.send(&ClientRequest::Ping)?; // dropped unless already open
//!
//!     tokio::signal::ctrl_c().await?;
//!     channel.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Reconnection Behavior
//!
//! - Any handshake failure, read error or remote close schedules one retry
//! - Delay between retries: 3 seconds by default (see [`ChannelConfig`](crate::config::ChannelConfig))
//! - No attempt cap and no backoff growth
//! - A manual [`PushChannel::connect`] cancels a pending retry
//! - [`PushChannel::close`] cancels a pending retry and stops reconnecting
//!
//! # Message Handling
//!
//! Listeners run on the connection task, in registration order, once per
//! message. A listener returning an error or panicking does not stop the
//! others. Frames that are not valid JSON are logged and discarded.
//!
//! Connectivity is observable through [`PushChannel::state_receiver`].

pub mod client;
pub mod listeners;
pub mod supervisor;
pub mod transport;

pub use client::{ChannelState, PushChannel};
pub use listeners::{DeliveryOutcome, Listener, ListenerRegistry};
pub use supervisor::ReconnectSupervisor;
pub use transport::{Connector, Frame, FrameSink, FrameStream, TungsteniteConnector};
