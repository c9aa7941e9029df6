use crate::error::{PushError, Result};
use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use log::*;
use std::pin::Pin;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

/// One unit on the wire, reduced to what the channel cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
}

pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = PushError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// Opens the underlying bidirectional connection for a channel.
///
/// Returning `Ok` means the handshake completed and the channel may treat the
/// link as open. The stream ending, yielding an error or a [`Frame::Close`]
/// all count as the link going down.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream)>;
}

/// [`Connector`] backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream)> {
        info!("Connecting to WebSocket: {}", url);
        let (ws_stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| PushError::WebsocketError(format!("WebSocket connection failed: {}", e)))?;
        info!(
            "WebSocket connected successfully. Response: {:?}",
            response.status()
        );

        let (write, read) = ws_stream.split();

        // --- Writer ---
        let sink = write.with(|frame: Frame| {
            future::ready(Ok::<_, PushError>(match frame {
                Frame::Text(text) => Message::Text(text),
                Frame::Close => Message::Close(None),
            }))
        });

        // --- Reader ---
        // Pings are answered by tungstenite itself on the next read.
        let stream = read.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => {
                    trace!("Received WS Text: {}", text);
                    Some(Ok(Frame::Text(text)))
                }
                Ok(Message::Close(close_frame)) => {
                    warn!("Received WS Close frame: {:?}", close_frame);
                    Some(Ok(Frame::Close))
                }
                Ok(Message::Binary(bin)) => {
                    trace!("Ignoring WS Binary frame ({} bytes)", bin.len());
                    None
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
                Err(e) => Some(Err(PushError::from(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
