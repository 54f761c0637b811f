// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Transport seam under the connection manager.
//!
//! The manager never touches a socket directly; it dials through a [`Dialer`]
//! and speaks to the resulting sink/stream halves. Production traffic runs
//! over WebSocket text frames ([`WsDialer`]); tests substitute scripted
//! in-memory halves.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
	connect_async,
	tungstenite::{client::IntoClientRequest, Message},
	MaybeTlsStream, WebSocketStream,
};
use tracing::debug;
use url::Url;

use crate::error::ConnError;

/// Write half of an established connection.
#[async_trait]
pub trait MessageSink: Send {
	async fn send_text(&mut self, text: String) -> Result<(), ConnError>;

	/// Graceful shutdown of the write half; best effort.
	async fn close(&mut self) -> Result<(), ConnError>;
}

/// Read half of an established connection.
#[async_trait]
pub trait MessageStream: Send {
	/// Next text payload, or `Ok(None)` once the peer has closed.
	async fn next_text(&mut self) -> Result<Option<String>, ConnError>;
}

/// Opens one connection to an endpoint, yielding independently usable halves.
#[async_trait]
pub trait Dialer: Send + Sync {
	async fn dial(
		&self,
		endpoint: &str,
	) -> Result<(Box<dyn MessageSink>, Box<dyn MessageStream>), ConnError>;
}

type WsTransport = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket dialer; `ws://` and `wss://` endpoints.
#[derive(Debug, Default)]
pub struct WsDialer;

#[async_trait]
impl Dialer for WsDialer {
	async fn dial(
		&self,
		endpoint: &str,
	) -> Result<(Box<dyn MessageSink>, Box<dyn MessageStream>), ConnError> {
		let url = Url::parse(endpoint).map_err(|e| ConnError::Endpoint(e.to_string()))?;
		let request = url
			.as_str()
			.into_client_request()
			.map_err(|e| ConnError::Endpoint(e.to_string()))?;

		let (ws, _) = connect_async(request)
			.await
			.map_err(|e| ConnError::Transport(e.to_string()))?;
		debug!(endpoint, "websocket established");

		let (write, read) = ws.split();
		Ok((Box::new(WsSink { write }), Box::new(WsStream { read })))
	}
}

struct WsSink {
	write: SplitSink<WsTransport, Message>,
}

#[async_trait]
impl MessageSink for WsSink {
	async fn send_text(&mut self, text: String) -> Result<(), ConnError> {
		self.write
			.send(Message::Text(text))
			.await
			.map_err(|e| ConnError::Transport(e.to_string()))
	}

	async fn close(&mut self) -> Result<(), ConnError> {
		self.write
			.close()
			.await
			.map_err(|e| ConnError::Transport(e.to_string()))
	}
}

struct WsStream {
	read: SplitStream<WsTransport>,
}

#[async_trait]
impl MessageStream for WsStream {
	async fn next_text(&mut self) -> Result<Option<String>, ConnError> {
		loop {
			match self.read.next().await {
				Some(Ok(Message::Text(text))) => return Ok(Some(text)),
				Some(Ok(Message::Close(_))) => return Ok(None),
				// Control and binary frames are not part of the protocol.
				Some(Ok(_)) => continue,
				Some(Err(e)) => return Err(ConnError::Transport(e.to_string())),
				None => return Ok(None),
			}
		}
	}
}
