//! Transport Adapter (C6).
//!
//! Upgrades incoming HTTP requests to WebSocket connections, assigns each
//! one a [`ConnectionId`], and runs its read/dispatch loop against the
//! shared [`MatchEngine`]. The registry here is keyed by `connection_id`,
//! not by any notion of authenticated user identity: a user who opens two
//! tabs simply gets two independent connections, each queued and matched
//! on its own.
//!
//! There is no heartbeat stream: a WebSocket already carries ping/pong at
//! the protocol level, and a dead TCP socket surfaces as a read error on
//! the next poll, which is all `disconnect` needs to fire.

use std::sync::LazyLock;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use salvo::prelude::*;
use salvo::websocket::{Message, WebSocket, WebSocketUpgrade};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::engine::MatchEngine;
use crate::error::AppError;
use crate::events::{InboundEvent, OutboundEvent};
use crate::id::ConnectionId;

/// Registry of live outbound channels, keyed by `connection_id`.
///
/// Mirrors the shape of a connection-command registry: a `DashMap` so
/// concurrent connections can register/unregister without contending on a
/// single lock, kept separate from the engine's own coarse mutex because
/// sending bytes on a socket has nothing to do with matching-state
/// atomicity.
pub struct TransportRegistry {
    senders: DashMap<ConnectionId, mpsc::Sender<OutboundEvent>>,
}

impl TransportRegistry {
    fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// The process-wide transport registry.
    pub fn global() -> &'static Self {
        static INSTANCE: LazyLock<TransportRegistry> = LazyLock::new(TransportRegistry::new);
        &INSTANCE
    }

    fn register(&self, connection_id: ConnectionId, tx: mpsc::Sender<OutboundEvent>) {
        self.senders.insert(connection_id, tx);
    }

    fn unregister(&self, connection_id: ConnectionId) {
        self.senders.remove(&connection_id);
    }

    /// Best-effort: if the connection's outbound queue is full, the event
    /// is simply dropped, there is no redelivery. If the connection is
    /// gone (its receiver dropped), that is treated as a disconnect on
    /// that connection: the Session Supervisor runs teardown and the
    /// resulting events are dispatched to whatever partner is affected.
    pub fn send(&self, connection_id: ConnectionId, event: OutboundEvent) {
        let result = self
            .senders
            .get(&connection_id)
            .map(|tx| tx.try_send(event));

        if let Some(Err(TrySendError::Closed(_))) = result {
            self.unregister(connection_id);
            let outbound = MatchEngine::global().disconnect(connection_id);
            self.dispatch(outbound);
        }
    }

    pub fn dispatch(&self, outbound: Vec<(ConnectionId, OutboundEvent)>) {
        for (connection_id, event) in outbound {
            self.send(connection_id, event);
        }
    }
}

const OUTBOUND_BUFFER: usize = 32;

fn origin_allowed(req: &Request) -> bool {
    let Some(allowed) = crate::config::get().allowed_origin.as_deref() else {
        return true;
    };
    req.headers()
        .get(salvo::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|origin| origin == allowed)
}

/// Websocket endpoint. Rejects handshakes from disallowed origins before
/// upgrading; every other inbound frame is handled inside the upgraded
/// connection loop.
#[handler]
pub async fn connect(req: &mut Request, res: &mut Response) -> Result<(), AppError> {
    if !origin_allowed(req) {
        let origin = req
            .headers()
            .get(salvo::http::header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        return Err(AppError::OriginRejected(origin));
    }

    WebSocketUpgrade::new()
        .upgrade(req, res, handle_connection)
        .await
        .map_err(AppError::from)
}

async fn handle_connection(ws: WebSocket) {
    let connection_id = ConnectionId::generate();
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::channel::<OutboundEvent>(OUTBOUND_BUFFER);
    TransportRegistry::global().register(connection_id, tx);
    tracing::info!(%connection_id, "connection accepted");

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_tx.send(Message::text(json)).await.is_err() {
                break;
            }
        }
    });

    let engine = MatchEngine::global();

    while let Some(frame) = ws_rx.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(err) => {
                tracing::debug!(%connection_id, error = %err, "read error, closing connection");
                break;
            }
        };

        if msg.is_close() {
            break;
        }
        if !msg.is_text() {
            continue;
        }
        let Ok(text) = msg.to_str() else {
            continue;
        };

        let event: InboundEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(%connection_id, error = %err, "dropping malformed event");
                continue;
            }
        };

        let outbound = engine.handle(connection_id, event, chrono::Utc::now());
        TransportRegistry::global().dispatch(outbound);
    }

    send_task.abort();
    TransportRegistry::global().unregister(connection_id);
    let outbound = engine.disconnect(connection_id);
    TransportRegistry::global().dispatch(outbound);
    tracing::info!(%connection_id, "connection closed");
}

/// Health check. Unauthenticated, unconditional, used by load balancers
/// and orchestrators to decide whether to keep routing traffic here.
#[handler]
pub async fn health(res: &mut Response) {
    res.render("alive");
}
