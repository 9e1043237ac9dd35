//! Per-connection tasks.
//!
//! Each accepted WebSocket runs three tasks:
//!
//! - a reader (this task) that decodes frames and forwards them to the router
//! - a writer that drains the connection's bounded outbound queue
//! - a heartbeat that pings the client through the router's direct-message path
//!
//! The router holds the only long-lived sender for the outbound queue. When it
//! closes the connection (peer left, queue overflow, session teardown) the
//! sender is dropped and the writer exits after flushing what was queued.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use jobfair_core::{Environment, config::ConnectionConfig};
use jobfair_proto::{ClientMessage, Frame, ProtocolError, ServerMessage};
use tokio::{sync::mpsc, time};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::{
    driver::Registration,
    error::SessionError,
    registry::ConnectionId,
    router::RouterHandle,
    slot::SessionSlot,
    transport::WsConnection,
};

/// How long the writer may keep flushing after the reader stops.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve one upgraded connection until it closes.
pub async fn serve_connection<E: Environment>(
    ws: WsConnection,
    connection: ConnectionId,
    slot: Arc<SessionSlot<E>>,
    settings: ConnectionConfig,
) {
    let (sink, mut stream) = ws.split();
    let (tx, rx) = mpsc::channel(settings.outbound_queue_capacity.max(1));
    let mut writer = tokio::spawn(run_writer(connection, sink, rx));
    let cancel = CancellationToken::new();

    tracing::debug!(connection, "connection opened");

    let router = match handshake(connection, &mut stream, &slot, &tx, &cancel).await {
        Ok(Some(router)) => Some(router),
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(connection, error = %err, "handshake rejected");
            let _ = tx.try_send(ServerMessage::ConnectionRejected.into());
            None
        },
    };
    drop(tx);

    if let Some(router) = router {
        tokio::spawn(run_heartbeat(
            router.clone(),
            connection,
            settings.heartbeat_interval(),
            cancel.clone(),
        ));

        read_frames(connection, &mut stream, &router, &cancel).await;

        cancel.cancel();
        let _ = router.unregister(connection).await;
    }

    if time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        tracing::debug!(connection, "writer did not drain in time");
        writer.abort();
    }

    tracing::debug!(connection, "connection closed");
}

/// Wait for the first protocol message and register the connection with it.
///
/// Returns `Ok(None)` if the peer left before saying anything.
async fn handshake<E: Environment>(
    connection: ConnectionId,
    stream: &mut SplitStream<WsConnection>,
    slot: &SessionSlot<E>,
    outbound: &mpsc::Sender<Frame>,
    cancel: &CancellationToken,
) -> Result<Option<RouterHandle>, SessionError> {
    let message = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => break ClientMessage::decode(&text)?,
            Some(Ok(Message::Binary(_))) => {
                return Err(ProtocolError::Unsupported("binary frame").into());
            },
            Some(Ok(Message::Close(_)) | Err(_)) | None => return Ok(None),
            Some(Ok(_)) => {},
        }
    };

    match message {
        ClientMessage::CreateLobby => {
            let router = slot.create_lobby(connection, outbound.clone(), cancel.clone()).await?;
            Ok(Some(router))
        },
        ClientMessage::LobbyJoinAttempt { lobby_code, name } => {
            let router = slot.current().await?;
            router
                .register(
                    connection,
                    Registration::Participant { lobby_code, name },
                    outbound.clone(),
                    cancel.clone(),
                )
                .await?;
            Ok(Some(router))
        },
        other => Err(SessionError::UnexpectedMessage(other.message_type())),
    }
}

/// Forward frames to the router until the peer leaves or the router closes us.
async fn read_frames(
    connection: ConnectionId,
    stream: &mut SplitStream<WsConnection>,
    router: &RouterHandle,
    cancel: &CancellationToken,
) {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        let forwarded = match next {
            Some(Ok(Message::Text(text))) => match ClientMessage::decode(&text) {
                Ok(message) => router.inbound(connection, message).await,
                Err(err) => router.rejected(connection, err.to_string()).await,
            },
            Some(Ok(Message::Binary(_))) => {
                router.rejected(connection, ProtocolError::Unsupported("binary frame").to_string()).await
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => Ok(()),
            Some(Err(err)) => {
                tracing::debug!(connection, error = %err, "read failed");
                break;
            },
        };

        if forwarded.is_err() {
            break;
        }
    }
}

/// Drain the outbound queue into the socket.
async fn run_writer(
    connection: ConnectionId,
    mut sink: SplitSink<WsConnection, Message>,
    mut outbound: mpsc::Receiver<Frame>,
) {
    while let Some(frame) = outbound.recv().await {
        let message = match frame.to_text() {
            Ok(Some(text)) => Message::text(text),
            Ok(None) => Message::Ping(Bytes::new()),
            Err(err) => {
                tracing::error!(connection, error = %err, "failed to encode frame");
                continue;
            },
        };

        if let Err(err) = sink.send(message).await {
            tracing::debug!(connection, error = %err, "write failed");
            break;
        }
    }

    let _ = sink.close().await;
}

/// Ping the client every `interval` until cancelled.
///
/// Pongs are not tracked. The probes only keep intermediaries from reaping an
/// idle connection. A zero interval disables the heartbeat.
pub async fn run_heartbeat(
    router: RouterHandle,
    connection: ConnectionId,
    interval: Duration,
    cancel: CancellationToken,
) {
    if interval.is_zero() {
        return;
    }

    let mut ticks = time::interval_at(time::Instant::now() + interval, interval);

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                if router.direct_message(connection, Frame::Ping).await.is_err() {
                    return;
                }
            },
            () = cancel.cancelled() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use jobfair_core::GameConfig;
    use jobfair_harness::SimEnv;

    use super::*;
    use crate::router::Router;

    async fn hosted_router() -> (RouterHandle, mpsc::Receiver<Frame>) {
        let router = Router::spawn(SimEnv::with_seed(3), GameConfig::default());
        let (tx, mut rx) = mpsc::channel(16);
        router.register(1, Registration::Host, tx, CancellationToken::new()).await.unwrap();

        let welcome = rx.recv().await.unwrap();
        assert!(matches!(welcome, Frame::Message(ServerMessage::LobbyCode { .. })));
        (router, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_pings_through_router() {
        let (router, mut rx) = hosted_router().await;
        let cancel = CancellationToken::new();
        tokio::spawn(run_heartbeat(router, 1, Duration::from_secs(45), cancel.clone()));

        let start = time::Instant::now();
        assert_eq!(rx.recv().await, Some(Frame::Ping));
        assert!(start.elapsed() >= Duration::from_secs(45));

        assert_eq!(rx.recv().await, Some(Frame::Ping));
        assert!(start.elapsed() >= Duration::from_secs(90));

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_stops_when_cancelled() {
        let (router, mut rx) = hosted_router().await;
        let cancel = CancellationToken::new();
        let heartbeat =
            tokio::spawn(run_heartbeat(router, 1, Duration::from_secs(45), cancel.clone()));

        cancel.cancel();
        heartbeat.await.unwrap();

        time::sleep(Duration::from_secs(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_disables_heartbeat() {
        let (router, _rx) = hosted_router().await;

        let result = time::timeout(
            Duration::from_secs(1),
            run_heartbeat(router, 1, Duration::ZERO, CancellationToken::new()),
        )
        .await;

        assert!(result.is_ok());
    }
}
