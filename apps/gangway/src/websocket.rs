use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::handlers::AppState;
use crate::registry::RegistryError;

/// WebSocket upgrade handler for the viewer protocol.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_viewer(socket, app))
}

async fn refuse(mut sender: SplitSink<WebSocket, Message>, reason: &'static str) {
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code: close_code::AGAIN,
            reason: reason.into(),
        })))
        .await;
}

/// One viewer session, from accept to disconnect.
///
/// Outbound traffic flows through a per-viewer channel so a slow socket
/// only ever backs up its own sender task; the broadcast path never waits
/// on network I/O. Inbound, only complete text frames reach the serial
/// peer — binary and control frames are ignored in that direction.
async fn handle_viewer(socket: WebSocket, app: AppState) {
    let (mut sender, mut receiver) = socket.split();

    if !app.state.is_connected() {
        debug!("refusing viewer while link is down");
        refuse(sender, "link down").await;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let viewer_id = match app.registry.join(tx) {
        Ok(id) => id,
        Err(err @ RegistryError::SlotsFull(_)) => {
            debug!(error = %err, "refusing viewer");
            refuse(sender, "viewer slots exhausted").await;
            return;
        }
    };
    info!(viewer = %viewer_id, "viewer connected");

    // Channel → socket. The replay snapshot queued by join() goes out
    // first; the task ends when the viewer leaves or the registry evicts
    // this viewer and drops the sending half.
    let send_task = tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if sender.send(Message::Binary(chunk)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Err(err) = app.bridge.write_to_serial(text.as_bytes()) {
                    warn!(viewer = %viewer_id, error = %err, "failed to forward viewer input");
                }
            }
            Ok(Message::Binary(_)) | Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!(viewer = %viewer_id, "viewer sent close");
                break;
            }
            Err(err) => {
                debug!(viewer = %viewer_id, error = %err, "viewer socket error");
                break;
            }
        }
    }

    app.registry.leave(viewer_id);
    send_task.abort();
    info!(viewer = %viewer_id, "viewer disconnected");
}
