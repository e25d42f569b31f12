//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{InputAction, Intent, DEFAULT_WORLD};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Outbound frames buffered per connection before broadcasts start
/// dropping
const OUTBOUND_BUFFER: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // All replies and broadcasts funnel through one outbound queue so
    // a single writer owns the socket sink
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_BUFFER);

    let writer_conn_id = conn_id;
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %writer_conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = PlayerRateLimiter::new();

    // Reader loop: socket -> registry / intent queue
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle_client_msg(conn_id, msg, &state, &outbound_tx).await,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        send_error(&outbound_tx, format!("invalid message: {e}")).await;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Vacate the seat; the next roster sync removes the player from
    // their world
    state.clients.unregister(conn_id);
    writer_handle.abort();
    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Dispatch one parsed client message
pub(crate) async fn handle_client_msg(
    conn_id: Uuid,
    msg: ClientMsg,
    state: &AppState,
    outbound: &mpsc::Sender<ServerMsg>,
) {
    match msg {
        ClientMsg::Register { player_id, game_id } => {
            let world_id = game_id.unwrap_or_else(|| DEFAULT_WORLD.to_string());
            match state
                .clients
                .register(conn_id, player_id, world_id.clone(), outbound.clone())
            {
                Ok(()) => {
                    // Bring the world up so the next tick seats the player
                    state.worlds.get_or_create(&world_id);
                    let _ = outbound.send(ServerMsg::Registered { player_id }).await;
                }
                Err(e) => {
                    warn!(
                        conn_id = %conn_id,
                        player_id,
                        world_id = %world_id,
                        error = %e,
                        "Registration rejected"
                    );
                    send_error(outbound, e.to_string()).await;
                }
            }
        }

        ClientMsg::Input {
            player_id,
            action,
            payload,
        } => {
            // The world comes from the connection's seat, never from
            // the message
            let Some(world_id) = state.clients.world_of(conn_id) else {
                send_error(outbound, "register before sending input".to_string()).await;
                return;
            };
            match InputAction::parse(&action, payload.as_deref()) {
                Some(parsed) => state.intents.submit(Intent {
                    world_id,
                    player_id,
                    action: parsed,
                }),
                None => {
                    debug!(conn_id = %conn_id, action = %action, "Dropping unrecognized action");
                }
            }
        }

        ClientMsg::Ping => {
            let _ = outbound.send(ServerMsg::Pong { ts: unix_millis() }).await;
        }
    }
}

async fn send_error(outbound: &mpsc::Sender<ServerMsg>, message: String) {
    let _ = outbound.send(ServerMsg::Error { message }).await;
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
