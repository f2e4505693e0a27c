//! WebSocket upgrade handler and per-connection session loop

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::room::RoomCommand;
use crate::game::rules::Direction;
use crate::game::RoomError;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Outbound queue depth per connection; the room skips a client whose
/// queue is full rather than stalling the whole room
const OUTBOUND_QUEUE: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_QUEUE);

    // Writer task: outbound queue -> WebSocket
    let writer_conn_id = conn_id;
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %writer_conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = ConnectionRateLimiter::new();

    // Reader loop: WebSocket -> room commands / store lookups
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        handle_client_msg(&state, conn_id, &out_tx, client_msg).await;
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        send_error(&out_tx, "bad_message", "Malformed message").await;
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

    // Disconnect implies leaving the current room
    leave_current_room(&state, conn_id).await;
    writer_handle.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Dispatch one parsed client message
async fn handle_client_msg(
    state: &AppState,
    conn_id: Uuid,
    out_tx: &mpsc::Sender<ServerMsg>,
    msg: ClientMsg,
) {
    match msg {
        ClientMsg::CreateRoom { max_players } => {
            // Creating a room implicitly leaves the previous one
            leave_current_room(state, conn_id).await;

            match state.rooms.create_room(
                max_players,
                conn_id,
                out_tx.clone(),
                state.records.clone(),
            ) {
                Ok(info) => {
                    info!(conn_id = %conn_id, room = %info.room_code, "Room created");
                    let _ = out_tx
                        .send(ServerMsg::RoomCreated {
                            room_code: info.room_code,
                            max_players: info.max_players,
                        })
                        .await;
                }
                Err(e) => {
                    send_error(out_tx, e.code(), &e.to_string()).await;
                }
            }
        }

        ClientMsg::JoinRoom { room_code } => {
            leave_current_room(state, conn_id).await;

            let Some(handle) = state.rooms.get(&room_code) else {
                send_error(out_tx, RoomError::NotFound.code(), &RoomError::NotFound.to_string())
                    .await;
                return;
            };

            let (reply_tx, reply_rx) = oneshot::channel();
            let join = RoomCommand::Join {
                conn_id,
                tx: out_tx.clone(),
                reply: reply_tx,
            };

            // A closed command channel means the room shut down between
            // the lookup and the join
            if handle.cmd_tx.send(join).await.is_err() {
                send_error(out_tx, RoomError::NotFound.code(), &RoomError::NotFound.to_string())
                    .await;
                return;
            }

            match reply_rx.await {
                Ok(Ok(info)) => {
                    state.rooms.bind(conn_id, &info.room_code);
                    let _ = out_tx
                        .send(ServerMsg::JoinedRoom {
                            room_code: info.room_code,
                            max_players: info.max_players,
                        })
                        .await;
                }
                Ok(Err(e)) => {
                    send_error(out_tx, e.code(), &e.to_string()).await;
                }
                Err(_) => {
                    send_error(out_tx, RoomError::NotFound.code(), &RoomError::NotFound.to_string())
                        .await;
                }
            }
        }

        ClientMsg::SetUserInfo { username, avatar } => {
            if let Err(e) = state
                .records
                .set_identity(conn_id, username.clone(), avatar.clone())
                .await
            {
                warn!(conn_id = %conn_id, error = %e, "Failed to persist user info");
            }

            if let Some(handle) = state.rooms.room_for(&conn_id) {
                let _ = handle
                    .cmd_tx
                    .send(RoomCommand::SetUserInfo {
                        conn_id,
                        username,
                        avatar,
                    })
                    .await;
            }
        }

        ClientMsg::SendMessage { message } => {
            if let Some(handle) = state.rooms.room_for(&conn_id) {
                let _ = handle
                    .cmd_tx
                    .send(RoomCommand::Chat { conn_id, message })
                    .await;
            }
        }

        ClientMsg::MoveLeft => {
            forward_move(state, conn_id, Direction::Left).await;
        }

        ClientMsg::MoveRight => {
            forward_move(state, conn_id, Direction::Right).await;
        }

        ClientMsg::ResetGame => {
            if let Some(handle) = state.rooms.room_for(&conn_id) {
                let _ = handle.cmd_tx.send(RoomCommand::Reset).await;
            }
        }

        ClientMsg::GetLeaderboard => {
            let leaderboard = match state.records.top_by_wins(5).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(conn_id = %conn_id, error = %e, "Failed to fetch leaderboard");
                    Vec::new()
                }
            };
            let _ = out_tx.send(ServerMsg::Leaderboard { leaderboard }).await;
        }
    }
}

async fn forward_move(state: &AppState, conn_id: Uuid, direction: Direction) {
    if let Some(handle) = state.rooms.room_for(&conn_id) {
        let _ = handle
            .cmd_tx
            .send(RoomCommand::Move { conn_id, direction })
            .await;
    }
}

/// Leave whatever room the connection is bound to, if any
async fn leave_current_room(state: &AppState, conn_id: Uuid) {
    if let Some(code) = state.rooms.unbind(&conn_id) {
        if let Some(handle) = state.rooms.get(&code) {
            let _ = handle.cmd_tx.send(RoomCommand::Leave { conn_id }).await;
        }
    }
}

async fn send_error(out_tx: &mpsc::Sender<ServerMsg>, code: &str, message: &str) {
    let _ = out_tx
        .send(ServerMsg::Error {
            code: code.to_string(),
            message: message.to_string(),
        })
        .await;
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
