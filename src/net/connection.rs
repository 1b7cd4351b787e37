//! Per-connection transport pump.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{info, warn};

use crate::game::{ClientMessage, GameTx, ServerMessage};

use super::protocol::{DISCONNECT_SENTINEL, MAX_INBOUND_FRAME_BYTES};

/// Pump one WebSocket connection in a single select loop: binary frames in
/// to the game channel, encoded frames out from the room. Oversized frames
/// are dropped here, before they cost the room anything. On close, error, or
/// the room dropping this peer's sender, the room gets the disconnect
/// sentinel so it purges the player.
pub async fn handle_connection(
    ws_stream: WebSocketStream<TcpStream>,
    conn_id: u64,
    game_tx: GameTx,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
) {
    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut frames_in: u64 = 0;

    loop {
        tokio::select! {
            incoming = ws_read.next() => {
                match incoming {
                    Some(Ok(Message::Binary(data))) => {
                        if data.len() > MAX_INBOUND_FRAME_BYTES {
                            warn!(
                                "Conn {conn_id}: dropping oversized frame ({} bytes)",
                                data.len()
                            );
                            continue;
                        }
                        frames_in += 1;
                        if game_tx
                            .send(ClientMessage {
                                conn_id,
                                data: data.to_vec(),
                            })
                            .is_err()
                        {
                            break; // room is gone
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary-only protocol; text/ping/pong ignored
                    Some(Err(e)) => {
                        warn!("Conn {conn_id}: read error: {e}");
                        break;
                    }
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        if ws_write
                            .send(Message::Binary(msg.data.into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    None => break, // room dropped this peer
                }
            }
        }
    }

    let _ = game_tx.send(ClientMessage {
        conn_id,
        data: vec![DISCONNECT_SENTINEL],
    });
    info!("Connection {conn_id} closed ({frames_in} frames in)");
}
