//! WebSocket relay.
//!
//! One task per connection. The request path picks the room, the server
//! assigns the user id, and every outbound frame goes through the user's
//! [`Outbox`] so that store calls never wait on a socket.

use crate::config::Config;
use crate::router::{self, Outlet};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use roomkeeper_core::{Message, RoomDirectory, User, UserId, UserProfile};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use uuid::Uuid;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

enum Outgoing {
    Frame(Arc<str>),
    Close,
}

/// Connection handle stored in the room directory.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Outlet for Outbox {
    fn send(&self, frame: Arc<str>) {
        // A closed receiver means the connection task is already tearing down.
        let _ = self.tx.send(Outgoing::Frame(frame));
    }

    fn close(&self) {
        let _ = self.tx.send(Outgoing::Close);
    }
}

pub type SharedDirectory = Arc<RoomDirectory<Outbox>>;

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

pub async fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let directory: SharedDirectory = Arc::new(RoomDirectory::new());

    let listener = TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("Listening on ws://{}", config.bind_addr());

    let mut connections = JoinSet::new();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        continue;
                    }
                };
                let directory = directory.clone();
                let config = config.clone();
                connections.spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, directory, config).await {
                        tracing::warn!("Connection error from {}: {}", addr, e);
                    }
                });
            }

            Some(_) = connections.join_next(), if !connections.is_empty() => {}

            _ = &mut shutdown => {
                tracing::info!("Shutting down, closing {} rooms", directory.room_count());
                close_all_rooms(&directory);
                break;
            }
        }
    }

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!("{} connections still open after grace period", connections.len());
    }
    Ok(())
}

/// Delete every room, telling each member's connection to close.
fn close_all_rooms(directory: &RoomDirectory<Outbox>) {
    for room_id in directory.list_room_ids() {
        directory.delete_room_with(room_id.as_str(), |user| user.handle.close());
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    directory: SharedDirectory,
    config: Arc<Config>,
) -> anyhow::Result<()> {
    let mut path = String::new();
    let ws = tokio_tungstenite::accept_hdr_async(stream, |request: &Request, response: Response| {
        path = request.uri().path().to_string();
        Ok::<_, ErrorResponse>(response)
    })
    .await?;
    let (mut sink, mut source) = ws.split();

    let room_id = config.room_for_path(&path);
    let user_id = UserId::new(Uuid::new_v4().to_string());
    let (tx, mut rx) = mpsc::unbounded_channel();

    tracing::info!(room = %room_id, user = %user_id, "{} connected", addr);

    let joined = router::join(
        &directory,
        &room_id,
        User::new(UserProfile::new(user_id.clone()), Outbox { tx }),
    );
    router::deliver(&directory, &room_id, joined);

    let result = serve(&mut sink, &mut source, &mut rx, &directory, &room_id, &user_id).await;

    let left = router::leave(&directory, &room_id, &user_id);
    router::deliver(&directory, &room_id, left);
    if !config.keep_empty_rooms && directory.delete_room_if_empty(&room_id) {
        tracing::info!(room = %room_id, "room closed");
    }

    tracing::info!(room = %room_id, user = %user_id, "{} disconnected", addr);
    result
}

async fn serve(
    sink: &mut WsSink,
    source: &mut WsSource,
    rx: &mut mpsc::UnboundedReceiver<Outgoing>,
    directory: &RoomDirectory<Outbox>,
    room_id: &str,
    user_id: &UserId,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            incoming = source.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    WsMessage::Text(text) => {
                        let out = match Message::decode(&text) {
                            Ok(message) => router::route(directory, room_id, user_id, message),
                            Err(e) => {
                                tracing::warn!(
                                    room = %room_id,
                                    user = %user_id,
                                    "Invalid message: {}",
                                    e
                                );
                                router::reject(user_id, &e)
                            }
                        };
                        router::deliver(directory, room_id, out);
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }

            outgoing = rx.recv() => match outgoing {
                Some(Outgoing::Frame(frame)) => {
                    sink.send(WsMessage::Text(frame.to_string().into())).await?;
                }
                Some(Outgoing::Close) | None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
    }
    Ok(())
}
