//! Subscription gateway
//!
//! Subscriber-facing side of the hub: accepts WebSocket upgrades, pulls the
//! `rule` query parameter out of the request, compiles it, and registers the
//! connection as a subscriber. A bad rule completes the upgrade and then
//! closes with application close code 4001 carrying the compiler's error
//! text, so the client can tell a rejected rule from a transport failure.
//!
//! Each accepted subscriber runs one connection task: it forwards lines from
//! the delivery channel to the socket and watches for peer close. When the
//! registry drops the delivery sender (shutdown, or teardown after a failed
//! delivery) the task sends a normal-closure frame and exits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use percent_encoding::percent_decode_str;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use crate::registry::{Subscriber, SubscriberId, SubscriberRegistry};
use crate::rule::CompiledRule;

/// Application close code sent when the supplied rule fails to compile
pub const BAD_RULE_CLOSE_CODE: u16 = 4001;

/// Close reason sent with the normal-closure frame at teardown
const CLOSE_REASON_SHUTDOWN: &str = "server shutdown";

/// Deadline for the peer to answer a close frame after a rejected rule
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Subscriber-facing WebSocket listener
pub struct SubscriptionGateway {
    registry: Arc<SubscriberRegistry>,
    delivery_capacity: usize,
    tcp_nodelay: bool,
    connections: Mutex<JoinSet<()>>,
}

impl SubscriptionGateway {
    /// Create a gateway registering into the given registry
    pub fn new(registry: Arc<SubscriberRegistry>, delivery_capacity: usize, tcp_nodelay: bool) -> Self {
        Self {
            registry,
            delivery_capacity,
            tcp_nodelay,
            connections: Mutex::new(JoinSet::new()),
        }
    }

    /// Run the accept loop until `stop` flips
    pub async fn run(&self, listener: TcpListener, mut stop: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept subscriber connection");
                    }
                },
            }
        }
    }

    async fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::debug!(peer = %peer_addr, "New subscriber connection");

        if self.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let registry = Arc::clone(&self.registry);
        let capacity = self.delivery_capacity;

        let mut connections = self.connections.lock().await;

        // Reap tasks whose connections already finished, so the set tracks
        // live connections instead of growing for the process lifetime
        while connections.try_join_next().is_some() {}

        connections.spawn(subscribe(socket, peer_addr, registry, capacity));
    }

    /// Wait for every connection task to finish
    ///
    /// Called after the registry is drained; tasks exit once they have sent
    /// their normal-closure frame.
    pub async fn join_connections(&self) {
        let mut connections = self.connections.lock().await;
        while connections.join_next().await.is_some() {}
    }

    /// Abandon connection tasks whose close is still in flight
    pub async fn abort_connections(&self) {
        let mut connections = self.connections.lock().await;
        connections.abort_all();
        while connections.join_next().await.is_some() {}
    }
}

/// Run the subscribe handshake and, on success, the connection loop
async fn subscribe(
    socket: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<SubscriberRegistry>,
    capacity: usize,
) {
    let mut rule_expr: Option<String> = None;

    let mut ws = match accept_hdr_async(socket, |req: &Request, resp: Response| {
        rule_expr = rule_param(req.uri().query());
        Ok(resp)
    })
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(peer = %peer_addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    // A missing rule parameter compiles (and fails) as the empty expression
    let expr = rule_expr.unwrap_or_default();

    let rule = match CompiledRule::compile(&expr) {
        Ok(rule) => rule,
        Err(e) => {
            tracing::debug!(peer = %peer_addr, rule = %expr, error = %e, "Rejecting bad rule");
            let frame = CloseFrame {
                code: CloseCode::from(BAD_RULE_CLOSE_CODE),
                reason: e.to_string().into(),
            };
            if let Err(e) = ws.close(Some(frame)).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Close after bad rule failed");
            }
            // Drain until the close handshake completes, bounded so a
            // silent peer cannot pin this task
            let drained = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
                while let Some(Ok(_)) = ws.next().await {}
            })
            .await;
            if drained.is_err() {
                tracing::debug!(peer = %peer_addr, "Close handshake timed out");
            }
            return;
        }
    };

    let id = SubscriberId::new(peer_addr);
    let (tx, rx) = mpsc::channel(capacity);

    if let Err(e) = registry.add(Subscriber::new(id, rule, tx)).await {
        tracing::error!(subscriber = %id, error = %e, "Registration failed");
        let _ = ws.close(None).await;
        return;
    }

    tracing::debug!(subscriber = %id, rule = %expr, "Subscription active");
    connection_loop(ws, rx, &registry, id).await;
}

/// Forward delivered lines to the socket and watch for peer close
async fn connection_loop(
    ws: WebSocketStream<TcpStream>,
    mut rx: mpsc::Receiver<String>,
    registry: &SubscriberRegistry,
    id: SubscriberId,
) {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(line) => {
                    if let Err(e) = sink.send(Message::Text(line)).await {
                        tracing::debug!(subscriber = %id, error = %e, "Write failed");
                        registry.remove(id).await;
                        break;
                    }
                }
                // The registry dropped its sender: shutdown or teardown
                // after a delivery failure
                None => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: CLOSE_REASON_SHUTDOWN.into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    let _ = sink.flush().await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!(subscriber = %id, "Peer closed");
                    registry.remove(id).await;
                    break;
                }
                // Subscribers have no request channel; drain anything else
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(subscriber = %id, error = %e, "Read failed");
                    registry.remove(id).await;
                    break;
                }
            },
        }
    }

    tracing::debug!(subscriber = %id, "Subscription closed");
}

type Request = tokio_tungstenite::tungstenite::handshake::server::Request;
type Response = tokio_tungstenite::tungstenite::handshake::server::Response;

/// Extract and percent-decode the `rule` query parameter
fn rule_param(query: Option<&str>) -> Option<String> {
    let query = query?;

    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            if key == "rule" {
                return Some(percent_decode_str(value).decode_utf8_lossy().into_owned());
            }
        }
    }

    None
}
