//! Ingest listener
//!
//! Producer-facing side of the hub: a plain TCP listener where each
//! connection writes newline-terminated log lines. Every complete line is
//! handed to the broadcast engine exactly once, in the order it was read on
//! that connection; broadcast runs inline in the read loop so per-connection
//! ordering carries through to delivery.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::broadcast::BroadcastEngine;

/// Producer-facing line listener
pub struct IngestListener {
    engine: Arc<BroadcastEngine>,
    tcp_nodelay: bool,
    max_line_length: Option<usize>,
}

impl IngestListener {
    /// Create a listener feeding the given engine
    ///
    /// `max_line_length` caps accepted lines; `None` accepts lines of
    /// unbounded length.
    pub fn new(
        engine: Arc<BroadcastEngine>,
        tcp_nodelay: bool,
        max_line_length: Option<usize>,
    ) -> Self {
        Self {
            engine,
            tcp_nodelay,
            max_line_length,
        }
    }

    /// Run the accept loop until `stop` flips
    pub async fn run(&self, listener: TcpListener, mut stop: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr, stop.clone());
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept ingest connection");
                    }
                },
            }
        }
    }

    fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        stop: watch::Receiver<bool>,
    ) {
        tracing::debug!(peer = %peer_addr, "New ingest connection");

        if self.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let engine = Arc::clone(&self.engine);
        let max_line_length = self.max_line_length;

        tokio::spawn(async move {
            if let Err(e) = read_loop(socket, peer_addr, engine, stop, max_line_length).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Ingest read error");
            }

            tracing::debug!(peer = %peer_addr, "Ingest connection closed");
        });
    }
}

/// Read newline-terminated lines until peer close, read error, or stop
///
/// A failure here terminates only this connection; other producers and all
/// subscribers are unaffected.
async fn read_loop(
    socket: TcpStream,
    peer_addr: SocketAddr,
    engine: Arc<BroadcastEngine>,
    mut stop: watch::Receiver<bool>,
    max_line_length: Option<usize>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(socket);

    loop {
        tokio::select! {
            _ = stop.changed() => return Ok(()),
            next = next_line(&mut reader, max_line_length) => match next? {
                Some(line) => {
                    tracing::debug!(peer = %peer_addr, line = %line, "Received line");
                    engine.broadcast(&line).await;
                }
                None => return Ok(()),
            },
        }
    }
}

/// Read one newline-terminated line, enforcing the optional length cap
///
/// Returns `Ok(None)` at clean end of stream. The cap is checked as the
/// line accumulates, so an oversized line errors out without buffering it
/// whole.
async fn next_line(
    reader: &mut BufReader<TcpStream>,
    max_line_length: Option<usize>,
) -> std::io::Result<Option<String>> {
    let cap = max_line_length.unwrap_or(usize::MAX);
    let mut buf = Vec::new();

    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await?;

            if available.is_empty() {
                if buf.is_empty() {
                    return Ok(None);
                }
                // Trailing line without a newline before EOF
                (0, true)
            } else if let Some(pos) = available.iter().position(|&b| b == b'\n') {
                buf.extend_from_slice(&available[..pos]);
                (pos + 1, true)
            } else {
                buf.extend_from_slice(available);
                (available.len(), false)
            }
        };
        reader.consume(consumed);

        if buf.len() > cap {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "ingest line exceeds maximum length",
            ));
        }

        if done {
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            return Ok(Some(String::from_utf8_lossy(&buf).into_owned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;

    use crate::registry::{Subscriber, SubscriberId, SubscriberRegistry};
    use crate::rule::CompiledRule;

    use super::*;

    async fn spawn_listener(
        engine: Arc<BroadcastEngine>,
        max_line_length: Option<usize>,
    ) -> (SocketAddr, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);

        tokio::spawn(async move {
            IngestListener::new(engine, true, max_line_length)
                .run(listener, stop_rx)
                .await;
        });

        (addr, stop_tx)
    }

    fn subscriber(rule: &str) -> (Subscriber, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(32);
        let id = SubscriberId::new("127.0.0.1:4000".parse().unwrap());
        (Subscriber::new(id, CompiledRule::compile(rule).unwrap(), tx), rx)
    }

    #[tokio::test]
    async fn test_lines_reach_subscriber_in_order() {
        let registry = Arc::new(SubscriberRegistry::new());
        let engine = Arc::new(BroadcastEngine::new(
            Arc::clone(&registry),
            Duration::from_millis(100),
        ));
        let (addr, _stop) = spawn_listener(Arc::clone(&engine), None).await;

        let (sub, mut rx) = subscriber("!level=error@conn");
        registry.add(sub).await.unwrap();

        let mut producer = TcpStream::connect(addr).await.unwrap();
        for n in 0..3 {
            let line = format!("{{\"level\":\"error\",\"message\":\"conn {n}\"}}\n");
            producer.write_all(line.as_bytes()).await.unwrap();
        }
        producer.flush().await.unwrap();

        for n in 0..3 {
            let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(got.contains(&format!("conn</span> {n}")));
        }
    }

    #[tokio::test]
    async fn test_producer_close_is_isolated() {
        let registry = Arc::new(SubscriberRegistry::new());
        let engine = Arc::new(BroadcastEngine::new(
            Arc::clone(&registry),
            Duration::from_millis(100),
        ));
        let (addr, _stop) = spawn_listener(Arc::clone(&engine), None).await;

        let (sub, mut rx) = subscriber("!level=error@conn");
        registry.add(sub).await.unwrap();

        // First producer writes one line and disconnects mid-stream
        let mut first = TcpStream::connect(addr).await.unwrap();
        first
            .write_all(b"{\"level\":\"error\",\"message\":\"conn one\"}\n")
            .await
            .unwrap();
        drop(first);

        // A second producer still works and the subscriber is still live
        let mut second = TcpStream::connect(addr).await.unwrap();
        second
            .write_all(b"{\"level\":\"error\",\"message\":\"conn two\"}\n")
            .await
            .unwrap();

        // No ordering guarantee across connections; both lines must arrive
        let mut got = Vec::new();
        for _ in 0..2 {
            got.push(
                tokio::time::timeout(Duration::from_secs(2), rx.recv())
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        assert!(got.iter().any(|l| l.contains("one")));
        assert!(got.iter().any(|l| l.contains("two")));
    }

    #[tokio::test]
    async fn test_oversized_line_terminates_only_its_connection() {
        use tokio::io::AsyncReadExt;

        let registry = Arc::new(SubscriberRegistry::new());
        let engine = Arc::new(BroadcastEngine::new(
            Arc::clone(&registry),
            Duration::from_millis(100),
        ));
        let (addr, _stop) = spawn_listener(Arc::clone(&engine), Some(128)).await;

        let (sub, mut rx) = subscriber("!level=error@conn");
        registry.add(sub).await.unwrap();

        // A line past the cap gets the connection dropped by the server
        let mut offender = TcpStream::connect(addr).await.unwrap();
        let big = format!(
            "{{\"level\":\"error\",\"message\":\"conn {}\"}}\n",
            "x".repeat(1024)
        );
        offender.write_all(big.as_bytes()).await.unwrap();

        // The server drops the connection: either clean EOF or a reset,
        // depending on how much of the line it had consumed
        let mut buf = [0u8; 16];
        let read = tokio::time::timeout(Duration::from_secs(2), offender.read(&mut buf))
            .await
            .unwrap();
        match read {
            Ok(0) | Err(_) => {}
            Ok(n) => panic!("expected the connection to close, read {n} bytes"),
        }

        // Nothing from the oversized line was broadcast
        assert!(rx.try_recv().is_err());

        // Other producers are unaffected
        let mut producer = TcpStream::connect(addr).await.unwrap();
        producer
            .write_all(b"{\"level\":\"error\",\"message\":\"conn ok\"}\n")
            .await
            .unwrap();

        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(got.contains("ok"));
    }

    #[tokio::test]
    async fn test_uncapped_long_line_is_accepted() {
        let registry = Arc::new(SubscriberRegistry::new());
        let engine = Arc::new(BroadcastEngine::new(
            Arc::clone(&registry),
            Duration::from_millis(100),
        ));
        let (addr, _stop) = spawn_listener(Arc::clone(&engine), None).await;

        let (sub, mut rx) = subscriber("!level=error@conn");
        registry.add(sub).await.unwrap();

        // Well past any internal buffer size
        let mut producer = TcpStream::connect(addr).await.unwrap();
        let line = format!(
            "{{\"level\":\"error\",\"message\":\"conn {}\"}}\n",
            "y".repeat(64 * 1024)
        );
        producer.write_all(line.as_bytes()).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(got.len() > 64 * 1024);
    }
}
