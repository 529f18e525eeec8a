use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use roomrec_core::ParticipantSink;
use roomrec_logging::EventSource;

use crate::packet::decode_message;

const JOINED_ADDRESS: &str = "/room/participant/joined";
const LEFT_ADDRESS: &str = "/room/participant/left";

/// How often the receive loop wakes up to check the shutdown flag.
const RECV_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum OscError {
    #[error("failed to bind OSC socket: {0}")]
    Bind(#[source] std::io::Error),
}

/// Listens for participant events on a local UDP port and forwards
/// them to a [`ParticipantSink`].
pub struct OscListener {
    socket: UdpSocket,
}

impl OscListener {
    /// Bind to `127.0.0.1:port`. The feed is loopback-only; remote
    /// hosts have no business steering the recorder.
    pub async fn bind(port: u16) -> Result<Self, OscError> {
        let socket = UdpSocket::bind(("127.0.0.1", port))
            .await
            .map_err(OscError::Bind)?;
        info!(port, "OSC listener bound");
        Ok(Self { socket })
    }

    pub fn local_port(&self) -> Option<u16> {
        self.socket.local_addr().ok().map(|addr| addr.port())
    }

    /// Receive datagrams until `shutdown` is set.
    ///
    /// Malformed datagrams and unknown addresses are dropped silently;
    /// a UDP port collects stray traffic and none of it should be able
    /// to disturb the monitor.
    pub async fn run(self, sink: Arc<dyn ParticipantSink>, shutdown: Arc<AtomicBool>) {
        let mut buf = [0u8; 2048];

        while !shutdown.load(Ordering::SeqCst) {
            let received =
                tokio::time::timeout(RECV_TIMEOUT, self.socket.recv_from(&mut buf)).await;
            let len = match received {
                Ok(Ok((len, _addr))) => len,
                Ok(Err(e)) => {
                    warn!(error = %e, "OSC receive failed, continuing");
                    continue;
                }
                Err(_) => continue,
            };

            let Some(message) = decode_message(&buf[..len]) else {
                debug!("Dropping undecodable datagram");
                continue;
            };

            let kind = match message.address.as_str() {
                JOINED_ADDRESS => Kind::Joined,
                LEFT_ADDRESS => Kind::Left,
                other => {
                    debug!(address = %other, "Ignoring unrelated OSC address");
                    continue;
                }
            };

            // Two args carry (display_name, id); a single arg is an id
            // from senders that omit the name.
            let (display_name, participant_id) = match message.args.as_slice() {
                [name, id] => (name.as_str(), id.as_str()),
                [id] => ("", id.as_str()),
                _ => {
                    debug!(address = %message.address, "Ignoring message without usable arguments");
                    continue;
                }
            };

            match kind {
                Kind::Joined => {
                    sink.participant_joined(display_name, participant_id, EventSource::Osc)
                        .await
                }
                Kind::Left => {
                    sink.participant_left(display_name, participant_id, EventSource::Osc)
                        .await
                }
            }
        }

        info!("OSC listener stopped");
    }
}

enum Kind {
    Joined,
    Left,
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        events: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl ParticipantSink for CapturingSink {
        async fn participant_joined(&self, name: &str, id: &str, _source: EventSource) {
            self.events.lock().unwrap().push((
                "joined".to_string(),
                name.to_string(),
                id.to_string(),
            ));
        }

        async fn participant_left(&self, name: &str, id: &str, _source: EventSource) {
            self.events.lock().unwrap().push((
                "left".to_string(),
                name.to_string(),
                id.to_string(),
            ));
        }
    }

    fn encode(address: &str, args: &[&str]) -> Vec<u8> {
        let mut buf = Vec::new();
        push_padded(&mut buf, address);
        let mut tags = String::from(",");
        for _ in args {
            tags.push('s');
        }
        push_padded(&mut buf, &tags);
        for arg in args {
            push_padded(&mut buf, arg);
        }
        buf
    }

    fn push_padded(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
    }

    async fn wait_for_events(sink: &CapturingSink, count: usize) {
        for _ in 0..200 {
            if sink.events.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} events, got {:?}", count, sink.events.lock().unwrap());
    }

    #[tokio::test]
    async fn test_forwards_joined_and_left_messages() {
        let listener = OscListener::bind(0).await.unwrap();
        let port = listener.local_port().unwrap();
        let sink = Arc::new(CapturingSink::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(listener.run(sink.clone(), shutdown.clone()));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(&encode(JOINED_ADDRESS, &["Alice", "usr_001"]), ("127.0.0.1", port))
            .await
            .unwrap();
        sender
            .send_to(&encode(LEFT_ADDRESS, &["usr_001"]), ("127.0.0.1", port))
            .await
            .unwrap();

        wait_for_events(&sink, 2).await;
        let events = sink.events.lock().unwrap().clone();
        assert_eq!(
            events[0],
            ("joined".to_string(), "Alice".to_string(), "usr_001".to_string())
        );
        assert_eq!(
            events[1],
            ("left".to_string(), String::new(), "usr_001".to_string())
        );

        shutdown.store(true, Ordering::SeqCst);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_ignores_unknown_addresses_and_garbage() {
        let listener = OscListener::bind(0).await.unwrap();
        let port = listener.local_port().unwrap();
        let sink = Arc::new(CapturingSink::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(listener.run(sink.clone(), shutdown.clone()));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(&encode("/avatar/parameters/x", &["1"]), ("127.0.0.1", port))
            .await
            .unwrap();
        sender
            .send_to(b"not osc at all", ("127.0.0.1", port))
            .await
            .unwrap();
        sender
            .send_to(&encode(JOINED_ADDRESS, &[]), ("127.0.0.1", port))
            .await
            .unwrap();
        // A valid message after the noise proves the loop survived it
        sender
            .send_to(&encode(JOINED_ADDRESS, &["Bob", "usr_002"]), ("127.0.0.1", port))
            .await
            .unwrap();

        wait_for_events(&sink, 1).await;
        let events = sink.events.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].2, "usr_002");

        shutdown.store(true, Ordering::SeqCst);
        task.await.unwrap();
    }
}
