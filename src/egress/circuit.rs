//! Tor circuit lifecycle: age tracking and renewal over the control port.
//!
//! Renewal speaks the C-Tor control-port line protocol directly:
//! `AUTHENTICATE`, then `SIGNAL NEWNYM`, each answered with a `250` reply.
//! A failed renewal is logged and swallowed; it only skips the intended
//! rotation, never aborts the retry loop.

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Tracks the age of the current Tor circuit and renews it on demand.
pub struct CircuitController {
    /// Attempts made on the current circuit. Shared across concurrent
    /// acquisitions; a racing redundant renewal just resets it early,
    /// which is harmless.
    age: Mutex<u32>,
    max_age: u32,
    control_port: u16,
    settle: Duration,
}

impl CircuitController {
    pub fn new(control_port: u16, max_age: u32, settle: Duration) -> Self {
        Self {
            age: Mutex::new(0),
            max_age,
            control_port,
            settle,
        }
    }

    /// Record one attempt on the circuit and report whether it has aged
    /// out. Side-effecting: call at most once per attempt. Returns true at
    /// most once per `max_age` calls, resetting the counter when it does.
    pub fn should_renew(&self) -> bool {
        let mut age = self.age.lock().unwrap_or_else(|e| e.into_inner());
        *age += 1;
        if *age >= self.max_age {
            *age = 0;
            true
        } else {
            false
        }
    }

    /// Request a new circuit (new exit identity).
    ///
    /// The age counter resets unconditionally, even when the signal fails;
    /// otherwise a persistently unreachable control channel would trigger a
    /// renewal attempt on every single request. After a successful signal we
    /// wait a settle delay so the new circuit is actually established before
    /// the next network attempt.
    pub async fn renew(&self) -> bool {
        {
            let mut age = self.age.lock().unwrap_or_else(|e| e.into_inner());
            *age = 0;
        }

        match self.signal_newnym().await {
            Ok(()) => {
                info!("tor circuit renewed, new exit identity obtained");
                tokio::time::sleep(self.settle).await;
                true
            }
            Err(e) => {
                warn!("failed to renew tor circuit: {}", e);
                false
            }
        }
    }

    async fn signal_newnym(&self) -> io::Result<()> {
        let stream = TcpStream::connect(("127.0.0.1", self.control_port)).await?;
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"AUTHENTICATE\r\n").await?;
        expect_ok(lines.next_line().await?, "AUTHENTICATE")?;

        writer.write_all(b"SIGNAL NEWNYM\r\n").await?;
        expect_ok(lines.next_line().await?, "SIGNAL NEWNYM")?;

        writer.write_all(b"QUIT\r\n").await?;
        debug!(port = self.control_port, "NEWNYM signal accepted");
        Ok(())
    }
}

fn expect_ok(line: Option<String>, command: &str) -> io::Result<()> {
    match line {
        Some(reply) if reply.starts_with("250") => Ok(()),
        Some(reply) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} rejected by control port: {}", command, reply),
        )),
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("control port closed during {}", command),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::net::TcpListener;

    use super::*;

    /// Minimal control-port stand-in: answers every line with 250 and
    /// counts NEWNYM signals.
    async fn spawn_control_port(newnym_count: Arc<AtomicUsize>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let newnym_count = newnym_count.clone();
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.into_split();
                    let mut lines = BufReader::new(reader).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        if line.starts_with("QUIT") {
                            let _ = writer.write_all(b"250 closing connection\r\n").await;
                            break;
                        }
                        if line.contains("NEWNYM") {
                            newnym_count.fetch_add(1, Ordering::SeqCst);
                        }
                        if writer.write_all(b"250 OK\r\n").await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        port
    }

    #[test]
    fn should_renew_fires_once_per_max_age() {
        let controller = CircuitController::new(9051, 5, Duration::ZERO);

        for cycle in 0..3 {
            for call in 0..4 {
                assert!(
                    !controller.should_renew(),
                    "cycle {} call {} fired early",
                    cycle,
                    call
                );
            }
            assert!(controller.should_renew(), "cycle {} did not fire", cycle);
        }
    }

    #[tokio::test]
    async fn renew_signals_newnym_and_resets_age() {
        let count = Arc::new(AtomicUsize::new(0));
        let port = spawn_control_port(count.clone()).await;

        let controller = CircuitController::new(port, 3, Duration::ZERO);
        controller.should_renew();
        controller.should_renew();

        assert!(controller.renew().await);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Counter was reset: two more attempts still do not age out.
        assert!(!controller.should_renew());
        assert!(!controller.should_renew());
    }

    #[tokio::test]
    async fn renew_failure_still_resets_age() {
        // Nothing listens on this port; bind-then-drop to reserve a dead one.
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = dead.local_addr().unwrap().port();
        drop(dead);

        let controller = CircuitController::new(port, 3, Duration::ZERO);
        controller.should_renew();
        controller.should_renew();

        assert!(!controller.renew().await);

        assert!(!controller.should_renew());
        assert!(!controller.should_renew());
        assert!(controller.should_renew());
    }

    #[tokio::test]
    async fn renew_rejects_non_250_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (reader, mut writer) = stream.into_split();
                let mut lines = BufReader::new(reader).lines();
                if let Ok(Some(_)) = lines.next_line().await {
                    let _ = writer.write_all(b"515 Bad authentication\r\n").await;
                }
            }
        });

        let controller = CircuitController::new(port, 3, Duration::ZERO);
        assert!(!controller.renew().await);
    }
}
