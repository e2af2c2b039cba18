//! One client connection
//!
//! Reads request lines, runs them through the command registry with the
//! core locked, and writes the responses back. While idling the session
//! waits on its bus mailbox instead of the inactivity timeout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::SharedBus;
use crate::engine::SharedCore;
use crate::protocol::status::changed_response;
use crate::protocol::{greeting, CommandRegistry, Context, SessionState};

/// Longest request line accepted before the connection is dropped
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// What the session loop should do after handling one read
enum Flow {
    Continue,
    Close,
}

pub struct Session {
    peer: String,
    core: SharedCore,
    registry: Arc<CommandRegistry>,
    bus: SharedBus,
    password: Option<Arc<str>>,
    timeout: Duration,
    shutdown: CancellationToken,
}

impl Session {
    pub fn new(
        peer: impl Into<String>,
        core: SharedCore,
        registry: Arc<CommandRegistry>,
        bus: SharedBus,
        password: Option<Arc<str>>,
        timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            peer: peer.into(),
            core,
            registry,
            bus,
            password,
            timeout,
            shutdown,
        }
    }

    /// Serve the connection until the client leaves, times out or the server stops
    pub async fn run<S>(self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        let (id, mailbox) = self.bus.register();
        let mut state = SessionState::new(mailbox, self.password.is_none());
        info!("Session {} opened for {}", id, self.peer);

        let result = self.serve(&mut lines, &mut writer, &mut state).await;

        self.bus.unregister(id);
        info!("Session {} closed for {}", id, self.peer);
        result
    }

    async fn serve<R, W>(
        &self,
        lines: &mut FramedRead<R, LinesCodec>,
        writer: &mut W,
        state: &mut SessionState,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        write_lines(writer, &[greeting()]).await?;

        loop {
            let flow = if state.is_idle() {
                self.wait_idle(lines, writer, state).await?
            } else {
                tokio::select! {
                    _ = self.shutdown.cancelled() => Flow::Close,
                    read = tokio::time::timeout(self.timeout, lines.next()) => match read {
                        Ok(next) => match read_line(next, &self.peer) {
                            Some(line) => self.handle_line(&line, writer, state).await?,
                            None => Flow::Close,
                        },
                        Err(_) => {
                            debug!("{} timed out after {:?}", self.peer, self.timeout);
                            Flow::Close
                        }
                    },
                }
            };

            if let Flow::Close = flow {
                return Ok(());
            }
        }
    }

    /// Block until a subscribed change arrives or the client sends `noidle`
    async fn wait_idle<R, W>(
        &self,
        lines: &mut FramedRead<R, LinesCodec>,
        writer: &mut W,
        state: &mut SessionState,
    ) -> Result<Flow>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mailbox = state.mailbox.clone();
        tokio::select! {
            _ = self.shutdown.cancelled() => Ok(Flow::Close),
            _ = mailbox.notified() => {
                let changed = mailbox.take_matching(&state.subscriptions);
                if changed.is_empty() {
                    return Ok(Flow::Continue);
                }
                let mut response = changed_response(&changed).into_lines();
                response.push("OK".to_string());
                state.end_idle();
                write_lines(writer, &response).await?;
                Ok(Flow::Continue)
            }
            next = lines.next() => {
                let Some(line) = read_line(next, &self.peer) else {
                    return Ok(Flow::Close);
                };
                if line.trim() == "noidle" {
                    debug!("{} << noidle", self.peer);
                    state.end_idle();
                    write_lines(writer, &["OK".to_string()]).await?;
                    Ok(Flow::Continue)
                } else {
                    warn!("{} sent \"{}\" while idle, closing", self.peer, line.escape_debug());
                    Ok(Flow::Close)
                }
            }
        }
    }

    async fn handle_line<W>(&self, line: &str, writer: &mut W, state: &mut SessionState) -> Result<Flow>
    where
        W: AsyncWrite + Unpin,
    {
        debug!("{} << {}", self.peer, line.escape_debug());

        let response = {
            let mut core = self.core.lock().await;
            let mut ctx = Context {
                core: &mut *core,
                session: &mut *state,
                registry: &self.registry,
                password: self.password.as_deref(),
            };
            self.registry.handle_request(&mut ctx, line)
        };

        if let Some(last) = response.last() {
            debug!("{} >> {} lines, last {}", self.peer, response.len(), last);
        }
        write_lines(writer, &response).await?;

        if state.close_requested {
            return Ok(Flow::Close);
        }
        Ok(Flow::Continue)
    }
}

/// Unpack one framed read; `None` means the connection is done
fn read_line(next: Option<Result<String, LinesCodecError>>, peer: &str) -> Option<String> {
    match next {
        Some(Ok(line)) => Some(line),
        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
            warn!("{} sent a line over {} bytes, closing", peer, MAX_LINE_LENGTH);
            None
        }
        Some(Err(LinesCodecError::Io(e))) => {
            debug!("{} read failed: {}", peer, e);
            None
        }
        None => {
            debug!("{} disconnected", peer);
            None
        }
    }
}

async fn write_lines<W>(writer: &mut W, lines: &[String]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if lines.is_empty() {
        return Ok(());
    }
    let mut payload = lines.join("\n");
    payload.push('\n');
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryLibrary, MemoryPlaylists};
    use crate::adapters::simulated::SimulatedPlayer;
    use crate::adapters::LibraryRouter;
    use crate::bus::{create_bus, Subsystem};
    use crate::engine::Core;
    use crate::protocol::command_registry;
    use crate::protocol::testing::library_tracks;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, Lines};
    use tokio::task::JoinHandle;

    struct Client {
        lines: Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>,
        writer: tokio::io::WriteHalf<DuplexStream>,
        task: JoinHandle<Result<()>>,
    }

    impl Client {
        async fn send(&mut self, line: &str) {
            self.writer
                .write_all(format!("{}\n", line).as_bytes())
                .await
                .unwrap();
        }

        async fn read_line(&mut self) -> Option<String> {
            tokio::time::timeout(Duration::from_secs(2), self.lines.next_line())
                .await
                .expect("response within timeout")
                .unwrap()
        }

        /// Read lines up to and including the terminating OK or ACK
        async fn read_response(&mut self) -> Vec<String> {
            let mut response = Vec::new();
            while let Some(line) = self.read_line().await {
                let done = line == "OK" || line.starts_with("ACK ");
                response.push(line);
                if done {
                    break;
                }
            }
            response
        }
    }

    fn shared_core(bus: SharedBus) -> SharedCore {
        let (player, _finished) = SimulatedPlayer::new(CancellationToken::new());
        let mut library = LibraryRouter::new();
        library.add_provider(Arc::new(MemoryLibrary::new("local", library_tracks())));
        Core::new(
            Arc::new(player),
            library,
            Arc::new(MemoryPlaylists::new()),
            bus,
        )
        .into_shared()
    }

    async fn connect(
        core: SharedCore,
        bus: SharedBus,
        password: Option<&str>,
        timeout: Duration,
        shutdown: CancellationToken,
    ) -> Client {
        let (client, server) = tokio::io::duplex(MAX_LINE_LENGTH * 2);
        let session = Session::new(
            "test",
            core,
            Arc::new(command_registry().unwrap()),
            bus,
            password.map(Arc::from),
            timeout,
            shutdown,
        );
        let task = tokio::spawn(session.run(server));
        let (reader, writer) = tokio::io::split(client);
        let mut client = Client {
            lines: BufReader::new(reader).lines(),
            writer,
            task,
        };
        assert_eq!(client.read_line().await.unwrap(), "OK MPD 0.19.0");
        client
    }

    async fn client(bus: &SharedBus) -> Client {
        connect(
            shared_core(bus.clone()),
            bus.clone(),
            None,
            Duration::from_secs(60),
            CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_scripted_exchange() {
        let bus = create_bus();
        let stream = tokio_test::io::Builder::new()
            .write(b"OK MPD 0.19.0\n")
            .read(b"ping\n")
            .write(b"OK\n")
            .read(b"outputs\n")
            .write(b"outputid: 0\noutputname: Default output\noutputenabled: 1\nOK\n")
            .read(b"close\n")
            .build();
        scripted_session(&bus).run(stream).await.unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }

    fn scripted_session(bus: &SharedBus) -> Session {
        Session::new(
            "scripted",
            shared_core(bus.clone()),
            Arc::new(command_registry().unwrap()),
            bus.clone(),
            None,
            Duration::from_secs(60),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_crlf_line_endings() {
        let bus = create_bus();
        let stream = tokio_test::io::Builder::new()
            .write(b"OK MPD 0.19.0\n")
            .read(b"ping\r\n")
            .write(b"OK\n")
            .read(b"close\r\n")
            .build();
        scripted_session(&bus).run(stream).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_utf8_closes_silently() {
        let bus = create_bus();
        let stream = tokio_test::io::Builder::new()
            .write(b"OK MPD 0.19.0\n")
            .read(b"ping\n")
            .write(b"OK\n")
            .read(b"pi\xffng\n")
            .build();
        scripted_session(&bus).run(stream).await.unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_request_response() {
        let bus = create_bus();
        let mut client = client(&bus).await;
        client.send("ping").await;
        assert_eq!(client.read_response().await, vec!["OK"]);
        client.send("add \"local:track:1\"").await;
        assert_eq!(client.read_response().await, vec!["OK"]);
        client.send("paly").await;
        assert_eq!(
            client.read_response().await,
            vec![r#"ACK [5@0] {} unknown command "paly""#]
        );
    }

    #[tokio::test]
    async fn test_close_ends_session() {
        let bus = create_bus();
        let mut client = client(&bus).await;
        assert_eq!(bus.subscriber_count(), 1);
        client.send("close").await;
        assert_eq!(client.read_line().await, None);
        client.task.await.unwrap().unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_idle_wakes_on_publish() {
        let bus = create_bus();
        let mut client = client(&bus).await;
        client.send("idle player").await;
        tokio::task::yield_now().await;
        bus.publish(Subsystem::Mixer);
        bus.publish(Subsystem::Player);
        bus.publish(Subsystem::Player);
        assert_eq!(client.read_response().await, vec!["changed: player", "OK"]);

        // Mixer stayed pending and is reported straight away
        client.send("idle").await;
        assert_eq!(client.read_response().await, vec!["changed: mixer", "OK"]);
    }

    #[tokio::test]
    async fn test_noidle_cancels_idle() {
        let bus = create_bus();
        let mut client = client(&bus).await;
        client.send("idle").await;
        client.send("noidle").await;
        assert_eq!(client.read_response().await, vec!["OK"]);
        client.send("ping").await;
        assert_eq!(client.read_response().await, vec!["OK"]);
    }

    #[tokio::test]
    async fn test_other_command_while_idle_closes() {
        let bus = create_bus();
        let mut client = client(&bus).await;
        client.send("idle").await;
        client.send("status").await;
        assert_eq!(client.read_line().await, None);
    }

    #[tokio::test]
    async fn test_inactivity_timeout() {
        let bus = create_bus();
        let mut client = connect(
            shared_core(bus.clone()),
            bus.clone(),
            None,
            Duration::from_millis(50),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(client.read_line().await, None);
    }

    #[tokio::test]
    async fn test_idle_is_exempt_from_timeout() {
        let bus = create_bus();
        let mut client = connect(
            shared_core(bus.clone()),
            bus.clone(),
            None,
            Duration::from_millis(50),
            CancellationToken::new(),
        )
        .await;
        client.send("idle playlist").await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        bus.publish(Subsystem::Playlist);
        assert_eq!(client.read_response().await, vec!["changed: playlist", "OK"]);
    }

    #[tokio::test]
    async fn test_overlong_line_closes() {
        let bus = create_bus();
        let mut client = client(&bus).await;
        let line = "x".repeat(MAX_LINE_LENGTH + 1);
        client.send(&line).await;
        assert_eq!(client.read_line().await, None);
    }

    #[tokio::test]
    async fn test_password_gates_commands() {
        let bus = create_bus();
        let mut client = connect(
            shared_core(bus.clone()),
            bus.clone(),
            Some("secret"),
            Duration::from_secs(60),
            CancellationToken::new(),
        )
        .await;
        client.send("status").await;
        assert_eq!(
            client.read_response().await,
            vec![r#"ACK [4@0] {status} you don't have permission for "status""#]
        );
        client.send("password \"secret\"").await;
        assert_eq!(client.read_response().await, vec!["OK"]);
        client.send("status").await;
        assert_eq!(client.read_response().await.last().unwrap(), "OK");
    }

    #[tokio::test]
    async fn test_shutdown_closes_session() {
        let bus = create_bus();
        let shutdown = CancellationToken::new();
        let mut client = connect(
            shared_core(bus.clone()),
            bus.clone(),
            None,
            Duration::from_secs(60),
            shutdown.clone(),
        )
        .await;
        shutdown.cancel();
        assert_eq!(client.read_line().await, None);
    }
}
