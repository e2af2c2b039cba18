//! Test server and line client for protocol tests
//!
//! Starts a real `MpdServer` on an ephemeral port with a small in-memory
//! library, and talks to it over TCP the way an MPD client would.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use mpd_control::adapters::memory::{MemoryLibrary, MemoryPlaylists};
use mpd_control::adapters::playlist_files::JsonPlaylistStore;
use mpd_control::adapters::simulated::SimulatedPlayer;
use mpd_control::adapters::{LibraryRouter, PlaylistStore, Startable};
use mpd_control::bus::create_bus;
use mpd_control::engine::{spawn_end_of_track_listener, Core};
use mpd_control::models::{Album, Track};
use mpd_control::protocol::command_registry;
use mpd_control::server::{MpdServer, ServerSettings};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub fn library_tracks() -> Vec<Track> {
    let justice = Album {
        name: "...And Justice for All".into(),
        artists: vec!["Metallica".into()],
        num_tracks: Some(9),
    };
    vec![
        Track {
            track_no: Some(1),
            ..Track::new("local:track:1")
                .with_name("One")
                .with_artist("Metallica")
                .with_length(446_000)
                .with_album(justice.clone())
        },
        Track {
            track_no: Some(2),
            ..Track::new("local:track:2")
                .with_name("Blackened")
                .with_artist("Metallica")
                .with_length(401_000)
                .with_album(justice)
        },
        Track::new("local:track:3")
            .with_name("Aces High")
            .with_artist("Iron Maiden")
            .with_length(271_000),
    ]
}

pub struct ServerOptions<'a> {
    pub password: Option<&'a str>,
    pub max_connections: usize,
    pub connection_timeout: Duration,
    pub playlist_dir: Option<&'a Path>,
}

impl Default for ServerOptions<'_> {
    fn default() -> Self {
        Self {
            password: None,
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            playlist_dir: None,
        }
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    server: MpdServer,
    shutdown: CancellationToken,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServerOptions::default()).await
    }

    pub async fn start_with(options: ServerOptions<'_>) -> Self {
        let shutdown = CancellationToken::new();
        let bus = create_bus();

        let mut library = LibraryRouter::new();
        library.add_provider(Arc::new(MemoryLibrary::new("local", library_tracks())));
        let playlists: Arc<dyn PlaylistStore> = match options.playlist_dir {
            Some(dir) => Arc::new(JsonPlaylistStore::open(dir).unwrap()),
            None => Arc::new(MemoryPlaylists::new()),
        };

        let (player, finished) = SimulatedPlayer::new(shutdown.clone());
        let core = Core::new(Arc::new(player), library, playlists, bus.clone()).into_shared();
        spawn_end_of_track_listener(core.clone(), finished, shutdown.clone());

        let settings = ServerSettings {
            bind_address: "127.0.0.1:0".to_string(),
            password: options.password.map(Arc::from),
            max_connections: options.max_connections,
            connection_timeout: options.connection_timeout,
        };
        let server = MpdServer::new(
            settings,
            core,
            Arc::new(command_registry().unwrap()),
            bus,
            shutdown.clone(),
        );
        server.start().await.unwrap();
        let addr = server.local_addr().await.unwrap();

        Self {
            addr,
            server,
            shutdown,
        }
    }

    /// Connect and consume the greeting
    pub async fn connect(&self) -> Client {
        let mut client = Client::connect(self.addr).await;
        assert_eq!(client.read_line().await.as_deref(), Some("OK MPD 0.19.0"));
        client
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.server.stop().await;
    }
}

pub struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    pub async fn send(&mut self, request: &str) {
        self.writer
            .write_all(format!("{}\n", request).as_bytes())
            .await
            .unwrap();
    }

    /// Next line, or `None` once the server has closed the connection
    pub async fn read_line(&mut self) -> Option<String> {
        tokio::time::timeout(READ_TIMEOUT, self.lines.next_line())
            .await
            .expect("server answered in time")
            .unwrap_or(None)
    }

    /// Lines up to and including the terminating `OK` or `ACK`
    pub async fn read_response(&mut self) -> Vec<String> {
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

    pub async fn request(&mut self, request: &str) -> Vec<String> {
        self.send(request).await;
        self.read_response().await
    }

    /// Value of `key` in a `key: value` response
    pub async fn field(&mut self, request: &str, key: &str) -> Option<String> {
        let prefix = format!("{}: ", key);
        self.request(request)
            .await
            .into_iter()
            .find_map(|line| line.strip_prefix(&prefix).map(str::to_string))
    }
}
