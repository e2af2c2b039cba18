//! Shared playback core
//!
//! Tracklist, playback state and collaborators live behind one mutex so that
//! a mutation, its version bump and its bus event happen together.

pub mod playback;
pub mod tracklist;

pub use playback::{Playback, PlaybackError, PlaybackState};
pub use tracklist::{Tracklist, TracklistError};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapters::{AudioPlayer, LibraryRouter, PlaylistStore, TrackFinished};
use crate::bus::{SharedBus, Subsystem};
use crate::models::{TlTrack, Tlid, Track};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Tracklist(#[from] TracklistError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Name of the single audio output
pub const OUTPUT_NAME: &str = "Default output";

pub struct Core {
    pub tracklist: Tracklist,
    pub playback: Playback,
    pub library: LibraryRouter,
    pub playlists: Arc<dyn PlaylistStore>,
    volume: u8,
    output_enabled: bool,
    started_at: Instant,
    bus: SharedBus,
}

/// Core shared between sessions
pub type SharedCore = Arc<Mutex<Core>>;

impl Core {
    pub fn new(
        audio: Arc<dyn AudioPlayer>,
        library: LibraryRouter,
        playlists: Arc<dyn PlaylistStore>,
        bus: SharedBus,
    ) -> Self {
        Self::from_parts(
            Tracklist::new(bus.clone()),
            Playback::new(audio, bus.clone()),
            library,
            playlists,
            bus,
        )
    }

    /// Assemble from prebuilt parts (e.g. seeded tracklist and playback)
    pub fn from_parts(
        tracklist: Tracklist,
        playback: Playback,
        library: LibraryRouter,
        playlists: Arc<dyn PlaylistStore>,
        bus: SharedBus,
    ) -> Self {
        Self {
            tracklist,
            playback,
            library,
            playlists,
            volume: 100,
            output_enabled: true,
            started_at: Instant::now(),
            bus,
        }
    }

    pub fn into_shared(self) -> SharedCore {
        Arc::new(Mutex::new(self))
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn current(&self) -> Option<&TlTrack> {
        self.playback.current(&self.tracklist)
    }

    /// Position of the current entry in the tracklist
    pub fn current_position(&self) -> Option<usize> {
        self.playback
            .current_tlid()
            .and_then(|tlid| self.tracklist.index_of(tlid))
    }

    // =========================================================================
    // Tracklist edits
    // =========================================================================

    /// Apply a tracklist edit and let playback react to it
    fn edit_tracklist<T>(
        &mut self,
        edit: impl FnOnce(&mut Tracklist) -> Result<T, TracklistError>,
    ) -> Result<T, CoreError> {
        let position = self.current_position();
        let result = edit(&mut self.tracklist)?;
        self.playback.on_tracklist_change(&self.tracklist, position)?;
        Ok(result)
    }

    pub fn add(&mut self, tracks: Vec<Track>, position: Option<usize>) -> Result<Vec<TlTrack>, CoreError> {
        if tracks.is_empty() {
            return Ok(Vec::new());
        }
        self.edit_tracklist(|tracklist| tracklist.insert_at(tracks, position))
    }

    pub fn remove(&mut self, tlid: Tlid) -> Result<TlTrack, CoreError> {
        self.edit_tracklist(|tracklist| tracklist.remove(tlid))
    }

    pub fn remove_range(&mut self, start: usize, end: Option<usize>) -> Result<Vec<TlTrack>, CoreError> {
        self.edit_tracklist(|tracklist| tracklist.remove_range(start, end))
    }

    pub fn move_range(&mut self, start: usize, end: usize, to: usize) -> Result<(), CoreError> {
        self.edit_tracklist(|tracklist| tracklist.move_range(start, end, to))
    }

    pub fn swap(&mut self, pos1: usize, pos2: usize) -> Result<(), CoreError> {
        self.edit_tracklist(|tracklist| tracklist.swap(pos1, pos2))
    }

    pub fn swap_tlids(&mut self, tlid1: Tlid, tlid2: Tlid) -> Result<(), CoreError> {
        self.edit_tracklist(|tracklist| tracklist.swap_tlids(tlid1, tlid2))
    }

    pub fn shuffle(&mut self, start: Option<usize>, end: Option<usize>) -> Result<(), CoreError> {
        self.edit_tracklist(|tracklist| tracklist.shuffle(start, end))
    }

    pub fn clear(&mut self) -> Result<(), CoreError> {
        self.edit_tracklist(|tracklist| {
            tracklist.clear();
            Ok(())
        })
    }

    // =========================================================================
    // Playback
    // =========================================================================

    pub fn play(&mut self, tlid: Option<Tlid>) -> Result<(), CoreError> {
        Ok(self.playback.play(&self.tracklist, tlid)?)
    }

    pub fn next(&mut self) -> Result<(), CoreError> {
        Ok(self.playback.next(&mut self.tracklist)?)
    }

    pub fn previous(&mut self) -> Result<(), CoreError> {
        Ok(self.playback.previous(&mut self.tracklist)?)
    }

    pub fn seek(&mut self, position_ms: i64) -> Result<(), CoreError> {
        Ok(self.playback.seek(&mut self.tracklist, position_ms)?)
    }

    /// Seek in `tlid`, switching to it first if it is not current
    pub fn seek_in(&mut self, tlid: Tlid, position_ms: i64) -> Result<(), CoreError> {
        if self.playback.current_tlid() != Some(tlid) {
            self.playback.play(&self.tracklist, Some(tlid))?;
        }
        self.seek(position_ms)
    }

    pub fn set_random(&mut self, value: bool) {
        self.playback.set_random(&self.tracklist, value);
    }

    pub fn end_of_track(&mut self, tlid: Tlid) -> Result<(), CoreError> {
        Ok(self.playback.end_of_track(&mut self.tracklist, tlid)?)
    }

    // =========================================================================
    // Mixer and outputs
    // =========================================================================

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Set the volume, clamped to 0..=100
    pub fn set_volume(&mut self, volume: i64) {
        let volume = volume.clamp(0, 100) as u8;
        if volume != self.volume {
            self.volume = volume;
            self.bus.publish(Subsystem::Mixer);
        }
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    pub fn set_output_enabled(&mut self, enabled: bool) {
        if enabled != self.output_enabled {
            self.output_enabled = enabled;
            self.bus.publish(Subsystem::Output);
        }
    }

    /// Record a library refresh
    pub fn update_library(&mut self) {
        self.bus.publish(Subsystem::Update);
        self.bus.publish(Subsystem::Database);
    }
}

/// Feed end-of-track notifications from the audio output into the core
pub fn spawn_end_of_track_listener(
    core: SharedCore,
    mut finished: mpsc::Receiver<TrackFinished>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("End of track listener shutting down");
                    break;
                }
                event = finished.recv() => {
                    let Some(TrackFinished { tlid }) = event else {
                        break;
                    };
                    let mut core = core.lock().await;
                    if let Err(e) = core.end_of_track(tlid) {
                        tracing::warn!("End of track {} failed: {}", tlid, e);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryPlaylists;
    use crate::adapters::simulated::SimulatedPlayer;
    use crate::bus::create_bus;

    fn core() -> (Core, mpsc::Receiver<TrackFinished>) {
        let (player, rx) = SimulatedPlayer::new(CancellationToken::new());
        let core = Core::new(
            Arc::new(player),
            LibraryRouter::new(),
            Arc::new(MemoryPlaylists::new()),
            create_bus(),
        );
        (core, rx)
    }

    fn tracks(count: usize, length: Option<u64>) -> Vec<Track> {
        (0..count)
            .map(|i| Track {
                length,
                ..Track::new(format!("local:{}", i))
            })
            .collect()
    }

    #[test]
    fn test_deleting_playing_entry_advances() {
        let (mut core, _rx) = core();
        core.add(tracks(3, None), None).unwrap();
        core.play(Some(2)).unwrap();

        core.remove(2).unwrap();
        assert_eq!(core.playback.current_tlid(), Some(3));
        assert_eq!(core.playback.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_deleting_last_playing_entry_stops() {
        let (mut core, _rx) = core();
        core.add(tracks(2, None), None).unwrap();
        core.play(Some(2)).unwrap();

        core.remove_range(1, None).unwrap();
        assert_eq!(core.playback.state(), PlaybackState::Stopped);
        assert_eq!(core.playback.current_tlid(), None);
    }

    #[test]
    fn test_clear_stops() {
        let (mut core, _rx) = core();
        core.add(tracks(2, None), None).unwrap();
        core.play(None).unwrap();
        core.clear().unwrap();

        assert_eq!(core.playback.state(), PlaybackState::Stopped);
        assert_eq!(core.current(), None);
    }

    #[test]
    fn test_volume_clamps_and_publishes() {
        let (mut core, _rx) = core();
        let (_, mailbox) = core.bus().register();

        core.set_volume(150);
        assert_eq!(core.volume(), 100);
        assert!(mailbox.pending_snapshot().is_empty());

        core.set_volume(-4);
        assert_eq!(core.volume(), 0);
        assert!(mailbox.pending_snapshot().contains(&Subsystem::Mixer));
    }

    #[tokio::test]
    async fn test_end_of_track_listener_advances() {
        let (mut core, rx) = core();
        core.add(tracks(2, Some(20)), None).unwrap();
        core.play(Some(1)).unwrap();
        let core = core.into_shared();
        let shutdown = CancellationToken::new();
        let listener = spawn_end_of_track_listener(core.clone(), rx, shutdown.clone());

        let mut advanced = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let current = core.lock().await.playback.current_tlid();
            if current != Some(1) {
                advanced = true;
                break;
            }
        }
        shutdown.cancel();
        listener.await.unwrap();
        assert!(advanced, "playback should move past the first track");
    }
}
