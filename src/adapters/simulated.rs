//! Simulated audio output
//!
//! Keeps a wall-clock position for the loaded track and reports natural end
//! of track on a bounded channel. Used when no real audio engine is attached.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::traits::{AudioError, AudioPlayer, TrackFinished};
use crate::models::{Tlid, Track};

const EVENT_CAPACITY: usize = 16;

#[derive(Default)]
struct PlayerState {
    loaded: Option<Loaded>,
    /// Set while the clock is running
    started_at: Option<Instant>,
    offset_ms: u64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Clone, Copy)]
struct Loaded {
    tlid: Tlid,
    length_ms: Option<u64>,
}

impl PlayerState {
    fn elapsed_ms(&self) -> u64 {
        let running = self
            .started_at
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.offset_ms + running
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

pub struct SimulatedPlayer {
    state: Mutex<PlayerState>,
    events: mpsc::Sender<TrackFinished>,
    shutdown: CancellationToken,
}

impl SimulatedPlayer {
    /// Create a player and the receiver for its end-of-track notifications
    pub fn new(shutdown: CancellationToken) -> (Self, mpsc::Receiver<TrackFinished>) {
        let (events, rx) = mpsc::channel(EVENT_CAPACITY);
        let player = Self {
            state: Mutex::new(PlayerState::default()),
            events,
            shutdown,
        };
        (player, rx)
    }

    fn state(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the end-of-track timer for the remaining part of the loaded track
    fn schedule(&self, state: &mut PlayerState) {
        state.cancel_timer();
        let Some(Loaded {
            tlid,
            length_ms: Some(length_ms),
        }) = state.loaded
        else {
            return;
        };
        // Outside a runtime (plain unit tests) there is nothing to drive the timer.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let remaining = Duration::from_millis(length_ms.saturating_sub(state.elapsed_ms()));
        let events = self.events.clone();
        let shutdown = self.shutdown.clone();
        state.timer = Some(runtime.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(remaining) => {
                    if events.send(TrackFinished { tlid }).await.is_err() {
                        tracing::debug!("End of track {} dropped, no listener", tlid);
                    }
                }
            }
        }));
    }
}

impl AudioPlayer for SimulatedPlayer {
    fn load_and_play(&self, tlid: Tlid, track: &Track) -> Result<(), AudioError> {
        let mut state = self.state();
        state.loaded = Some(Loaded {
            tlid,
            length_ms: track.length,
        });
        state.offset_ms = 0;
        state.started_at = Some(Instant::now());
        self.schedule(&mut state);
        tracing::debug!("Simulated playback of {} ({})", track.uri, tlid);
        Ok(())
    }

    fn pause(&self) -> Result<(), AudioError> {
        let mut state = self.state();
        state.offset_ms = state.elapsed_ms();
        state.started_at = None;
        state.cancel_timer();
        Ok(())
    }

    fn resume(&self) -> Result<(), AudioError> {
        let mut state = self.state();
        if state.loaded.is_none() {
            return Err(AudioError::Unavailable("nothing loaded".into()));
        }
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
            self.schedule(&mut state);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        let mut state = self.state();
        state.cancel_timer();
        *state = PlayerState::default();
        Ok(())
    }

    fn seek(&self, position_ms: u64) -> Result<(), AudioError> {
        let mut state = self.state();
        if state.loaded.is_none() {
            return Err(AudioError::Unavailable("nothing loaded".into()));
        }
        state.offset_ms = position_ms;
        if state.started_at.is_some() {
            state.started_at = Some(Instant::now());
            self.schedule(&mut state);
        }
        Ok(())
    }

    fn elapsed(&self) -> u64 {
        self.state().elapsed_ms()
    }
}

impl Drop for SimulatedPlayer {
    fn drop(&mut self) {
        self.state().cancel_timer();
    }
}
