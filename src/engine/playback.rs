//! Playback state machine
//!
//! Owns the play state, the current entry and the four play-order modes.
//! Track selection:
//! - `random` draws from the tracks not yet played in this random pass
//! - `repeat` wraps at either end of the list instead of stopping
//! - `single` only changes what happens when a track ends on its own
//! - `consume` removes a track from the tracklist once it has been played

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::tracklist::Tracklist;
use crate::adapters::{AudioError, AudioPlayer};
use crate::bus::{SharedBus, Subsystem};
use crate::models::{TlTrack, Tlid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Name used by `status`
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Stopped => "stop",
            PlaybackState::Playing => "play",
            PlaybackState::Paused => "pause",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("No such song")]
    NoSuchTlid(Tlid),
    #[error(transparent)]
    Audio(#[from] AudioError),
}

pub struct Playback {
    state: PlaybackState,
    current: Option<Tlid>,
    repeat: bool,
    random: bool,
    single: bool,
    consume: bool,
    /// Tracks not yet played in the current random pass
    shuffled: Vec<Tlid>,
    rng: StdRng,
    play_started: Option<Instant>,
    play_time: Duration,
    audio: Arc<dyn AudioPlayer>,
    bus: SharedBus,
}

impl Playback {
    pub fn new(audio: Arc<dyn AudioPlayer>, bus: SharedBus) -> Self {
        Self::with_rng(audio, bus, StdRng::from_entropy())
    }

    pub fn with_rng(audio: Arc<dyn AudioPlayer>, bus: SharedBus, rng: StdRng) -> Self {
        Self {
            state: PlaybackState::Stopped,
            current: None,
            repeat: false,
            random: false,
            single: false,
            consume: false,
            shuffled: Vec::new(),
            rng,
            play_started: None,
            play_time: Duration::ZERO,
            audio,
            bus,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_tlid(&self) -> Option<Tlid> {
        self.current
    }

    pub fn current<'a>(&self, tracklist: &'a Tracklist) -> Option<&'a TlTrack> {
        self.current.and_then(|tlid| tracklist.get(tlid))
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn random(&self) -> bool {
        self.random
    }

    pub fn single(&self) -> bool {
        self.single
    }

    pub fn consume(&self) -> bool {
        self.consume
    }

    /// Elapsed time in the current track, in milliseconds
    pub fn time_position(&self) -> u64 {
        match self.state {
            PlaybackState::Stopped => 0,
            _ => self.audio.elapsed(),
        }
    }

    /// Total time spent playing since startup
    pub fn play_time(&self) -> Duration {
        let running = self
            .play_started
            .map(|started| started.elapsed())
            .unwrap_or_default();
        self.play_time + running
    }

    /// The entry `next()` would play.
    ///
    /// In random mode with repeat on, a used-up pass is redrawn here so the
    /// reported entry is the one `next()` will pick.
    pub fn peek_next(&mut self, tracklist: &Tracklist) -> Option<Tlid> {
        if self.random {
            return self.next_tlid(tracklist);
        }
        self.step_forward(tracklist)
    }

    // =========================================================================
    // Track selection
    // =========================================================================

    fn step_forward(&self, tracklist: &Tracklist) -> Option<Tlid> {
        let Some(position) = self.current.and_then(|tlid| tracklist.index_of(tlid)) else {
            return tracklist.at(0).map(|entry| entry.tlid);
        };
        match tracklist.at(position + 1) {
            Some(entry) => Some(entry.tlid),
            None if self.repeat => tracklist.at(0).map(|entry| entry.tlid),
            None => None,
        }
    }

    /// Select the entry that follows the current one. None is end of playlist.
    pub fn next_tlid(&mut self, tracklist: &Tracklist) -> Option<Tlid> {
        if tracklist.is_empty() {
            return None;
        }
        if self.random {
            if self.shuffled.is_empty() && (self.repeat || self.current.is_none()) {
                self.reshuffle(tracklist);
            }
            return self.shuffled.first().copied();
        }
        self.step_forward(tracklist)
    }

    /// Select the entry before the current one. Random mode stays put.
    pub fn previous_tlid(&self, tracklist: &Tracklist) -> Option<Tlid> {
        if self.random {
            return self.current.filter(|&tlid| tracklist.contains(tlid));
        }
        let position = self.current.and_then(|tlid| tracklist.index_of(tlid))?;
        let previous = match position.checked_sub(1) {
            Some(previous) => previous,
            None if self.repeat => tracklist.len() - 1,
            None => 0,
        };
        tracklist.at(previous).map(|entry| entry.tlid)
    }

    /// Select what plays after the current track ends on its own
    pub fn end_of_track_tlid(&mut self, tracklist: &Tracklist) -> Option<Tlid> {
        match (self.single, self.repeat) {
            (true, true) => self.current.filter(|&tlid| tracklist.contains(tlid)),
            (true, false) => None,
            _ => self.next_tlid(tracklist),
        }
    }

    fn reshuffle(&mut self, tracklist: &Tracklist) {
        self.shuffled = tracklist.entries().iter().map(|entry| entry.tlid).collect();
        self.shuffled.shuffle(&mut self.rng);
    }

    /// Start a new random pass after the tracklist or the mode changed
    fn reset_random_pass(&mut self, tracklist: &Tracklist) {
        if self.random {
            self.reshuffle(tracklist);
            if let Some(current) = self.current {
                self.shuffled.retain(|&tlid| tlid != current);
            }
        } else {
            self.shuffled.clear();
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        if self.state == PlaybackState::Playing {
            if let Some(started) = self.play_started.take() {
                self.play_time += started.elapsed();
            }
        }
        if state == PlaybackState::Playing {
            self.play_started = Some(Instant::now());
        }
        tracing::debug!("Playback {} -> {}", self.state.as_str(), state.as_str());
        self.state = state;
    }

    fn start(&mut self, entry: &TlTrack) -> Result<(), PlaybackError> {
        if let Err(e) = self.audio.load_and_play(entry.tlid, &entry.track) {
            tracing::warn!("Audio refused {}: {}", entry.track.uri, e);
            return Err(e.into());
        }
        self.current = Some(entry.tlid);
        self.shuffled.retain(|&tlid| tlid != entry.tlid);
        self.set_state(PlaybackState::Playing);
        self.bus.publish(Subsystem::Player);
        Ok(())
    }

    /// Stop and forget the current entry (end of playlist)
    fn halt(&mut self) -> Result<(), PlaybackError> {
        let changed = self.state != PlaybackState::Stopped || self.current.is_some();
        if self.state != PlaybackState::Stopped {
            self.audio.stop()?;
            self.set_state(PlaybackState::Stopped);
        }
        self.current = None;
        if changed {
            self.bus.publish(Subsystem::Player);
        }
        Ok(())
    }

    /// Play `tlid`, or with None resume/start from the current or first entry
    pub fn play(&mut self, tracklist: &Tracklist, tlid: Option<Tlid>) -> Result<(), PlaybackError> {
        if let Some(tlid) = tlid {
            let entry = tracklist
                .get(tlid)
                .ok_or(PlaybackError::NoSuchTlid(tlid))?
                .clone();
            return self.start(&entry);
        }
        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => self.resume(),
            PlaybackState::Stopped => {
                let target = match self.current.filter(|&tlid| tracklist.contains(tlid)) {
                    Some(current) => Some(current),
                    None => self.next_tlid(tracklist),
                };
                match target.and_then(|tlid| tracklist.get(tlid)).cloned() {
                    Some(entry) => self.start(&entry),
                    None => Ok(()),
                }
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.state == PlaybackState::Playing {
            self.audio.pause()?;
            self.set_state(PlaybackState::Paused);
            self.bus.publish(Subsystem::Player);
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.state == PlaybackState::Paused {
            self.audio.resume()?;
            self.set_state(PlaybackState::Playing);
            self.bus.publish(Subsystem::Player);
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Stopped {
            self.audio.stop()?;
            self.set_state(PlaybackState::Stopped);
            self.bus.publish(Subsystem::Player);
        }
        Ok(())
    }

    /// Leave the current entry for `target`, consuming it first if enabled
    fn advance(&mut self, tracklist: &mut Tracklist, target: Option<Tlid>) -> Result<(), PlaybackError> {
        if self.consume {
            if let Some(finished) = self.current {
                if tracklist.remove(finished).is_ok() {
                    tracing::debug!("Consumed {}", finished);
                    self.reset_random_pass(tracklist);
                }
            }
        }
        match target.and_then(|tlid| tracklist.get(tlid)).cloned() {
            Some(entry) => self.start(&entry),
            None => self.halt(),
        }
    }

    pub fn next(&mut self, tracklist: &mut Tracklist) -> Result<(), PlaybackError> {
        let target = self.next_tlid(tracklist);
        self.advance(tracklist, target)
    }

    pub fn previous(&mut self, tracklist: &mut Tracklist) -> Result<(), PlaybackError> {
        match self
            .previous_tlid(tracklist)
            .and_then(|tlid| tracklist.get(tlid))
            .cloned()
        {
            Some(entry) => self.start(&entry),
            None => self.halt(),
        }
    }

    /// Natural end of `tlid` reported by the audio output.
    ///
    /// Reports for anything but the playing entry are stale and ignored.
    pub fn end_of_track(&mut self, tracklist: &mut Tracklist, tlid: Tlid) -> Result<(), PlaybackError> {
        if self.current != Some(tlid) || self.state != PlaybackState::Playing {
            tracing::debug!("Ignoring stale end of track for {}", tlid);
            return Ok(());
        }
        let target = self.end_of_track_tlid(tracklist);
        self.advance(tracklist, target)
    }

    /// Seek within the current entry, starting or resuming playback as needed
    pub fn seek(&mut self, tracklist: &mut Tracklist, position_ms: i64) -> Result<(), PlaybackError> {
        let Some(entry) = self.current(tracklist).cloned() else {
            return Ok(());
        };
        match self.state {
            PlaybackState::Stopped => self.play(tracklist, None)?,
            PlaybackState::Paused => self.resume()?,
            PlaybackState::Playing => {}
        }
        let position_ms = position_ms.max(0) as u64;
        if matches!(entry.track.length, Some(length) if position_ms > length) {
            return self.next(tracklist);
        }
        self.audio.seek(position_ms)?;
        self.bus.publish(Subsystem::Player);
        Ok(())
    }

    /// React to a structural tracklist change.
    ///
    /// `old_position` is where the current entry was before the change. When
    /// the playing entry was removed, playback moves on to whatever now sits
    /// at that position.
    pub fn on_tracklist_change(
        &mut self,
        tracklist: &Tracklist,
        old_position: Option<usize>,
    ) -> Result<(), PlaybackError> {
        self.reset_random_pass(tracklist);
        if tracklist.is_empty() {
            return self.halt();
        }
        let Some(current) = self.current else {
            return Ok(());
        };
        if tracklist.contains(current) {
            return Ok(());
        }
        if self.state == PlaybackState::Stopped {
            self.current = None;
            self.bus.publish(Subsystem::Player);
            return Ok(());
        }
        let target = if self.random {
            self.current = None;
            self.next_tlid(tracklist)
        } else {
            old_position
                .and_then(|position| tracklist.at(position))
                .or_else(|| if self.repeat { tracklist.at(0) } else { None })
                .map(|entry| entry.tlid)
        };
        match target.and_then(|tlid| tracklist.get(tlid)).cloned() {
            Some(entry) => self.start(&entry),
            None => self.halt(),
        }
    }

    // =========================================================================
    // Modes
    // =========================================================================

    fn set_flag(flag: &mut bool, value: bool, bus: &SharedBus) -> bool {
        if *flag == value {
            return false;
        }
        *flag = value;
        bus.publish(Subsystem::Options);
        true
    }

    pub fn set_repeat(&mut self, value: bool) {
        Self::set_flag(&mut self.repeat, value, &self.bus);
    }

    pub fn set_single(&mut self, value: bool) {
        Self::set_flag(&mut self.single, value, &self.bus);
    }

    pub fn set_consume(&mut self, value: bool) {
        Self::set_flag(&mut self.consume, value, &self.bus);
    }

    pub fn set_random(&mut self, tracklist: &Tracklist, value: bool) {
        if Self::set_flag(&mut self.random, value, &self.bus) {
            self.reset_random_pass(tracklist);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::create_bus;
    use crate::models::Track;
    use std::sync::Mutex;

    /// Audio output that records calls
    #[derive(Default)]
    struct RecordingAudio {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingAudio {
        fn record(&self, call: String) -> Result<(), AudioError> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    impl AudioPlayer for RecordingAudio {
        fn load_and_play(&self, tlid: Tlid, _track: &Track) -> Result<(), AudioError> {
            self.record(format!("play {}", tlid))
        }
        fn pause(&self) -> Result<(), AudioError> {
            self.record("pause".into())
        }
        fn resume(&self) -> Result<(), AudioError> {
            self.record("resume".into())
        }
        fn stop(&self) -> Result<(), AudioError> {
            self.record("stop".into())
        }
        fn seek(&self, position_ms: u64) -> Result<(), AudioError> {
            self.record(format!("seek {}", position_ms))
        }
        fn elapsed(&self) -> u64 {
            0
        }
    }

    struct Fixture {
        tracklist: Tracklist,
        playback: Playback,
        audio: Arc<RecordingAudio>,
    }

    impl Fixture {
        fn new(names: &[&str]) -> Self {
            let bus = create_bus();
            let audio = Arc::new(RecordingAudio::default());
            let mut tracklist = Tracklist::with_rng(bus.clone(), StdRng::seed_from_u64(1));
            tracklist.append(
                names
                    .iter()
                    .map(|n| Track::new(format!("local:{}", n)).with_name(*n))
                    .collect(),
            );
            let playback = Playback::with_rng(audio.clone(), bus, StdRng::seed_from_u64(2));
            Self {
                tracklist,
                playback,
                audio,
            }
        }

        fn play_name(&mut self, name: &str) {
            let tlid = self.tlid(name);
            self.playback.play(&self.tracklist, Some(tlid)).unwrap();
        }

        fn tlid(&self, name: &str) -> Tlid {
            self.tracklist
                .entries()
                .iter()
                .find(|e| e.track.name.as_deref() == Some(name))
                .map(|e| e.tlid)
                .unwrap()
        }

        fn current_name(&self) -> Option<String> {
            self.playback
                .current(&self.tracklist)
                .and_then(|e| e.track.name.clone())
        }

        fn names(&self) -> Vec<String> {
            self.tracklist
                .entries()
                .iter()
                .filter_map(|e| e.track.name.clone())
                .collect()
        }
    }

    #[test]
    fn test_play_empty_tracklist_is_noop() {
        let mut f = Fixture::new(&[]);
        f.playback.play(&f.tracklist, None).unwrap();
        assert_eq!(f.playback.state(), PlaybackState::Stopped);
        assert!(f.audio.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_play_without_current_starts_first() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.playback.play(&f.tracklist, None).unwrap();
        assert_eq!(f.playback.state(), PlaybackState::Playing);
        assert_eq!(f.current_name().as_deref(), Some("1"));
    }

    #[test]
    fn test_play_unknown_tlid_fails() {
        let mut f = Fixture::new(&["1"]);
        assert_eq!(
            f.playback.play(&f.tracklist, Some(42)),
            Err(PlaybackError::NoSuchTlid(42))
        );
    }

    #[test]
    fn test_pause_resume_stop() {
        let mut f = Fixture::new(&["1", "2"]);
        f.playback.pause().unwrap();
        assert_eq!(f.playback.state(), PlaybackState::Stopped);

        f.play_name("2");
        f.playback.pause().unwrap();
        assert_eq!(f.playback.state(), PlaybackState::Paused);
        f.playback.play(&f.tracklist, None).unwrap();
        assert_eq!(f.playback.state(), PlaybackState::Playing);

        f.playback.stop().unwrap();
        assert_eq!(f.playback.state(), PlaybackState::Stopped);
        assert_eq!(f.current_name().as_deref(), Some("2"));
        assert_eq!(
            *f.audio.calls.lock().unwrap(),
            vec!["play 2", "pause", "resume", "stop"]
        );
    }

    #[test]
    fn test_play_resumes_current_after_stop() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.play_name("2");
        f.playback.stop().unwrap();
        f.playback.play(&f.tracklist, None).unwrap();
        assert_eq!(f.current_name().as_deref(), Some("2"));
    }

    /// Run `next()` from each starting track of a fresh "1,2,3" list
    fn next_from_each(repeat: bool, single: bool, consume: bool) -> Vec<Option<String>> {
        ["1", "2", "3"]
            .iter()
            .map(|start| {
                let mut f = Fixture::new(&["1", "2", "3"]);
                f.playback.set_repeat(repeat);
                f.playback.set_single(single);
                f.playback.set_consume(consume);
                f.play_name(start);
                f.playback.next(&mut f.tracklist).unwrap();
                f.current_name()
            })
            .collect()
    }

    fn previous_from_each(repeat: bool, single: bool, consume: bool) -> Vec<Option<String>> {
        ["1", "2", "3"]
            .iter()
            .map(|start| {
                let mut f = Fixture::new(&["1", "2", "3"]);
                f.playback.set_repeat(repeat);
                f.playback.set_single(single);
                f.playback.set_consume(consume);
                f.play_name(start);
                f.playback.previous(&mut f.tracklist).unwrap();
                f.current_name()
            })
            .collect()
    }

    fn expect(names: [Option<&str>; 3]) -> Vec<Option<String>> {
        names.iter().map(|n| n.map(str::to_string)).collect()
    }

    #[test]
    fn test_next_mode_table() {
        let advance = expect([Some("2"), Some("3"), None]);
        let wrap = expect([Some("2"), Some("3"), Some("1")]);

        for consume in [false, true] {
            assert_eq!(next_from_each(false, false, consume), advance);
            assert_eq!(next_from_each(false, true, consume), advance);
            assert_eq!(next_from_each(true, false, consume), wrap);
            assert_eq!(next_from_each(true, true, consume), wrap);
        }
    }

    #[test]
    fn test_previous_mode_table() {
        let clamp = expect([Some("1"), Some("1"), Some("2")]);
        let wrap = expect([Some("3"), Some("1"), Some("2")]);

        for consume in [false, true] {
            for single in [false, true] {
                assert_eq!(previous_from_each(false, single, consume), clamp);
                assert_eq!(previous_from_each(true, single, consume), wrap);
            }
        }
    }

    #[test]
    fn test_next_stops_at_end_of_playlist() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.play_name("3");
        f.playback.next(&mut f.tracklist).unwrap();

        assert_eq!(f.playback.state(), PlaybackState::Stopped);
        assert_eq!(f.playback.current_tlid(), None);
    }

    #[test]
    fn test_consume_removes_finished_track() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.playback.set_consume(true);
        f.play_name("1");
        f.playback.next(&mut f.tracklist).unwrap();
        assert_eq!(f.names(), vec!["2", "3"]);

        f.playback.previous(&mut f.tracklist).unwrap();
        assert_eq!(f.names(), vec!["2", "3"]);
    }

    #[test]
    fn test_repeat_consume_wraps_over_shrinking_list() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.playback.set_repeat(true);
        f.playback.set_consume(true);
        f.play_name("2");

        let mut played = vec![f.current_name()];
        for _ in 0..3 {
            f.playback.next(&mut f.tracklist).unwrap();
            played.push(f.current_name());
        }
        assert_eq!(
            played,
            expect([Some("2"), Some("3"), Some("1")])
                .into_iter()
                .chain([None])
                .collect::<Vec<_>>()
        );
        assert!(f.tracklist.is_empty());
        assert_eq!(f.playback.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_end_of_track_single_and_repeat() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.play_name("2");
        let tlid = f.tlid("2");

        f.playback.set_single(true);
        f.playback.set_repeat(true);
        f.playback.end_of_track(&mut f.tracklist, tlid).unwrap();
        assert_eq!(f.current_name().as_deref(), Some("2"));

        f.playback.set_repeat(false);
        f.playback.end_of_track(&mut f.tracklist, tlid).unwrap();
        assert_eq!(f.playback.state(), PlaybackState::Stopped);

        f.playback.set_single(false);
        f.play_name("2");
        f.playback.end_of_track(&mut f.tracklist, tlid).unwrap();
        assert_eq!(f.current_name().as_deref(), Some("3"));
    }

    #[test]
    fn test_end_of_track_consumes() {
        let mut f = Fixture::new(&["1", "2"]);
        f.playback.set_consume(true);
        f.play_name("1");
        let tlid = f.tlid("1");

        f.playback.end_of_track(&mut f.tracklist, tlid).unwrap();
        assert_eq!(f.names(), vec!["2"]);
        assert_eq!(f.current_name().as_deref(), Some("2"));
    }

    #[test]
    fn test_stale_end_of_track_ignored() {
        let mut f = Fixture::new(&["1", "2"]);
        f.play_name("2");
        let stale = f.tlid("1");

        f.playback.end_of_track(&mut f.tracklist, stale).unwrap();
        assert_eq!(f.current_name().as_deref(), Some("2"));
    }

    #[test]
    fn test_random_visits_every_track_once_per_pass() {
        let mut f = Fixture::new(&["1", "2", "3", "4", "5"]);
        f.playback.set_random(&f.tracklist, true);
        f.playback.play(&f.tracklist, None).unwrap();

        let mut seen = vec![f.current_name().unwrap()];
        for _ in 0..4 {
            f.playback.next(&mut f.tracklist).unwrap();
            seen.push(f.current_name().unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);

        f.playback.next(&mut f.tracklist).unwrap();
        assert_eq!(f.playback.state(), PlaybackState::Stopped);
        assert_eq!(f.playback.current_tlid(), None);
    }

    #[test]
    fn test_random_repeat_never_ends() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.playback.set_random(&f.tracklist, true);
        f.playback.set_repeat(true);
        f.playback.play(&f.tracklist, None).unwrap();

        for _ in 0..10 {
            f.playback.next(&mut f.tracklist).unwrap();
            assert_eq!(f.playback.state(), PlaybackState::Playing);
        }
    }

    #[test]
    fn test_random_repeat_reports_next_after_pass_ends() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.playback.set_random(&f.tracklist, true);
        f.playback.set_repeat(true);
        f.playback.play(&f.tracklist, None).unwrap();
        f.playback.next(&mut f.tracklist).unwrap();
        f.playback.next(&mut f.tracklist).unwrap();

        for _ in 0..6 {
            let reported = f.playback.peek_next(&f.tracklist);
            assert!(reported.is_some(), "repeat keeps a next entry");
            f.playback.next(&mut f.tracklist).unwrap();
            assert_eq!(f.playback.current_tlid(), reported);
        }
    }

    #[test]
    fn test_random_without_repeat_has_no_next_after_pass() {
        let mut f = Fixture::new(&["1", "2"]);
        f.playback.set_random(&f.tracklist, true);
        f.playback.play(&f.tracklist, None).unwrap();
        f.playback.next(&mut f.tracklist).unwrap();
        assert_eq!(f.playback.peek_next(&f.tracklist), None);
    }

    #[test]
    fn test_random_previous_stays_on_current() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.playback.set_random(&f.tracklist, true);
        f.play_name("2");
        f.playback.previous(&mut f.tracklist).unwrap();
        assert_eq!(f.current_name().as_deref(), Some("2"));
    }

    #[test]
    fn test_removing_playing_entry_advances() {
        let mut f = Fixture::new(&["1", "2", "3"]);
        f.play_name("2");
        let tlid = f.tlid("2");
        let position = f.tracklist.index_of(tlid);

        f.tracklist.remove(tlid).unwrap();
        f.playback.on_tracklist_change(&f.tracklist, position).unwrap();

        assert_eq!(f.current_name().as_deref(), Some("3"));
        assert_eq!(f.playback.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_clear_stops_and_forgets_current() {
        let mut f = Fixture::new(&["1", "2"]);
        f.play_name("1");
        f.tracklist.clear();
        f.playback.on_tracklist_change(&f.tracklist, Some(0)).unwrap();

        assert_eq!(f.playback.state(), PlaybackState::Stopped);
        assert_eq!(f.playback.current_tlid(), None);
    }

    #[test]
    fn test_seek_past_end_goes_next() {
        let bus = create_bus();
        let audio = Arc::new(RecordingAudio::default());
        let mut tracklist = Tracklist::new(bus.clone());
        tracklist.append(vec![
            Track::new("local:a").with_length(10_000),
            Track::new("local:b").with_length(10_000),
        ]);
        let mut playback = Playback::new(audio.clone(), bus);
        playback.play(&tracklist, Some(1)).unwrap();

        playback.seek(&mut tracklist, 5_000).unwrap();
        assert_eq!(playback.current_tlid(), Some(1));
        playback.seek(&mut tracklist, 20_000).unwrap();
        assert_eq!(playback.current_tlid(), Some(2));
        assert!(audio.calls.lock().unwrap().contains(&"seek 5000".to_string()));
    }

    #[test]
    fn test_mode_change_publishes_options_once() {
        let bus = create_bus();
        let (_, mailbox) = bus.register();
        let mut playback = Playback::new(Arc::new(RecordingAudio::default()), bus);

        playback.set_repeat(false);
        assert!(mailbox.pending_snapshot().is_empty());
        playback.set_repeat(true);
        assert!(mailbox.pending_snapshot().contains(&Subsystem::Options));
    }
}
