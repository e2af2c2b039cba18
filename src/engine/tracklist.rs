//! Tracklist model
//!
//! Ordered queue of tracks. Each entry gets a tlid at insertion that is never
//! reused. Every structural mutation bumps `version` and publishes
//! `playlist` on the bus.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::bus::{SharedBus, Subsystem};
use crate::models::{TlTrack, Tlid, Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TracklistError {
    #[error("No such song")]
    NoSuchTlid(Tlid),
    #[error("Bad song index")]
    BadIndex,
}

pub struct Tracklist {
    entries: Vec<TlTrack>,
    next_tlid: Tlid,
    version: u32,
    rng: StdRng,
    bus: SharedBus,
}

impl Tracklist {
    pub fn new(bus: SharedBus) -> Self {
        Self::with_rng(bus, StdRng::from_entropy())
    }

    /// Create with a fixed random source, for reproducible shuffles
    pub fn with_rng(bus: SharedBus, rng: StdRng) -> Self {
        Self {
            entries: Vec::new(),
            next_tlid: 1,
            version: 0,
            rng,
            bus,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TlTrack] {
        &self.entries
    }

    pub fn get(&self, tlid: Tlid) -> Option<&TlTrack> {
        self.entries.iter().find(|entry| entry.tlid == tlid)
    }

    pub fn contains(&self, tlid: Tlid) -> bool {
        self.get(tlid).is_some()
    }

    pub fn index_of(&self, tlid: Tlid) -> Option<usize> {
        self.entries.iter().position(|entry| entry.tlid == tlid)
    }

    pub fn at(&self, position: usize) -> Option<&TlTrack> {
        self.entries.get(position)
    }

    /// Entries with the given URI, with their positions
    pub fn find_uri(&self, uri: &str) -> Vec<(usize, &TlTrack)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.track.uri == uri)
            .collect()
    }

    /// Entries changed since `version`.
    ///
    /// Any older version gets the whole list; the current or a newer one gets
    /// nothing. Clients polling `plchanges` rely on this.
    pub fn changes_since(&self, version: i64) -> &[TlTrack] {
        if version < i64::from(self.version) {
            &self.entries
        } else {
            &[]
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    fn bump_version(&mut self) {
        self.version += 1;
        self.bus.publish(Subsystem::Playlist);
    }

    fn make_entries(&mut self, tracks: Vec<Track>) -> Vec<TlTrack> {
        tracks
            .into_iter()
            .map(|track| {
                let entry = TlTrack::new(self.next_tlid, track);
                self.next_tlid += 1;
                entry
            })
            .collect()
    }

    /// Append tracks at the end
    pub fn append(&mut self, tracks: Vec<Track>) -> Vec<TlTrack> {
        let added = self.make_entries(tracks);
        if !added.is_empty() {
            self.entries.extend(added.iter().cloned());
            self.bump_version();
        }
        added
    }

    /// Insert tracks at `position`, or append when `position` is None
    pub fn insert_at(
        &mut self,
        tracks: Vec<Track>,
        position: Option<usize>,
    ) -> Result<Vec<TlTrack>, TracklistError> {
        let position = position.unwrap_or(self.entries.len());
        if position > self.entries.len() {
            return Err(TracklistError::BadIndex);
        }
        let added = self.make_entries(tracks);
        if !added.is_empty() {
            self.entries
                .splice(position..position, added.iter().cloned());
            self.bump_version();
        }
        Ok(added)
    }

    pub fn remove(&mut self, tlid: Tlid) -> Result<TlTrack, TracklistError> {
        let index = self
            .index_of(tlid)
            .ok_or(TracklistError::NoSuchTlid(tlid))?;
        let removed = self.entries.remove(index);
        self.bump_version();
        Ok(removed)
    }

    /// Remove `[start, end)`.
    ///
    /// `end` defaults to the length and is clamped when it overruns, but a
    /// `start` that selects nothing is an error.
    pub fn remove_range(
        &mut self,
        start: usize,
        end: Option<usize>,
    ) -> Result<Vec<TlTrack>, TracklistError> {
        let end = end.unwrap_or(self.entries.len()).min(self.entries.len());
        if start >= end {
            return Err(TracklistError::BadIndex);
        }
        let removed: Vec<TlTrack> = self.entries.drain(start..end).collect();
        self.bump_version();
        Ok(removed)
    }

    /// Move `[start, end)` so that it begins at `to`.
    ///
    /// An empty range (`start == end`) moves the single entry at `start`.
    pub fn move_range(&mut self, start: usize, end: usize, to: usize) -> Result<(), TracklistError> {
        let end = if start == end {
            end.checked_add(1).ok_or(TracklistError::BadIndex)?
        } else {
            end
        };
        let len = self.entries.len();
        if start > end || end > len {
            return Err(TracklistError::BadIndex);
        }
        let count = end - start;
        if to > len - count {
            return Err(TracklistError::BadIndex);
        }
        let moved: Vec<TlTrack> = self.entries.drain(start..end).collect();
        self.entries.splice(to..to, moved);
        self.bump_version();
        Ok(())
    }

    pub fn swap(&mut self, pos1: usize, pos2: usize) -> Result<(), TracklistError> {
        let len = self.entries.len();
        if pos1 >= len || pos2 >= len {
            return Err(TracklistError::BadIndex);
        }
        self.entries.swap(pos1, pos2);
        self.bump_version();
        Ok(())
    }

    pub fn swap_tlids(&mut self, tlid1: Tlid, tlid2: Tlid) -> Result<(), TracklistError> {
        let pos1 = self
            .index_of(tlid1)
            .ok_or(TracklistError::NoSuchTlid(tlid1))?;
        let pos2 = self
            .index_of(tlid2)
            .ok_or(TracklistError::NoSuchTlid(tlid2))?;
        self.swap(pos1, pos2)
    }

    /// Shuffle `[start, end)` in place; the whole list when both are None
    pub fn shuffle(&mut self, start: Option<usize>, end: Option<usize>) -> Result<(), TracklistError> {
        let len = self.entries.len();
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(TracklistError::BadIndex);
            }
        }
        if matches!(start, Some(start) if start >= len) {
            return Err(TracklistError::BadIndex);
        }
        if matches!(end, Some(end) if end > len) {
            return Err(TracklistError::BadIndex);
        }
        let start = start.unwrap_or(0);
        let end = end.unwrap_or(len);
        self.entries[start..end].shuffle(&mut self.rng);
        self.bump_version();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.bump_version();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::create_bus;

    fn tracks(names: &[&str]) -> Vec<Track> {
        names
            .iter()
            .map(|name| Track::new(format!("local:{}", name)).with_name(*name))
            .collect()
    }

    fn tracklist(names: &[&str]) -> Tracklist {
        let mut tracklist = Tracklist::with_rng(create_bus(), StdRng::seed_from_u64(7));
        tracklist.append(tracks(names));
        tracklist
    }

    fn names(tracklist: &Tracklist) -> Vec<String> {
        tracklist
            .entries()
            .iter()
            .map(|entry| entry.track.name.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_tlids_increase_and_are_never_reused() {
        let mut tracklist = tracklist(&["a", "b", "c"]);
        let tlids: Vec<Tlid> = tracklist.entries().iter().map(|e| e.tlid).collect();
        assert_eq!(tlids, vec![1, 2, 3]);

        tracklist.remove(3).unwrap();
        let added = tracklist.append(tracks(&["d"]));
        assert_eq!(added[0].tlid, 4);
    }

    #[test]
    fn test_version_strictly_increases_over_mutations() {
        let mut tracklist = tracklist(&["a", "b", "c", "d"]);
        let mut last = tracklist.version();
        let mut check = |tracklist: &Tracklist| {
            assert!(tracklist.version() > last);
            last = tracklist.version();
        };

        tracklist.remove(2).unwrap();
        check(&tracklist);
        tracklist.move_range(0, 1, 2).unwrap();
        check(&tracklist);
        tracklist.shuffle(None, None).unwrap();
        check(&tracklist);
        tracklist.swap(0, 1).unwrap();
        check(&tracklist);
        tracklist.append(tracks(&["e"]));
        check(&tracklist);
        tracklist.clear();
        check(&tracklist);
    }

    #[test]
    fn test_failed_mutation_keeps_version() {
        let mut tracklist = tracklist(&["a", "b"]);
        let version = tracklist.version();

        assert_eq!(tracklist.remove(99), Err(TracklistError::NoSuchTlid(99)));
        assert_eq!(tracklist.swap(0, 5), Err(TracklistError::BadIndex));
        assert_eq!(tracklist.version(), version);
    }

    #[test]
    fn test_changes_since() {
        let mut tracklist = tracklist(&["a", "b"]);
        let version = i64::from(tracklist.version());

        assert!(tracklist.changes_since(version).is_empty());
        assert_eq!(tracklist.changes_since(version - 1).len(), 2);
        assert_eq!(tracklist.changes_since(-1).len(), 2);

        tracklist.remove(1).unwrap();
        assert_eq!(tracklist.changes_since(version).len(), 1);
        assert!(tracklist.changes_since(version + 1).is_empty());
        assert!(tracklist.changes_since(version + 10).is_empty());
    }

    #[test]
    fn test_removal_keeps_other_tlids() {
        let mut tracklist = tracklist(&["a", "b", "c", "d"]);
        let before: Vec<(String, Tlid)> = tracklist
            .entries()
            .iter()
            .map(|e| (e.track.uri.clone(), e.tlid))
            .collect();

        tracklist.remove(2).unwrap();
        tracklist.remove_range(0, Some(1)).unwrap();

        for entry in tracklist.entries() {
            assert!(before.contains(&(entry.track.uri.clone(), entry.tlid)));
        }
    }

    #[test]
    fn test_remove_range_start_errors_end_clamps() {
        let mut tracklist = tracklist(&["a", "b", "c", "d", "e"]);

        assert_eq!(
            tracklist.remove_range(5, None),
            Err(TracklistError::BadIndex)
        );
        assert_eq!(
            tracklist.remove_range(7, Some(9)),
            Err(TracklistError::BadIndex)
        );
        assert_eq!(
            tracklist.remove_range(2, Some(2)),
            Err(TracklistError::BadIndex)
        );
        assert_eq!(tracklist.len(), 5);

        let removed = tracklist.remove_range(3, Some(100)).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(names(&tracklist), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_move_and_inverse_move_round_trip() {
        let original = vec!["a", "b", "c", "d", "e", "f"];
        let cases = [(0, 2, 3), (1, 4, 0), (5, 6, 0), (2, 3, 5), (0, 6, 0), (3, 5, 1)];

        for (start, end, to) in cases {
            let mut tracklist = tracklist(&original);
            tracklist.move_range(start, end, to).unwrap();
            tracklist.move_range(to, to + (end - start), start).unwrap();
            assert_eq!(names(&tracklist), original, "move {}:{} to {}", start, end, to);
        }
    }

    #[test]
    fn test_move_range() {
        let mut tracklist = tracklist(&["a", "b", "c", "d", "e", "f"]);
        tracklist.move_range(1, 3, 3).unwrap();
        assert_eq!(names(&tracklist), vec!["a", "d", "e", "b", "c", "f"]);

        tracklist.move_range(5, 5, 0).unwrap();
        assert_eq!(names(&tracklist), vec!["f", "a", "d", "e", "b", "c"]);

        assert_eq!(tracklist.move_range(4, 6, 5), Err(TracklistError::BadIndex));
        assert_eq!(tracklist.move_range(0, 7, 0), Err(TracklistError::BadIndex));
    }

    #[test]
    fn test_move_range_rejects_huge_positions() {
        let mut tracklist = tracklist(&["a", "b"]);
        let version = tracklist.version();

        assert_eq!(
            tracklist.move_range(0, 1, usize::MAX),
            Err(TracklistError::BadIndex)
        );
        assert_eq!(
            tracklist.move_range(usize::MAX, usize::MAX, 0),
            Err(TracklistError::BadIndex)
        );
        assert_eq!(tracklist.move_range(0, 1, 2), Err(TracklistError::BadIndex));
        assert_eq!(names(&tracklist), vec!["a", "b"]);
        assert_eq!(tracklist.version(), version);
    }

    #[test]
    fn test_swap_keeps_identity() {
        let mut tracklist = tracklist(&["a", "b", "c"]);
        tracklist.swap_tlids(1, 3).unwrap();

        assert_eq!(names(&tracklist), vec!["c", "b", "a"]);
        assert_eq!(tracklist.at(0).unwrap().tlid, 3);
        assert_eq!(tracklist.at(2).unwrap().tlid, 1);
        assert_eq!(tracklist.swap_tlids(1, 9), Err(TracklistError::NoSuchTlid(9)));
    }

    #[test]
    fn test_shuffle_sub_range_keeps_outside() {
        let mut tracklist = tracklist(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        tracklist.shuffle(Some(2), Some(6)).unwrap();

        let after = names(&tracklist);
        assert_eq!(&after[..2], &["a", "b"]);
        assert_eq!(&after[6..], &["g", "h"]);
        let mut middle = after[2..6].to_vec();
        middle.sort();
        assert_eq!(middle, vec!["c", "d", "e", "f"]);
    }

    #[test]
    fn test_shuffle_bounds() {
        let mut tracklist = tracklist(&["a", "b", "c"]);
        assert_eq!(tracklist.shuffle(Some(2), Some(1)), Err(TracklistError::BadIndex));
        assert_eq!(tracklist.shuffle(Some(3), None), Err(TracklistError::BadIndex));
        assert_eq!(tracklist.shuffle(None, Some(4)), Err(TracklistError::BadIndex));
        assert!(tracklist.shuffle(Some(1), None).is_ok());
    }

    #[test]
    fn test_insert_at() {
        let mut tracklist = tracklist(&["a", "c"]);
        let added = tracklist.insert_at(tracks(&["b"]), Some(1)).unwrap();
        assert_eq!(added[0].tlid, 3);
        assert_eq!(names(&tracklist), vec!["a", "b", "c"]);

        tracklist.insert_at(tracks(&["d"]), None).unwrap();
        assert_eq!(names(&tracklist), vec!["a", "b", "c", "d"]);

        assert_eq!(
            tracklist.insert_at(tracks(&["x"]), Some(9)),
            Err(TracklistError::BadIndex)
        );
    }

    #[test]
    fn test_mutation_publishes_playlist() {
        let bus = create_bus();
        let (_, mailbox) = bus.register();
        let mut tracklist = Tracklist::new(bus);

        tracklist.append(tracks(&["a"]));
        assert!(mailbox.pending_snapshot().contains(&Subsystem::Playlist));
    }
}
