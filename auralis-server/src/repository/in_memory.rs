/// Reference `Library` implementation backed by a single `parking_lot::Mutex`
/// around a few `HashMap`s. Good enough to drive sessions end to end and to
/// exercise the repository contracts in tests; a real deployment swaps this
/// for a pooled SQLite-style store behind the same traits.
use crate::error::{AppError, Result};
use crate::models::fingerprint::Fingerprint;
use crate::models::track::{Album, Artist, Track};
use crate::repository::{AlbumsRepo, ArtistsRepo, FingerprintsRepo, TracksRepo, ORDER_BY_WHITELIST};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
struct State {
    tracks: HashMap<u32, Track>,
    albums: HashMap<u32, Album>,
    artists: HashMap<u32, Artist>,
    fingerprints: HashMap<u32, Fingerprint>,
}

pub struct InMemoryLibrary {
    state: Mutex<State>,
}

impl Default for InMemoryLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn insert_track(&self, track: Track) {
        self.state.lock().tracks.insert(track.id, track);
    }

    pub fn insert_album(&self, album: Album) {
        self.state.lock().albums.insert(album.id, album);
    }

    pub fn insert_artist(&self, artist: Artist) {
        self.state.lock().artists.insert(artist.id, artist);
    }
}

impl TracksRepo for InMemoryLibrary {
    fn get(&self, id: u32) -> Result<Track> {
        self.state
            .lock()
            .tracks
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("track {id} not found")))
    }

    fn list(&self, order_by: &str, limit: usize, offset: usize) -> Result<(Vec<Track>, usize)> {
        if !ORDER_BY_WHITELIST.contains(&order_by) {
            return Err(AppError::invalid("order_by not in whitelist"));
        }
        let guard = self.state.lock();
        let mut rows: Vec<Track> = guard.tracks.values().cloned().collect();
        match order_by {
            "title" => rows.sort_by(|a, b| a.title.cmp(&b.title)),
            "duration_s" => rows.sort_by(|a, b| a.duration_s.partial_cmp(&b.duration_s).unwrap()),
            _ => rows.sort_by_key(|t| t.id),
        }
        let total = rows.len();
        let limit = limit.min(crate::constants::MAX_PAGE_SIZE);
        let page = rows.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    fn delete(&self, id: u32) -> Result<()> {
        // Cache-invalidation events bracket the delete: emitted here as
        // tracing events; a real cache layer would subscribe to these.
        tracing::info!(track_id = id, "cache invalidation: pre-delete");
        let removed = self.state.lock().tracks.remove(&id);
        tracing::info!(track_id = id, "cache invalidation: post-delete");
        if removed.is_some() {
            Ok(())
        } else {
            Err(AppError::not_found(format!("track {id} not found")))
        }
    }
}

impl AlbumsRepo for InMemoryLibrary {
    fn get_all(&self) -> Result<Vec<Album>> {
        // A real SQL-backed store would batch-fetch each album's track_ids
        // with one `IN (...)` query rather than one query per album — the
        // in-memory map already holds everything, so there's no join to
        // avoid, but the shape of the returned data (ids, not nested
        // eager-loaded rows) keeps a future SQL implementation honest.
        Ok(self.state.lock().albums.values().cloned().collect())
    }
}

impl ArtistsRepo for InMemoryLibrary {
    fn get_all_artists(&self) -> Result<Vec<Artist>> {
        // Relations (`album_ids`) are plain owned data already, so there's
        // no "access after detach" hazard the way there is with a lazy ORM
        // relationship — the contract is satisfied by construction.
        Ok(self.state.lock().artists.values().cloned().collect())
    }
}

impl FingerprintsRepo for InMemoryLibrary {
    fn upsert(&self, track_id: u32, data: Fingerprint) -> Result<()> {
        // INSERT OR REPLACE semantics: a concurrent second upsert for the
        // same track_id simply overwrites, no conflict error.
        self.state.lock().fingerprints.insert(track_id, data);
        Ok(())
    }

    fn get(&self, track_id: u32) -> Result<Option<Fingerprint>> {
        Ok(self.state.lock().fingerprints.get(&track_id).copied())
    }

    fn count_completed(&self) -> Result<usize> {
        Ok(self
            .state
            .lock()
            .fingerprints
            .values()
            .filter(|fp| !fp.is_placeholder())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track(id: u32) -> Track {
        Track {
            id,
            filepath: format!("/music/{id}.flac"),
            duration_s: 180.0,
            sample_rate: 44100,
            channels: 2,
            bit_depth: 16,
            title: format!("Track {id}"),
            artists: vec![],
            album: None,
            genres: vec![],
        }
    }

    #[test]
    fn unknown_order_by_is_rejected() {
        let lib = InMemoryLibrary::new();
        assert!(lib.list("secret_column", 10, 0).is_err());
    }

    #[test]
    fn delete_is_not_idempotent_second_call_errors() {
        let lib = InMemoryLibrary::new();
        lib.insert_track(sample_track(1));
        assert!(lib.delete(1).is_ok());
        assert!(lib.delete(1).is_err());
    }

    #[test]
    fn count_completed_excludes_the_placeholder() {
        let lib = InMemoryLibrary::new();
        for id in 0..10u32 {
            lib.upsert(id, Fingerprint::placeholder()).unwrap();
        }
        for id in 10..17u32 {
            let mut fp = Fingerprint::placeholder();
            fp.lufs = -14.0;
            lib.upsert(id, fp).unwrap();
        }
        assert_eq!(lib.count_completed().unwrap(), 7);
    }
}
