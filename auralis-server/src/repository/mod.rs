/// Repository traits: the only contracts the streaming/fingerprint core
/// consumes from the library layer. `InMemoryLibrary` is a reference
/// implementation good enough to drive the core end to end and to exercise
/// in tests; a real deployment swaps it for a connection-pooled SQLite-style
/// store behind the same traits.
pub mod in_memory;

use crate::error::Result;
use crate::models::fingerprint::Fingerprint;
use crate::models::track::{Album, Artist, Track};

pub const ORDER_BY_WHITELIST: &[&str] = &["id", "title", "duration_s"];

// Trait methods are synchronous: the only backing store today is the
// in-memory reference implementation below, which never blocks. A real
// connection-pooled store can implement these and internally hop to
// `spawn_blocking`/a pool worker without changing this contract; callers
// that want async I/O wrap the call site, not the trait.
pub trait TracksRepo: Send + Sync {
    fn get(&self, id: u32) -> Result<Track>;
    fn list(&self, order_by: &str, limit: usize, offset: usize) -> Result<(Vec<Track>, usize)>;
    fn delete(&self, id: u32) -> Result<()>;
}

pub trait AlbumsRepo: Send + Sync {
    fn get_all(&self) -> Result<Vec<Album>>;
}

pub trait ArtistsRepo: Send + Sync {
    fn get_all_artists(&self) -> Result<Vec<Artist>>;
}

pub trait FingerprintsRepo: Send + Sync {
    fn upsert(&self, track_id: u32, data: Fingerprint) -> Result<()>;
    fn get(&self, track_id: u32) -> Result<Option<Fingerprint>>;
    fn count_completed(&self) -> Result<usize>;
}

/// The full surface the rest of the service depends on, so a handler can
/// take one trait object instead of four.
pub trait Library: TracksRepo + AlbumsRepo + ArtistsRepo + FingerprintsRepo {}
impl<T: TracksRepo + AlbumsRepo + ArtistsRepo + FingerprintsRepo> Library for T {}
