/// Process-wide shared state handed to every handler and stream session.
/// Constructed once in `main`; every field is its own `Arc` so a handler
/// can clone out exactly the pieces it needs instead of cloning the whole
/// state.
use crate::cache::ChunkCache;
use crate::config::Config;
use crate::fingerprint_service::FingerprintService;
use crate::player::PlayerActor;
use crate::repository::Library;
use crate::semaphore::StreamSemaphore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub library: Arc<dyn Library>,
    pub cache: Arc<ChunkCache>,
    pub semaphore: Arc<StreamSemaphore>,
    pub fingerprints: Arc<FingerprintService>,
    pub player: Arc<PlayerActor>,
    pub origin_allowlist: Arc<Vec<String>>,
}
