pub mod actor;
pub mod queue;

pub use actor::{EndOfTrackAction, PlayerActor};
