pub mod controller;
pub mod ws;

pub use controller::{ControlMessage, ServerMessage, StreamController};
