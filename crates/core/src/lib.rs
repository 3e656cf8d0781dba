pub mod engine;
pub mod error;
pub mod events;
pub mod options;
pub mod player;
pub mod session;
pub mod source;

pub use engine::{EngineEvent, EngineState, Media, MediaEngine};
pub use error::{PlayerError, Result, SourceErrorKind};
pub use events::{Phase, PlayerEvent, Status};
pub use player::{Connect, Player, PlayerConfig};
pub use session::Outcome;
pub use source::{Source, SourceKind};
