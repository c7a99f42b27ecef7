//! Typed facades over the board's subsystems

mod led;
mod zstage;

pub use led::Led;
pub(crate) use led::LedState;
pub use zstage::{ZStage, ZStageState};
