mod engine;

pub use engine::{TimerEngine, TimerState, TimerStatus};
