mod engine;

pub use engine::{Phase, PomodoroEngine, PomodoroSettings};
