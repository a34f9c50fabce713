#![forbid(unsafe_code)]

pub mod assets;
pub mod core;
pub mod error;
pub mod export;
pub mod fetch;
pub mod fonts;
pub mod layout;
pub mod model;
pub mod palette;
pub mod placement;
pub mod render_cpu;
pub mod store;
pub mod style;

pub use crate::core::{HALF_CANVAS, Scale, ScaleTracker, VIRTUAL_CANVAS};
pub use error::{CourtsideError, CourtsideResult};
pub use model::{Card, GAMES_PER_CARD, GameRecord, generate_cards};
pub use style::{StyleOverrides, StyleSet};
