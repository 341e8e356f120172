pub mod error;
pub mod math;
pub mod traits;
pub mod types;

pub use error::NightscreenError;
pub use traits::{EventFeed, ModelPredictor, OhlcvSource, PredictionContext, SentimentSource};
pub use types::*;
