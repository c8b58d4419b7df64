pub mod codec;
pub mod config;
pub mod errors;
pub mod feature;
pub mod manager;

pub use errors::{CodecError, RolloutError};
pub use feature::{Feature, RolloutMode};
pub use manager::{DeleteOutcome, Manager};
