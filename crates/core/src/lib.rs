pub mod clock;
pub mod config;
pub mod error;
pub mod task;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use config::Config;
pub use error::*;
pub use task::*;
