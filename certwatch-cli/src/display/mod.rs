mod countdown;
mod progress;

pub use countdown::Countdown;
pub use progress::{ProgressWriterFactory, RefreshProgress};
