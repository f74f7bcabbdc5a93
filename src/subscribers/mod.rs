//! Lifecycle observability: subscriber trait and fan-out.

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;

pub(crate) use set::SubscriberSet;
