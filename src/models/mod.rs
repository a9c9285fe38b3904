pub mod channel;
pub mod direction;
pub mod performance;
pub mod signal;
pub mod trade;

pub use channel::{ChannelId, InboundMessage};
pub use direction::*;
pub use performance::PerformanceRecord;
pub use signal::Signal;
pub use trade::{AccountSnapshot, Trade};
