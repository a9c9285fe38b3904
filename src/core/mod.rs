pub mod classifier;
pub mod instruments;
pub mod lifecycle;
pub mod parser;
pub mod sizing;
pub mod trade_id;

pub use classifier::SignalClassifier;
pub use instruments::{InstrumentSpec, InstrumentTable, InvalidInstrument};
pub use lifecycle::StatusChange;
pub use parser::{Field, ParseFailure, SignalParser};
pub use sizing::{PositionSizer, SizingFailure, SizingRequest};
