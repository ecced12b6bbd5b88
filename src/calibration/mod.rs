pub mod command;
pub mod session;
pub mod state;
pub mod store;

pub use command::Command;
pub use session::{CalibrationSession, LoopExit, PairContext, SessionReport};
pub use state::{AlignmentState, Bounds, CarriedOffsets};
pub use store::CalibrationRecord;
