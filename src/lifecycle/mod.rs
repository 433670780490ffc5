//! Maintenance request lifecycle rules
//!
//! Everything here is free of I/O except the board's HTTP stage client:
//! numbering, assignment defaults, the stage state machine and the overdue
//! predicate are pure functions that the services and stores compose.

pub mod assignment;
pub mod board;
pub mod clock;
pub mod numbering;
pub mod overdue;
pub mod stage;

pub use assignment::{Assignment, AssignmentDefaults};
pub use clock::{Clock, SystemClock};
pub use numbering::RequestNumber;
pub use overdue::is_overdue;
pub use stage::{Cascade, StageChange, StageParams};
