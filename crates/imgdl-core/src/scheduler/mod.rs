//! Bounded-parallelism batch scheduler.
//!
//! Admits transfer units for indices `1..=total_count` in order, never more than
//! `parallelism` outstanding at once, and stops admitting as soon as the batch
//! is cancelled. Before returning it quiesces: every admitted unit has
//! reported, so nothing can change the completed count afterwards.

mod admit;
mod outcome;
mod quiesce;

pub use admit::run;
pub use outcome::BatchOutcome;
