//! Escalating attempt limiting and entry state management.

mod clock;
mod entry;
mod policy;
mod store;
mod table;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use entry::{LimitEntry, LimitStatus};
pub use policy::{EscalationPolicy, LinearEscalation};
pub use store::TimesLimiter;
pub use table::Sampling;
