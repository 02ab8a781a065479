//! Party scheduling: per-room signups with a start-time timer.

pub mod commands;
pub mod error;
pub mod format;
pub mod model;
pub mod registry;
pub mod time_spec;
pub mod timer;

pub use commands::PartyPlugin;
pub use error::PartyError;
pub use model::{Member, MemberId, Party, PartyId, PartyKind};
pub use registry::{
    run_timer_loop, DuplicateScope, JoinOutcome, JoinTarget, LeaveSummary, MemberChange, NewParty,
    PartyRegistry,
};
pub use time_spec::TimeSpec;
pub use timer::{DeadlineQueue, TimerKey};
