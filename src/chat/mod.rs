//! Chat host seam: incoming events, reply transport, and command routing.

pub mod console;
pub mod event;
pub mod reply;
pub mod router;
pub mod text;

#[cfg(test)]
pub mod testing;

pub use event::{ChatEvent, ImageRef, RoomId, Sender, SourceMessage, UserId};
pub use reply::{Announcer, Reply};
pub use router::{Plugin, Router};
