//! Reply transport provided by the chat host.

use async_trait::async_trait;

use crate::error::Result;
use crate::meme::layout::MemeImage;

use super::event::RoomId;

/// Replies to the room an event came from.
#[async_trait]
pub trait Reply: Send + Sync {
    /// Send a plain text message.
    async fn reply_text(&self, text: &str) -> Result<()>;

    /// Send an image. The host rasterises the caption layers onto the background.
    async fn reply_image(&self, image: MemeImage) -> Result<()>;
}

/// Unsolicited messages to a room (party timers, lottery results).
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, room: RoomId, text: &str) -> Result<()>;
}
