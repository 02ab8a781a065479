//! In-memory host used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::meme::layout::MemeImage;

use super::event::RoomId;
use super::reply::{Announcer, Reply};

/// Records everything a plugin sends.
#[derive(Default)]
pub struct RecordingReply {
    texts: Mutex<Vec<String>>,
    images: Mutex<Vec<MemeImage>>,
}

impl RecordingReply {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn images(&self) -> Vec<MemeImage> {
        self.images.lock().unwrap().clone()
    }

    pub fn last_text(&self) -> String {
        self.texts.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn clear(&self) {
        self.texts.lock().unwrap().clear();
        self.images.lock().unwrap().clear();
    }
}

#[async_trait]
impl Reply for RecordingReply {
    async fn reply_text(&self, text: &str) -> Result<()> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn reply_image(&self, image: MemeImage) -> Result<()> {
        self.images.lock().unwrap().push(image);
        Ok(())
    }
}

/// Records room announcements.
#[derive(Default)]
pub struct RecordingAnnouncer {
    sent: Mutex<Vec<(RoomId, String)>>,
}

impl RecordingAnnouncer {
    pub fn sent(&self) -> Vec<(RoomId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, room: RoomId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((room, text.to_string()));
        Ok(())
    }
}
