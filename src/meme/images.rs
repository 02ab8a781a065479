//! Template files and per-sender personal images.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection, OptionalExtension};

use crate::chat::UserId;
use crate::error::{Error, Result};

/// Built-in backgrounds in the resource directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Default,
    Parrot,
    Stop,
    Proceed,
    Erase,
    Retort,
}

impl Template {
    pub fn file_name(&self) -> &'static str {
        match self {
            Template::Default => "default.jpg",
            Template::Parrot => "parrot.jpg",
            Template::Stop => "stop.jpg",
            Template::Proceed => "gogo.png",
            Template::Erase => "rmrf.jpg",
            Template::Retort => "sungmo.jpeg",
        }
    }
}

pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn load(&self, template: Template) -> Result<Vec<u8>> {
        let path = self.dir.join(template.file_name());
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            tracing::error!("Template {} unreadable: {}", path.display(), e);
            Error::Io(e)
        })?;
        ensure_image(&bytes)?;
        Ok(bytes)
    }
}

/// Reject payloads that are not JPEG, PNG, GIF, WebP or BMP.
pub fn ensure_image(bytes: &[u8]) -> Result<()> {
    let known = bytes.starts_with(&[0xff, 0xd8, 0xff])
        || bytes.starts_with(b"\x89PNG\r\n\x1a\n")
        || bytes.starts_with(b"GIF8")
        || (bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP")
        || bytes.starts_with(b"BM");
    if known {
        Ok(())
    } else {
        Err(Error::Image(format!(
            "unrecognised image data ({} bytes)",
            bytes.len()
        )))
    }
}

/// Store or replace the sender's personal image.
pub fn save_personal_image(
    conn: &Connection,
    sender: UserId,
    image: &[u8],
    now: DateTime<FixedOffset>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO personal_images (sender_id, image, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(sender_id) DO UPDATE SET image = excluded.image, updated_at = excluded.updated_at",
        params![sender, image, now.to_rfc3339()],
    )?;
    Ok(())
}

pub fn load_personal_image(conn: &Connection, sender: UserId) -> rusqlite::Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT image FROM personal_images WHERE sender_id = ?1",
        params![sender],
        |row| row.get(0),
    )
    .optional()
}
