//! Console host: drive the plugins from stdin and print replies to stdout.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::meme::layout::MemeImage;

use super::event::{ChatEvent, RoomId, Sender, UserId};
use super::reply::{Announcer, Reply};
use super::router::Router;

/// Prints replies for one room.
pub struct ConsoleReply {
    room: RoomId,
    image_dir: PathBuf,
}

impl ConsoleReply {
    pub fn new(room: RoomId, image_dir: PathBuf) -> Self {
        Self { room, image_dir }
    }
}

#[async_trait]
impl Reply for ConsoleReply {
    async fn reply_text(&self, text: &str) -> Result<()> {
        println!("[room {}] bot:\n{}\n", self.room, text);
        Ok(())
    }

    async fn reply_image(&self, image: MemeImage) -> Result<()> {
        tokio::fs::create_dir_all(&self.image_dir).await?;
        let path = self
            .image_dir
            .join(format!("meme-{}.img", chrono::Utc::now().timestamp_millis()));
        tokio::fs::write(&path, &image.background).await?;
        println!("[room {}] bot sent an image (background: {})", self.room, path.display());
        for layer in &image.layers {
            println!("  layer {:?} {:?}: {}", layer.anchor, layer.fill, layer.text);
        }
        println!();
        Ok(())
    }
}

/// Prints room announcements.
pub struct ConsoleAnnouncer;

#[async_trait]
impl Announcer for ConsoleAnnouncer {
    async fn announce(&self, room: RoomId, text: &str) -> Result<()> {
        println!("[room {}] announcement:\n{}\n", room, text);
        Ok(())
    }
}

/// Control lines understood by the console host.
#[derive(Debug, PartialEq)]
enum ConsoleLine {
    SwitchUser(UserId, String),
    SwitchRoom(RoomId),
    Quit,
    Message(String),
    Empty,
}

fn parse_line(line: &str) -> ConsoleLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleLine::Empty;
    }
    let mut parts = trimmed.splitn(3, ' ');
    match parts.next() {
        Some(":quit") | Some(":q") => ConsoleLine::Quit,
        Some(":as") => {
            let id = parts.next().and_then(|s| s.parse().ok());
            let name = parts.next().map(str::trim).filter(|s| !s.is_empty());
            match (id, name) {
                (Some(id), Some(name)) => ConsoleLine::SwitchUser(id, name.to_string()),
                _ => ConsoleLine::Message(trimmed.to_string()),
            }
        }
        Some(":room") => match parts.next().and_then(|s| s.parse().ok()) {
            Some(room) => ConsoleLine::SwitchRoom(room),
            None => ConsoleLine::Message(trimmed.to_string()),
        },
        _ => ConsoleLine::Message(trimmed.to_string()),
    }
}

/// Read messages from stdin until EOF or `:quit`.
pub async fn run_console(router: &Router, room: RoomId, sender: Sender, image_dir: PathBuf) -> Result<()> {
    let mut room = room;
    let mut sender = sender;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "irisbot console. Room {}, speaking as {} ({}). `:as <id> <name>`, `:room <id>`, `:quit`.",
        room,
        sender.display_name(),
        sender.id
    );

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            ConsoleLine::Empty => continue,
            ConsoleLine::Quit => break,
            ConsoleLine::SwitchUser(id, name) => {
                sender = Sender::new(id, name);
                println!("Now speaking as {} ({})", sender.display_name(), sender.id);
            }
            ConsoleLine::SwitchRoom(id) => {
                room = id;
                println!("Now in room {}", room);
            }
            ConsoleLine::Message(text) => {
                let event = ChatEvent::new(room, sender.clone(), text);
                let reply = ConsoleReply::new(room, image_dir.clone());
                if !router.route(&event, &reply).await {
                    tracing::debug!("No plugin handled: {}", event.text);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_control_lines() {
        assert_eq!(parse_line(":as 5 영희"), ConsoleLine::SwitchUser(5, "영희".to_string()));
        assert_eq!(parse_line(":as 5 김 영희"), ConsoleLine::SwitchUser(5, "김 영희".to_string()));
        assert_eq!(parse_line(":room 12"), ConsoleLine::SwitchRoom(12));
        assert_eq!(parse_line(":q"), ConsoleLine::Quit);
        assert_eq!(parse_line("   "), ConsoleLine::Empty);
        assert_eq!(parse_line(":as x"), ConsoleLine::Message(":as x".to_string()));
        assert_eq!(parse_line("/파티 10"), ConsoleLine::Message("/파티 10".to_string()));
    }
}
