//! Incoming chat events as the host hands them to plugins.

pub type RoomId = i64;
pub type UserId = i64;

/// Message author.
#[derive(Debug, Clone, PartialEq)]
pub struct Sender {
    pub id: UserId,
    pub name: Option<String>,
}

impl Sender {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    /// Nickname, or `User{id}` when the host did not provide one.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("User{}", self.id),
        }
    }
}

/// Image attached to a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    Bytes(Vec<u8>),
    Url(String),
}

/// The message an event replies to, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMessage {
    pub text: String,
    pub image: Option<ImageRef>,
}

/// A single incoming chat message.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub room: RoomId,
    pub sender: Sender,
    pub text: String,
    pub source: Option<SourceMessage>,
}

impl ChatEvent {
    pub fn new(room: RoomId, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            room,
            sender,
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: SourceMessage) -> Self {
        self.source = Some(source);
        self
    }

    /// First whitespace-separated token, e.g. `/파티`.
    pub fn command(&self) -> &str {
        self.text.split_whitespace().next().unwrap_or("")
    }

    /// Everything after the command, trimmed.
    pub fn param(&self) -> &str {
        let text = self.text.trim_start();
        match text.find(char::is_whitespace) {
            Some(idx) => text[idx..].trim(),
            None => "",
        }
    }

    /// Whitespace-separated tokens of [`ChatEvent::param`].
    pub fn args(&self) -> Vec<String> {
        self.param().split_whitespace().map(String::from).collect()
    }

    pub fn is_command(&self) -> bool {
        matches!(self.text.trim_start().chars().next(), Some('/') | Some('!'))
    }
}
