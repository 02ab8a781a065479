//! Party records.

use chrono::{DateTime, FixedOffset};

use crate::chat::{RoomId, UserId};

pub type PartyId = u32;

/// Party kind decides the default title and capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyKind {
    Normal,
    Raid,
}

impl PartyKind {
    pub fn label(&self) -> &'static str {
        match self {
            PartyKind::Normal => "일반 파티",
            PartyKind::Raid => "레이드 파티",
        }
    }

    pub fn short_label(&self) -> &'static str {
        match self {
            PartyKind::Normal => "일반",
            PartyKind::Raid => "레이드",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            PartyKind::Normal => "파티",
            PartyKind::Raid => "레이드 파티",
        }
    }

    pub fn default_title(&self) -> &'static str {
        self.noun()
    }
}

/// Chat users join themselves; guests are names the owner added by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberId {
    User(UserId),
    Guest(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    /// Character class (직업).
    pub class: Option<String>,
    /// Main character (본캐) or alt (부캐).
    pub is_main: bool,
}

impl Member {
    pub fn role_label(&self) -> &'static str {
        if self.is_main {
            "본케"
        } else {
            "부케"
        }
    }
}

/// A scheduled group signup.
#[derive(Debug, Clone)]
pub struct Party {
    pub id: PartyId,
    pub room: RoomId,
    pub title: String,
    pub kind: PartyKind,
    pub capacity: usize,
    pub scheduled_at: DateTime<FixedOffset>,
    pub owner_id: UserId,
    pub owner_name: String,
    /// Ordered; the first entry is the owner.
    pub members: Vec<Member>,
    pub(crate) timer_token: u64,
    pub(crate) next_guest: u32,
}

impl Party {
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    pub fn member_index(&self, user: UserId) -> Option<usize> {
        self.members.iter().position(|m| m.id == MemberId::User(user))
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.member_index(user).is_some()
    }

    pub fn is_owner(&self, user: UserId) -> bool {
        self.owner_id == user
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Parse a main/alt token: `본 본캐 m main` or `부 부캐 s sub alt`.
pub fn parse_main_flag(token: &str) -> Option<bool> {
    match token.trim().to_lowercase().as_str() {
        "본" | "본캐" | "m" | "main" => Some(true),
        "부" | "부캐" | "s" | "sub" | "alt" => Some(false),
        _ => None,
    }
}

/// Pick the class (first non-flag token) and the last main/alt flag.
pub fn extract_class_and_main(tokens: &[String]) -> (Option<String>, Option<bool>) {
    let mut class = None;
    let mut main = None;
    for token in tokens {
        match parse_main_flag(token) {
            Some(flag) => main = Some(flag),
            None if class.is_none() => class = Some(token.clone()),
            None => {}
        }
    }
    (class, main)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn main_flags() {
        assert_eq!(parse_main_flag("본캐"), Some(true));
        assert_eq!(parse_main_flag("MAIN"), Some(true));
        assert_eq!(parse_main_flag("alt"), Some(false));
        assert_eq!(parse_main_flag("도적"), None);
    }

    #[test]
    fn class_and_flag_extraction() {
        assert_eq!(
            extract_class_and_main(&toks("도적 부")),
            (Some("도적".to_string()), Some(false))
        );
        assert_eq!(
            extract_class_and_main(&toks("본 전사 궁수")),
            (Some("전사".to_string()), Some(true))
        );
        assert_eq!(extract_class_and_main(&[]), (None, None));
    }
}
