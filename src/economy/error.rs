//! Economy failures. Everything except `Database` is shown to the user as-is.

use thiserror::Error;

use crate::chat::text::with_commas;
use crate::error::Error;

fn insufficient(have: &i64, need: &i64) -> String {
    format!(
        "🚫 포인트가 부족합니다.\n보유: 🅟{} / 필요: 🅟{}",
        with_commas(*have),
        with_commas(*need)
    )
}

#[derive(Error, Debug)]
pub enum EconomyError {
    #[error("❓ '{0}'은(는) 상점에 없는 아이템입니다.")]
    UnknownItem(String),

    #[error("{}", insufficient(.have, .need))]
    InsufficientPoints { have: i64, need: i64 },

    #[error("❌ '{0}'은(는) 이미 존재하는 아이템 이름입니다.")]
    DuplicateItem(String),

    #[error("❓ '{0}'은(는) 상점에 등록되지 않은 아이템입니다.")]
    NotListed(String),

    #[error("⚠️ 가격은 0 이상이어야 합니다.")]
    NegativePrice,

    #[error("등록되지 않은 사용자입니다.")]
    UnknownUser,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

impl EconomyError {
    /// The chat reply for a user-facing failure; database errors are handed back
    /// for the router to log.
    pub fn into_reply(self) -> Result<String, Error> {
        match self {
            EconomyError::Database(e) => Err(Error::Database(e)),
            other => Ok(other.to_string()),
        }
    }
}

impl From<EconomyError> for Error {
    fn from(e: EconomyError) -> Self {
        match e {
            EconomyError::Database(e) => Error::Database(e),
            other => Error::Other(other.to_string()),
        }
    }
}
