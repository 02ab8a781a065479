//! Party command failures. The display strings are the chat replies.

use thiserror::Error;

use super::model::{Party, PartyId};

#[derive(Error, Debug)]
pub enum PartyError {
    #[error("시간 형식이 올바르지 않아요. `21:30` 또는 분 단위 숫자(예: 30)로 적어 주세요.")]
    InvalidTimeFormat,

    #[error("이미 만든 파티가 있어요.")]
    DuplicateParty { existing: Option<Box<Party>> },

    #[error("모집 중인 파티가 없어요.")]
    NoParties,

    #[error("해당 ID의 파티가 없어요.")]
    PartyNotFound(Option<PartyId>),

    #[error("파티가 여러 개 있어요.")]
    AmbiguousParty { parties: Vec<Party> },

    #[error("이미 참가한 파티예요.")]
    AlreadyJoined { party: Box<Party> },

    #[error("⚠️ 이미 인원이 가득 찼어요! ({capacity}/{capacity})")]
    PartyFull { capacity: usize },

    #[error("당신이 만든 파티가 없어요.")]
    NotOwner,

    #[error("⚠️ 파티장은 추방할 수 없습니다. 파티를 없애려면 `/파티삭제`를 해주세요.")]
    CannotKickOwner,

    #[error("{0}번 멤버가 존재하지 않습니다.")]
    MemberNotFound(usize),

    #[error("참가 중인 파티가 없어요.")]
    NotJoined,
}
