//! Party chat commands.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};

use crate::chat::{ChatEvent, Plugin, Reply};
use crate::error::Result;

use super::error::PartyError;
use super::format;
use super::model::{parse_main_flag, PartyId, PartyKind};
use super::registry::{JoinOutcome, JoinTarget, NewParty, PartyRegistry};
use super::time_spec::TimeSpec;

const USAGE_CREATE: &str = "사용법: `/파티 시간 [제목] [직업] [본/부]`\n시간은 `21:30` 또는 분 단위 숫자(예: 30)";
const USAGE_ADD: &str = "사용법: `/파티멤버추가 닉네임 [직업] [본/부]`";
const USAGE_KICK: &str = "사용법: `/파티추방 번호` (예: /파티추방 2)";
const NEED_OWN_PARTY: &str = "먼저 `/파티 시간 제목` 으로 파티를 만들어 주세요.";

/// Split create arguments after the time token into title, class and flag.
/// Trailing main/alt flags are taken off first; with two or more tokens left
/// the last one is the class.
fn parse_create_rest(tokens: &[String]) -> (Option<String>, Option<String>, Option<bool>) {
    let mut rest = tokens.to_vec();
    let mut main = None;
    while let Some(last) = rest.last() {
        match parse_main_flag(last) {
            Some(flag) => {
                main.get_or_insert(flag);
                rest.pop();
            }
            None => break,
        }
    }

    match rest.len() {
        0 => (None, None, main),
        1 => (rest.pop(), None, main),
        _ => {
            let class = rest.pop();
            (Some(rest.join(" ")), class, main)
        }
    }
}

fn join_target(args: &[String]) -> (JoinTarget, &[String]) {
    match args.split_first() {
        None => (JoinTarget::Unspecified, args),
        Some((first, rest)) if first.chars().all(|c| c.is_ascii_digit()) => match first.parse::<PartyId>() {
            Ok(id) => (JoinTarget::Id(id), rest),
            Err(_) => (JoinTarget::Id(0), rest),
        },
        Some((first, rest)) => (JoinTarget::Word(first.clone()), rest),
    }
}

/// Reply text for an error, shared by every command.
fn render_error(err: &PartyError, named: bool) -> String {
    match err {
        PartyError::DuplicateParty { existing } => format::duplicate(existing.as_deref()),
        PartyError::PartyNotFound(_) => format::party_not_found(),
        PartyError::AmbiguousParty { parties } => format::ambiguous(parties, named),
        PartyError::AlreadyJoined { party } => format::already_joined(party),
        other => other.to_string(),
    }
}

/// `/파티`, `/레이드파티`, `/참가` and friends.
pub struct PartyPlugin {
    registry: Arc<PartyRegistry>,
    tz: FixedOffset,
}

impl PartyPlugin {
    pub fn new(registry: Arc<PartyRegistry>, tz: FixedOffset) -> Self {
        Self { registry, tz }
    }

    async fn create(&self, event: &ChatEvent, kind: PartyKind) -> String {
        let args = event.args();
        let Some((time, rest)) = args.split_first() else {
            return USAGE_CREATE.to_string();
        };
        let time: TimeSpec = match time.parse() {
            Ok(t) => t,
            Err(e) => return render_error(&e, false),
        };
        let (title, class, main) = parse_create_rest(rest);
        let request = NewParty {
            kind,
            time,
            title,
            class,
            is_main: main.unwrap_or(true),
        };
        let now = Utc::now().with_timezone(&self.tz);
        match self.registry.create(event.room, &event.sender, request, now).await {
            Ok(party) => format::created(&party),
            Err(e) => render_error(&e, false),
        }
    }

    async fn join(&self, event: &ChatEvent, reply: &dyn Reply) -> Result<()> {
        let args = event.args();
        let (target, extra) = join_target(&args);
        let named = matches!(target, JoinTarget::Word(_));
        match self.registry.join(event.room, &event.sender, target, extra).await {
            Ok(outcome) => {
                reply.reply_text(&format::join_outcome(&outcome)).await?;
                if let JoinOutcome::Joined {
                    party,
                    became_full: true,
                    ..
                } = &outcome
                {
                    reply.reply_text(&format::full(party)).await?;
                }
            }
            Err(e) => reply.reply_text(&render_error(&e, named)).await?,
        }
        Ok(())
    }

    async fn status(&self, event: &ChatEvent) -> String {
        match self.registry.status(event.room).await {
            Ok(parties) => format::status(&parties),
            Err(PartyError::NoParties) => "현재 모집 중인 파티가 없어요.".to_string(),
            Err(e) => render_error(&e, false),
        }
    }

    async fn leave(&self, event: &ChatEvent) -> String {
        match self.registry.leave(event.room, event.sender.id).await {
            Ok(summary) => format::leave_summary(&summary),
            Err(e) => render_error(&e, false),
        }
    }

    async fn delete(&self, event: &ChatEvent) -> String {
        match self.registry.delete(event.room, event.sender.id).await {
            Ok(_) => "🛑 당신이 만든 파티를 삭제했어요.".to_string(),
            Err(PartyError::NoParties) => "삭제할 파티가 없어요.".to_string(),
            Err(e) => render_error(&e, false),
        }
    }

    async fn add_member(&self, event: &ChatEvent, reply: &dyn Reply) -> Result<()> {
        let args = event.args();
        let Some((name, extra)) = args.split_first() else {
            return reply.reply_text(USAGE_ADD).await;
        };
        match self.registry.add_member(event.room, event.sender.id, name, extra).await {
            Ok((party, became_full)) => {
                let table = format::party_table(&party);
                reply
                    .reply_text(&format!("✅ `{}` 님을 추가했어요.\n\n{}", name, table))
                    .await?;
                if became_full {
                    reply.reply_text(&format::full(&party)).await?;
                }
                Ok(())
            }
            Err(PartyError::NotOwner) => reply.reply_text(NEED_OWN_PARTY).await,
            Err(e) => reply.reply_text(&render_error(&e, false)).await,
        }
    }

    async fn kick(&self, event: &ChatEvent) -> String {
        let param = event.param();
        let index: usize = match param.parse() {
            Ok(i) if param.chars().all(|c| c.is_ascii_digit()) => i,
            _ => return USAGE_KICK.to_string(),
        };
        match self.registry.kick(event.room, event.sender.id, index).await {
            Ok((removed, party)) => format!(
                "🚫 `{}` 님을 파티에서 추방했어요.\n\n{}",
                removed.name,
                format::party_table(&party)
            ),
            Err(PartyError::NotOwner) => "추방할 파티가 없거나, 파티장이 아니에요.".to_string(),
            Err(e) => render_error(&e, false),
        }
    }

    async fn promote(&self, event: &ChatEvent) -> String {
        match self.registry.promote(event.room, event.sender.id).await {
            Ok(party) => {
                let name = event.sender.display_name();
                let requester = (!party.is_owner(event.sender.id)).then_some(name.as_str());
                format::promotion(&party, requester)
            }
            Err(PartyError::NoParties) => NEED_OWN_PARTY.to_string(),
            Err(PartyError::NotJoined) => {
                "현재 홍보할 수 있는 파티가 없어요.\n(파티에 먼저 참가해 주세요)".to_string()
            }
            Err(e) => render_error(&e, false),
        }
    }
}

#[async_trait]
impl Plugin for PartyPlugin {
    fn name(&self) -> &str {
        "party"
    }

    async fn handle(&self, event: &ChatEvent, reply: &dyn Reply) -> Result<bool> {
        let text = match event.command() {
            "/파티" => self.create(event, PartyKind::Normal).await,
            "/레이드파티" => self.create(event, PartyKind::Raid).await,
            "/파티참가" | "/파티참여" | "/참가" | "/참여" => {
                self.join(event, reply).await?;
                return Ok(true);
            }
            "/파티목록" | "/파티현황" => self.status(event).await,
            "/파티탈퇴" | "/파티취소" => self.leave(event).await,
            "/파티삭제" => self.delete(event).await,
            "/파티멤버추가" => {
                self.add_member(event, reply).await?;
                return Ok(true);
            }
            "/파티추방" => self.kick(event).await,
            "/파티홍보" => self.promote(event).await,
            "/파티도움말" | "/파티명령어" => format::help(),
            _ => return Ok(false),
        };
        reply.reply_text(&text).await?;
        Ok(true)
    }
}
