//! Points, shop and lottery chat commands.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use crate::chat::{ChatEvent, Plugin, Reply};
use crate::config::{EconomyConfig, LotteryConfig, Settings};
use crate::db::Database;
use crate::error::Result;

use super::error::EconomyError;
use super::{lottery, shop, users};

const USAGE_BUY: &str = "⚠️ 구매하실 아이템 이름을 입력해주세요.\n예: /구매 확성기";
const USAGE_ADD: &str = "⚠️ 형식: /상점추가 [이름] [가격] [설명]\n예: /상점추가 포션 500 체력을 회복합니다.";
const USAGE_REMOVE: &str = "⚠️ 삭제할 아이템 이름을 입력해주세요.\n예: /상점삭제 경험치부스터";

/// Commands this plugin answers. Admin-only ones are included.
fn is_economy_command(command: &str) -> bool {
    matches!(
        command,
        "ㅊㅊ" | "/ㅊㅊ" | "!ㅊㅊ" | "/내정보" | "/복권자동" | "/복권정보" | "/상점" | "/구매" | "/상점추가" | "/상점삭제"
    )
}

fn reply_text(result: std::result::Result<String, EconomyError>) -> Result<String> {
    match result {
        Ok(text) => Ok(text),
        Err(e) => e.into_reply(),
    }
}

/// Registers every sender, then serves the economy commands.
pub struct EconomyPlugin {
    db: Arc<Database>,
    tz: FixedOffset,
    admin_ids: Vec<i64>,
    economy: EconomyConfig,
    lottery: LotteryConfig,
}

impl EconomyPlugin {
    pub fn new(db: Arc<Database>, settings: &Settings) -> Self {
        Self {
            db,
            tz: settings.timezone(),
            admin_ids: settings.admin_ids.clone(),
            economy: settings.economy.clone(),
            lottery: settings.lottery.clone(),
        }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz)
    }

    fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    fn check_in(&self, user_id: i64) -> Result<String> {
        let today = self.now().date_naive();
        let reward = self.economy.checkin_reward;
        reply_text(
            self.db
                .transaction(|c| users::check_in(c, user_id, today, reward))
                .map(|r| users::format_check_in(&r)),
        )
    }

    fn profile(&self, user_id: i64) -> Result<String> {
        reply_text(
            self.db
                .with_conn(|c| users::profile(c, user_id))
                .map(|p| users::format_profile(&p)),
        )
    }

    fn issue_ticket(&self, event: &ChatEvent) -> Result<String> {
        let today = self.now().date_naive();
        let mut rng = rand::rng();
        let outcome = self
            .db
            .transaction(|c| lottery::issue_ticket(c, event.sender.id, event.room, today, &mut rng));
        reply_text(outcome.map(|o| lottery::format_issue(&o, &self.lottery.draw_time)))
    }

    fn lottery_info(&self) -> Result<String> {
        let pending = self.db.with_conn(lottery::pending_count)?;
        Ok(lottery::format_info(&self.lottery, pending))
    }

    fn shop(&self) -> Result<String> {
        let items = self.db.with_conn(shop::list_items)?;
        Ok(shop::format_items(&items))
    }

    fn buy(&self, event: &ChatEvent) -> Result<String> {
        let name = event.param();
        if name.is_empty() {
            return Ok(USAGE_BUY.to_string());
        }
        let now = self.now();
        reply_text(
            self.db
                .transaction(|c| shop::purchase(c, event.sender.id, name, now))
                .map(|p| shop::format_purchase(&p)),
        )
    }

    fn add_item(&self, event: &ChatEvent) -> Result<String> {
        let parts: Vec<&str> = event.param().splitn(3, char::is_whitespace).collect();
        if parts.len() < 3 || parts[2].trim().is_empty() {
            return Ok(USAGE_ADD.to_string());
        }
        let Ok(price) = parts[1].parse::<i64>() else {
            return Ok("⚠️ 가격은 숫자로 입력해주세요.".to_string());
        };
        let (name, description) = (parts[0], parts[2].trim());
        reply_text(self.db.with_conn(|c| shop::add_item(c, name, price, description)).map(|item| {
            format!(
                "✅ 새 아이템이 등록되었습니다!\n📦 {} (🅟{})\n📝 {}",
                item.name,
                crate::chat::text::with_commas(item.price),
                item.description
            )
        }))
    }

    fn remove_item(&self, event: &ChatEvent) -> Result<String> {
        let name = event.param();
        if name.is_empty() {
            return Ok(USAGE_REMOVE.to_string());
        }
        reply_text(
            self.db
                .with_conn(|c| shop::remove_item(c, name))
                .map(|_| format!("🗑️ 아이템 '{}'이(가) 상점에서 영구 삭제되었습니다.", name)),
        )
    }
}

#[async_trait]
impl Plugin for EconomyPlugin {
    fn name(&self) -> &str {
        "economy"
    }

    async fn handle(&self, event: &ChatEvent, reply: &dyn Reply) -> Result<bool> {
        let now = self.now();
        let name = event.sender.display_name();
        let registration = self
            .db
            .transaction(|c| users::get_or_create_user(c, event.sender.id, &name, now));
        match registration {
            Ok(registration) => {
                if let Some(old) = &registration.renamed_from {
                    reply.reply_text(&users::rename_notice(old, &name)).await?;
                }
            }
            // Other plugins do not need the user row, so only our own commands fail.
            Err(e) if !is_economy_command(event.command()) => {
                tracing::error!(user = event.sender.id, "Failed to register sender: {}", e);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        let text = match event.command() {
            "ㅊㅊ" | "/ㅊㅊ" | "!ㅊㅊ" => self.check_in(event.sender.id)?,
            "/내정보" => self.profile(event.sender.id)?,
            "/복권자동" => self.issue_ticket(event)?,
            "/복권정보" => self.lottery_info()?,
            "/상점" => self.shop()?,
            "/구매" => self.buy(event)?,
            "/상점추가" | "/상점삭제" if !self.is_admin(event.sender.id) => {
                tracing::debug!(user = event.sender.id, "Ignoring shop admin command from non-admin");
                return Ok(false);
            }
            "/상점추가" => self.add_item(event)?,
            "/상점삭제" => self.remove_item(event)?,
            _ => return Ok(false),
        };
        reply.reply_text(&text).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::RecordingReply;
    use crate::chat::Sender;

    fn plugin() -> EconomyPlugin {
        let settings = Settings {
            admin_ids: vec![99],
            ..Settings::default()
        };
        EconomyPlugin::new(Arc::new(Database::open_in_memory().unwrap()), &settings)
    }

    fn ev(user: i64, name: &str, text: &str) -> ChatEvent {
        ChatEvent::new(1, Sender::new(user, name), text)
    }

    #[tokio::test]
    async fn check_in_twice() {
        let plugin = plugin();
        let reply = RecordingReply::default();

        assert!(plugin.handle(&ev(1, "철수", "ㅊㅊ"), &reply).await.unwrap());
        assert!(reply.last_text().starts_with("✅ 출석 완료! (🅟10)"));
        assert!(plugin.handle(&ev(1, "철수", "/ㅊㅊ"), &reply).await.unwrap());
        assert!(reply.last_text().starts_with("⚠️ 이미 출석했습니다."));

        plugin.handle(&ev(1, "철수", "/내정보"), &reply).await.unwrap();
        assert!(reply.last_text().contains("• 보유 포인트 : 🅟10"));
    }

    #[tokio::test]
    async fn plain_chat_registers_and_passes_through() {
        let plugin = plugin();
        let reply = RecordingReply::default();

        assert!(!plugin.handle(&ev(1, "철수", "안녕"), &reply).await.unwrap());
        assert!(reply.texts().is_empty());

        assert!(!plugin.handle(&ev(1, "철수 [전사]", "반가워"), &reply).await.unwrap());
        assert_eq!(reply.last_text(), "📝 닉네임 변경 감지\n[철수] ➜ [철수 [전사]]");
    }

    #[tokio::test]
    async fn shop_admin_and_purchase() {
        let plugin = plugin();
        let reply = RecordingReply::default();

        assert!(!plugin
            .handle(&ev(1, "철수", "/상점추가 포션 5 회복"), &reply)
            .await
            .unwrap());
        assert!(reply.texts().is_empty());

        plugin.handle(&ev(99, "관리자", "/상점추가 포션 5 체력을 회복합니다"), &reply).await.unwrap();
        assert!(reply.last_text().starts_with("✅ 새 아이템이 등록되었습니다!"));
        plugin.handle(&ev(99, "관리자", "/상점추가 포션 이백 중복"), &reply).await.unwrap();
        assert_eq!(reply.last_text(), "⚠️ 가격은 숫자로 입력해주세요.");
        plugin.handle(&ev(99, "관리자", "/상점추가 공짜 -500 포인트 복사"), &reply).await.unwrap();
        assert_eq!(reply.last_text(), "⚠️ 가격은 0 이상이어야 합니다.");

        plugin.handle(&ev(1, "철수", "/구매 포션"), &reply).await.unwrap();
        assert!(reply.last_text().starts_with("🚫 포인트가 부족합니다."));

        plugin.handle(&ev(1, "철수", "ㅊㅊ"), &reply).await.unwrap();
        plugin.handle(&ev(1, "철수", "/구매 포션"), &reply).await.unwrap();
        assert_eq!(
            reply.last_text(),
            "🛍️ 구매 완료: [포션]\n결제 금액: 🅟5\n남은 포인트: 🅟5"
        );

        plugin.handle(&ev(1, "철수", "/상점"), &reply).await.unwrap();
        assert!(reply.last_text().contains("📦 포션 - 🅟5"));

        plugin.handle(&ev(99, "관리자", "/상점삭제 포션"), &reply).await.unwrap();
        assert!(reply.last_text().starts_with("🗑️"));
        plugin.handle(&ev(1, "철수", "/구매 포션"), &reply).await.unwrap();
        assert_eq!(reply.last_text(), "❓ '포션'은(는) 상점에 없는 아이템입니다.");
    }

    #[tokio::test]
    async fn registration_failure_only_fails_economy_commands() {
        let plugin = plugin();
        plugin.db.with_conn(|c| c.execute_batch("DROP TABLE users")).unwrap();
        let reply = RecordingReply::default();

        assert!(!plugin.handle(&ev(1, "철수", "/파티 30"), &reply).await.unwrap());
        assert!(plugin.handle(&ev(1, "철수", "ㅊㅊ"), &reply).await.is_err());
        assert!(reply.texts().is_empty());
    }

    #[tokio::test]
    async fn lottery_commands() {
        let plugin = plugin();
        let reply = RecordingReply::default();

        plugin.handle(&ev(1, "철수", "/복권자동"), &reply).await.unwrap();
        assert!(reply.last_text().starts_with("🎲 복권 발행 완료: ["));
        plugin.handle(&ev(1, "철수", "/복권자동"), &reply).await.unwrap();
        assert!(reply.last_text().starts_with("🎫 이미 추첨 대기 중인 복권이 있습니다."));

        plugin.handle(&ev(2, "영희", "/복권정보"), &reply).await.unwrap();
        assert!(reply.last_text().contains("현재 1명이 참여 중입니다."));
    }
}
