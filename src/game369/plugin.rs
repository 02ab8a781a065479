//! 369 chat commands and turns.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::chat::{ChatEvent, Plugin, Reply, RoomId};
use crate::config::Game369Config;
use crate::error::Result;

use super::rules::{GameState, Turn};

const START_TEXT: &str = "🎉 369 게임 시작!\n\
- 숫자 또는 `ㅉ` 로만 보내면 돼.\n\
- 규칙 예시:\n  1 → 1\n  2 → 2\n  3 → ㅉ\n  29 → 29\n  39 → ㅉㅉ\n\
- 나는 중간중간 랜덤 멘트 치면서 같이 참여할 거야 😎\n\n\
먼저 내가 1부터 시작할게 👉";

const HELP_TEXT: &str = "📘 369 게임 도움말\n\
- `/369시작` : 게임 시작 (봇이 1부터 시작)\n\
- `/369끝` : 게임 종료\n\
- `/369상태` : 현재 진행 상황 표시\n\
- 규칙:\n\
  · 3,6,9가 하나도 없으면 숫자 그대로 보내기 (예: 1, 25)\n\
  · 3,6,9가 들어가면 개수만큼 `ㅉ` 보내기 (예: 3→ㅉ, 39→ㅉㅉ)\n\
- 나는 랜덤 멘트 치면서 랜덤 타이밍에 끼어들어 😏";

pub struct Game369Plugin {
    config: Game369Config,
    rooms: Mutex<HashMap<RoomId, GameState>>,
}

impl Game369Plugin {
    pub fn new(config: Game369Config) -> Self {
        Self {
            config,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<RoomId, GameState>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replies for one event, computed under the lock. `None` means not ours.
    fn respond(&self, event: &ChatEvent) -> Option<Vec<String>> {
        let mut rooms = self.rooms();
        match event.command() {
            "/369시작" => {
                let mut rng = rand::rng();
                let first = rooms.entry(event.room).or_default().start(&mut rng);
                tracing::info!(room = event.room, "369 game started");
                Some(vec![START_TEXT.to_string(), first])
            }
            "/369끝" => {
                rooms.remove(&event.room);
                Some(vec!["🛑 369 게임 종료! `/369시작` 으로 다시 시작 가능".to_string()])
            }
            "/369상태" => Some(vec![match rooms.get(&event.room) {
                Some(state) if state.active => format!(
                    "현재 숫자: {}\n(다음은 {} 차례)",
                    state.current,
                    state.current + 1
                ),
                _ => "지금은 369 게임이 꺼져 있어. `/369시작` 으로 시작해줘!".to_string(),
            }]),
            "/369도움말" | "/369" => Some(vec![HELP_TEXT.to_string()]),
            _ if event.is_command() || event.text.trim().is_empty() => None,
            _ => {
                let state = rooms.get_mut(&event.room)?;
                let mut rng = rand::rng();
                let turn = state.play(
                    &event.text,
                    self.config.praise_rate,
                    self.config.join_rate,
                    &mut rng,
                );
                match turn {
                    Turn::Idle => None,
                    Turn::Correct { praise, bot } => Some(praise.into_iter().chain(bot).collect()),
                    Turn::Wrong { expected, answer } => {
                        rooms.remove(&event.room);
                        tracing::info!(room = event.room, expected, "369 game lost");
                        Some(vec![format!(
                            "❌ `{}` 가(이) 틀려서 369 게임 종료!\n\
                             지금은 {} 차례였고, 정답은 `{}` 였어.\n\
                             다시 하려면 `/369시작` 으로 새로 시작해줘 🌀",
                            event.sender.display_name(),
                            expected,
                            answer
                        )])
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Plugin for Game369Plugin {
    fn name(&self) -> &str {
        "game369"
    }

    async fn handle(&self, event: &ChatEvent, reply: &dyn Reply) -> Result<bool> {
        let Some(texts) = self.respond(event) else {
            return Ok(false);
        };
        for text in texts {
            reply.reply_text(&text).await?;
        }
        Ok(true)
    }
}
