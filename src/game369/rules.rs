//! 369 counting rules.

use rand::seq::IndexedRandom;
use rand::Rng;

/// Lines the bot uses when it takes a turn. `{answer}` is replaced.
const BOT_LINES: &[&str] = &[
    "[봇] {answer}",
    "[봇] 나도 한 번 껴볼게 → {answer}",
    "[봇] 여기서 내가 받아간다 {answer}",
    "[봇] 조용히… {answer}",
    "[봇] 에이 이건 내가 해야지 {answer}",
    "[봇] 생각보다 쉽네 {answer}",
    "[봇] 눈치게임 실패한 김에 나도 {answer}",
    "[봇] 잠깐, 여기 {answer}",
    "[봇] 오케이 내 차례지? {answer}",
    "[봇] 369 자동완성: {answer}",
    "[봇] 끼어들기 성공 ✋ {answer}",
];

/// The number itself, or one `ㅉ` per 3, 6 or 9 digit.
pub fn answer_for(n: u32) -> String {
    let digits = n.to_string();
    let claps = digits.chars().filter(|c| matches!(c, '3' | '6' | '9')).count();
    if claps == 0 {
        digits
    } else {
        "ㅉ".repeat(claps)
    }
}

/// Digits only when any are present, else only the `ㅉ` characters.
pub fn normalize(text: &str) -> String {
    let text = text.trim();
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        return digits;
    }
    let claps: String = text.chars().filter(|&c| c == 'ㅉ').collect();
    if !claps.is_empty() {
        return claps;
    }
    text.to_string()
}

pub fn bot_line<R: Rng + ?Sized>(answer: &str, rng: &mut R) -> String {
    BOT_LINES
        .choose(rng)
        .copied()
        .unwrap_or("[봇] {answer}")
        .replace("{answer}", answer)
}

/// Per-room game state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    pub active: bool,
    /// Last number said correctly.
    pub current: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// The room has no game running.
    Idle,
    Correct {
        praise: Option<String>,
        bot: Option<String>,
    },
    Wrong {
        expected: u32,
        answer: String,
    },
}

impl GameState {
    /// Reset and let the bot say 1.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        self.active = true;
        self.current = 0;
        self.bot_turn(rng)
    }

    fn bot_turn<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        self.current += 1;
        bot_line(&answer_for(self.current), rng)
    }

    /// Score a chat message. A wrong answer ends the game.
    pub fn play<R: Rng + ?Sized>(&mut self, text: &str, praise_rate: f64, join_rate: f64, rng: &mut R) -> Turn {
        if !self.active {
            return Turn::Idle;
        }
        let expected = self.current + 1;
        let answer = answer_for(expected);
        if normalize(text) != answer {
            *self = GameState::default();
            return Turn::Wrong { expected, answer };
        }

        self.current = expected;
        let praise = rng
            .random_bool(praise_rate)
            .then(|| format!("✅ 정답! 다음은 {}번!", expected + 1));
        let bot = rng.random_bool(join_rate).then(|| self.bot_turn(rng));
        Turn::Correct { praise, bot }
    }
}
