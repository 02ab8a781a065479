//! Three-digit lottery: ticket issue and the per-room draw.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::chat::RoomId;
use crate::config::LotteryConfig;

use super::error::EconomyError;

/// Attempts at finding a code nobody holds before settling for any code.
const UNTAKEN_ATTEMPTS: usize = 1000;

/// A code in `000..=999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LottoCode(u16);

impl LottoCode {
    pub fn new(value: u16) -> Option<Self> {
        (value <= 999).then_some(Self(value))
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.random_range(0..=999))
    }

    fn digits(self) -> [u16; 3] {
        [self.0 / 100, self.0 / 10 % 10, self.0 % 10]
    }

    /// Digits equal at the same position.
    pub fn matches(self, other: LottoCode) -> usize {
        self.digits()
            .iter()
            .zip(other.digits().iter())
            .filter(|(a, b)| a == b)
            .count()
    }
}

impl fmt::Display for LottoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl FromStr for LottoCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 3 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid lotto code: {:?}", s));
        }
        s.parse::<u16>()
            .ok()
            .and_then(LottoCode::new)
            .ok_or_else(|| format!("invalid lotto code: {:?}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IssueOutcome {
    Issued(LottoCode),
    /// The user already holds a pending ticket.
    Existing(LottoCode),
}

/// One pending ticket per user, across rooms.
pub fn issue_ticket<R: Rng + ?Sized>(
    conn: &Connection,
    user_id: i64,
    room: RoomId,
    today: NaiveDate,
    rng: &mut R,
) -> Result<IssueOutcome, EconomyError> {
    let pending: Option<String> = conn
        .query_row(
            "SELECT numbers FROM lotto WHERE user_id = ?1 AND is_drawn = 0 ORDER BY id LIMIT 1",
            params![user_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(code) = pending.and_then(|s| s.parse().ok()) {
        return Ok(IssueOutcome::Existing(code));
    }

    let code = LottoCode::random(rng);
    conn.execute(
        "INSERT INTO lotto (user_id, lotto_date, numbers, room_id, is_drawn) VALUES (?1, ?2, ?3, ?4, 0)",
        params![user_id, today.to_string(), code.to_string(), room.to_string()],
    )?;
    tracing::info!(user = user_id, room, code = %code, "Lotto ticket issued");
    Ok(IssueOutcome::Issued(code))
}

pub fn pending_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM lotto WHERE is_drawn = 0", [], |r| r.get(0))
}

pub fn format_issue(outcome: &IssueOutcome, draw_time: &str) -> String {
    match outcome {
        IssueOutcome::Issued(code) => format!("🎲 복권 발행 완료: [{}]\n(행운을 빕니다!)", code),
        IssueOutcome::Existing(code) => format!(
            "🎫 이미 추첨 대기 중인 복권이 있습니다.\n번호: [{}]\n(매일 {} 당첨 결과를 공개!)",
            code, draw_time
        ),
    }
}

pub fn format_info(config: &LotteryConfig, pending: i64) -> String {
    format!(
        "**복권 시스템 정보**\n\n1등 상금: {}P\n2등 상금: {}P\n\n현재 {}명이 참여 중입니다.",
        config.first_prize, config.second_prize, pending
    )
}

#[derive(Debug, Clone)]
struct Ticket {
    user_id: i64,
    name: String,
    code: LottoCode,
}

/// Result of one room's draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomDraw {
    pub room: String,
    pub winning: LottoCode,
    pub first: Vec<String>,
    pub second: Vec<String>,
    pub ticket_count: usize,
}

/// Each ticket in order gets `jackpot_chance` to lend its code as the winning
/// one. Otherwise the winning code is one nobody holds, when such a code turns up.
pub fn pick_winning_code<R: Rng + ?Sized>(held: &[LottoCode], jackpot_chance: f64, rng: &mut R) -> LottoCode {
    for code in held {
        if rng.random_bool(jackpot_chance) {
            return *code;
        }
    }
    let taken: HashSet<LottoCode> = held.iter().copied().collect();
    for _ in 0..UNTAKEN_ATTEMPTS {
        let code = LottoCode::random(rng);
        if !taken.contains(&code) {
            return code;
        }
    }
    LottoCode::random(rng)
}

fn pending_rooms(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT room_id FROM lotto WHERE is_drawn = 0 AND room_id IS NOT NULL AND room_id != '' ORDER BY room_id",
    )?;
    let rooms = stmt
        .query_map([], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(rooms)
}

fn room_tickets(conn: &Connection, room: &str) -> rusqlite::Result<Vec<Ticket>> {
    let mut stmt = conn.prepare(
        "SELECT l.user_id, l.numbers, u.name FROM lotto l \
         JOIN users u ON l.user_id = u.user_id \
         WHERE l.room_id = ?1 AND l.is_drawn = 0 ORDER BY l.id",
    )?;
    let rows = stmt
        .query_map(params![room], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut tickets = Vec::with_capacity(rows.len());
    for (user_id, numbers, name) in rows {
        match numbers.as_deref().map(str::parse::<LottoCode>) {
            Some(Ok(code)) => tickets.push(Ticket {
                user_id,
                name: name.unwrap_or_else(|| format!("User{}", user_id)),
                code,
            }),
            _ => tracing::warn!(user = user_id, room, "Skipping malformed lotto ticket {:?}", numbers),
        }
    }
    Ok(tickets)
}

/// Draw every room with pending tickets, pay prizes and mark all pending tickets
/// drawn. Run inside a transaction.
pub fn draw<R: Rng + ?Sized>(
    conn: &Connection,
    config: &LotteryConfig,
    rng: &mut R,
) -> Result<Vec<RoomDraw>, EconomyError> {
    let mut results = Vec::new();

    for room in pending_rooms(conn)? {
        let tickets = room_tickets(conn, &room)?;
        let held: Vec<LottoCode> = tickets.iter().map(|t| t.code).collect();
        let winning = pick_winning_code(&held, config.jackpot_chance, rng);

        let mut first = Vec::new();
        let mut second = Vec::new();
        for ticket in &tickets {
            let prize = match ticket.code.matches(winning) {
                3 => {
                    first.push(ticket.name.clone());
                    config.first_prize
                }
                2 => {
                    second.push(ticket.name.clone());
                    config.second_prize
                }
                _ => continue,
            };
            conn.execute(
                "UPDATE users SET points = points + ?1 WHERE user_id = ?2",
                params![prize, ticket.user_id],
            )?;
        }

        tracing::info!(
            room = %room,
            winning = %winning,
            tickets = tickets.len(),
            first = first.len(),
            second = second.len(),
            "Lottery drawn"
        );
        results.push(RoomDraw {
            room,
            winning,
            first,
            second,
            ticket_count: tickets.len(),
        });
    }

    conn.execute("UPDATE lotto SET is_drawn = 1 WHERE is_drawn = 0", [])?;
    Ok(results)
}

pub fn format_draw(result: &RoomDraw, config: &LotteryConfig) -> String {
    let mut lines = vec![
        format!("당첨번호 : {}", result.winning),
        String::new(),
        "[ 당첨자 명단 ]".to_string(),
        String::new(),
    ];

    if result.first.is_empty() && result.second.is_empty() {
        lines.push(format!("행운의 복권 {}명 추첨 결과", result.ticket_count));
        lines.push("────────".to_string());
        lines.push("'푸헤헤헤. 다음 기회에' 로 ".to_string());
        return lines.join("\n");
    }

    if !result.first.is_empty() {
        lines.push("* 1등 *".to_string());
        lines.extend(result.first.iter().map(|n| format!("🎉 {}", n)));
        lines.push(String::new());
    }
    if !result.second.is_empty() {
        lines.push("* 2등 *".to_string());
        lines.extend(result.second.iter().map(|n| format!("• {}", n)));
        lines.push(String::new());
    }
    lines.push(String::new());
    lines.push("축하합니다!".to_string());
    lines.push(format!("1등 당첨자 : 🅟{}", config.first_prize));
    lines.push(format!("2등 당첨자 : 🅟{}", config.second_prize));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::economy::users::{find_user, get_or_create_user};
    use chrono::{FixedOffset, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn code(s: &str) -> LottoCode {
        s.parse().unwrap()
    }

    fn seed_users(db: &Database, users: &[(i64, &str)]) {
        let now = FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
            .unwrap();
        db.with_conn(|c| {
            for (id, name) in users {
                get_or_create_user(c, *id, name, now)?;
            }
            Ok::<_, EconomyError>(())
        })
        .unwrap();
    }

    fn insert_ticket(db: &Database, user: i64, room: &str, numbers: &str) {
        db.with_conn(|c| {
            c.execute(
                "INSERT INTO lotto (user_id, lotto_date, numbers, room_id, is_drawn) VALUES (?1, '2026-03-10', ?2, ?3, 0)",
                params![user, numbers, room],
            )
        })
        .unwrap();
    }

    #[test]
    fn codes_are_three_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..2000 {
            let text = LottoCode::random(&mut rng).to_string();
            assert_eq!(text.len(), 3);
            assert!(text.chars().all(|c| c.is_ascii_digit()));
        }
        assert_eq!(LottoCode::new(7).unwrap().to_string(), "007");
        assert!(LottoCode::new(1000).is_none());
        assert!("12".parse::<LottoCode>().is_err());
        assert!("1a3".parse::<LottoCode>().is_err());
    }

    #[test]
    fn positional_matches() {
        assert_eq!(code("123").matches(code("123")), 3);
        assert_eq!(code("123").matches(code("129")), 2);
        assert_eq!(code("123").matches(code("321")), 1);
        assert_eq!(code("123").matches(code("456")), 0);
    }

    #[test]
    fn winning_code_avoids_held_codes_without_jackpot() {
        let mut rng = StdRng::seed_from_u64(1);
        let held = vec![code("111"), code("222")];
        for _ in 0..200 {
            let winning = pick_winning_code(&held, 0.0, &mut rng);
            assert!(!held.contains(&winning));
        }
        assert_eq!(pick_winning_code(&held, 1.0, &mut rng), code("111"));
    }

    #[test]
    fn one_pending_ticket_per_user() {
        let db = Database::open_in_memory().unwrap();
        seed_users(&db, &[(1, "철수")]);
        let mut rng = StdRng::seed_from_u64(3);
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();

        let first = db.with_conn(|c| issue_ticket(c, 1, 5, today, &mut rng)).unwrap();
        let IssueOutcome::Issued(issued) = first else {
            panic!("expected a new ticket");
        };
        let again = db.with_conn(|c| issue_ticket(c, 1, 5, today, &mut rng)).unwrap();
        assert_eq!(again, IssueOutcome::Existing(issued));
        assert_eq!(db.with_conn(pending_count).unwrap(), 1);
    }

    #[test]
    fn jackpot_draw_pays_and_marks_drawn() {
        let db = Database::open_in_memory().unwrap();
        seed_users(&db, &[(1, "철수"), (2, "영희"), (3, "민수")]);
        insert_ticket(&db, 1, "100", "123");
        insert_ticket(&db, 2, "100", "129");
        insert_ticket(&db, 3, "200", "555");

        let config = LotteryConfig {
            jackpot_chance: 1.0,
            ..LotteryConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        let results = db.transaction(|c| draw(c, &config, &mut rng)).unwrap();

        assert_eq!(results.len(), 2);
        let room100 = &results[0];
        assert_eq!(room100.room, "100");
        assert_eq!(room100.winning, code("123"));
        assert_eq!(room100.first, vec!["철수".to_string()]);
        assert_eq!(room100.second, vec!["영희".to_string()]);
        assert_eq!(results[1].first, vec!["민수".to_string()]);

        db.with_conn(|c| {
            assert_eq!(find_user(c, 1)?.unwrap().points, 300);
            assert_eq!(find_user(c, 2)?.unwrap().points, 150);
            assert_eq!(pending_count(c)?, 0);
            Ok::<_, rusqlite::Error>(())
        })
        .unwrap();

        let text = format_draw(room100, &config);
        assert!(text.starts_with("당첨번호 : 123"));
        assert!(text.contains("🎉 철수"));
        assert!(text.contains("• 영희"));
    }

    #[test]
    fn losing_draw_message() {
        let db = Database::open_in_memory().unwrap();
        seed_users(&db, &[(1, "철수")]);
        insert_ticket(&db, 1, "100", "123");

        let config = LotteryConfig {
            jackpot_chance: 0.0,
            ..LotteryConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        let results = db.transaction(|c| draw(c, &config, &mut rng)).unwrap();
        let result = &results[0];
        assert_ne!(result.winning, code("123"));

        if result.first.is_empty() && result.second.is_empty() {
            assert!(format_draw(result, &config).contains("행운의 복권 1명 추첨 결과"));
        }
        assert!(db.transaction(|c| draw(c, &config, &mut rng)).unwrap().is_empty());
    }
}
