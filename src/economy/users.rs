//! User rows: registration, chat counters, check-in and profile.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::chat::text::with_commas;

use super::error::EconomyError;

pub const DEFAULT_JOB: &str = "초보자";

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub job: String,
    pub join_date: String,
    pub total_checkin: i64,
    pub consecutive_checkin: i64,
    pub last_checkin_date: Option<String>,
    pub total_chat: i64,
    pub today_chat: i64,
    pub last_chat_date: Option<String>,
    pub points: i64,
    pub spent_points: i64,
}

const USER_COLUMNS: &str = "user_id, name, job, join_date, total_checkin, consecutive_checkin, \
    last_checkin_date, total_chat, today_chat, last_chat_date, points, spent_points";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        job: row
            .get::<_, Option<String>>(2)?
            .unwrap_or_else(|| DEFAULT_JOB.to_string()),
        join_date: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        total_checkin: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        consecutive_checkin: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        last_checkin_date: row.get(6)?,
        total_chat: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        today_chat: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
        last_chat_date: row.get(9)?,
        points: row.get::<_, Option<i64>>(10)?.unwrap_or(0),
        spent_points: row.get::<_, Option<i64>>(11)?.unwrap_or(0),
    })
}

pub fn find_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
        params![user_id],
        user_from_row,
    )
    .optional()
}

lazy_static! {
    static ref JOB_TAG: Regex = Regex::new(r"[\[\(](.+?)[\]\)]").expect("job tag pattern");
}

/// Job written in the nickname: `홍길동 [전사]` or `임꺽정(궁수)`.
pub fn extract_job(name: &str) -> Option<String> {
    JOB_TAG.captures(name).map(|caps| caps[1].to_string())
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    /// Previous nickname when this message revealed a rename.
    pub renamed_from: Option<String>,
}

/// Register the sender on every message: create the row, log nickname changes,
/// pick up a job from the nickname and bump the chat counters.
pub fn get_or_create_user(
    conn: &Connection,
    user_id: i64,
    name: &str,
    now: DateTime<FixedOffset>,
) -> Result<Registration, EconomyError> {
    let name = name.trim();
    let today = now.date_naive().to_string();
    let stamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let job = extract_job(name);

    let mut user = match find_user(conn, user_id)? {
        Some(user) => user,
        None => {
            conn.execute(
                "INSERT INTO users (user_id, name, job, join_date) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, name, job.as_deref().unwrap_or(DEFAULT_JOB), today],
            )?;
            tracing::info!(user = user_id, name, "Registered user");
            find_user(conn, user_id)?.ok_or(EconomyError::UnknownUser)?
        }
    };

    let mut renamed_from = None;
    if user.name != name {
        conn.execute(
            "INSERT INTO name_logs (user_id, old_name, new_name, change_date) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, user.name, name, stamp],
        )?;
        conn.execute(
            "UPDATE users SET name = ?1 WHERE user_id = ?2",
            params![name, user_id],
        )?;
        renamed_from = Some(std::mem::replace(&mut user.name, name.to_string()));
    }

    if let Some(job) = job.filter(|j| *j != user.job) {
        conn.execute("UPDATE users SET job = ?1 WHERE user_id = ?2", params![job, user_id])?;
        user.job = job;
    }

    let today_chat = if user.last_chat_date.as_deref() == Some(today.as_str()) {
        user.today_chat + 1
    } else {
        1
    };
    conn.execute(
        "UPDATE users SET total_chat = total_chat + 1, today_chat = ?1, last_chat_date = ?2 WHERE user_id = ?3",
        params![today_chat, today, user_id],
    )?;
    user.total_chat += 1;
    user.today_chat = today_chat;
    user.last_chat_date = Some(today);

    Ok(Registration { user, renamed_from })
}

pub fn rename_notice(old: &str, new: &str) -> String {
    format!("📝 닉네임 변경 감지\n[{}] ➜ [{}]", old, new)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckIn {
    Done {
        reward: i64,
        total: i64,
        consecutive: i64,
    },
    Already {
        total: i64,
        consecutive: i64,
    },
}

/// Daily attendance. The streak continues only from yesterday.
pub fn check_in(conn: &Connection, user_id: i64, today: NaiveDate, reward: i64) -> Result<CheckIn, EconomyError> {
    let user = find_user(conn, user_id)?.ok_or(EconomyError::UnknownUser)?;
    let today_str = today.to_string();
    if user.last_checkin_date.as_deref() == Some(today_str.as_str()) {
        return Ok(CheckIn::Already {
            total: user.total_checkin,
            consecutive: user.consecutive_checkin,
        });
    }

    let yesterday = (today - Duration::days(1)).to_string();
    let consecutive = if user.last_checkin_date.as_deref() == Some(yesterday.as_str()) {
        user.consecutive_checkin + 1
    } else {
        1
    };
    let total = user.total_checkin + 1;

    conn.execute(
        "UPDATE users SET total_checkin = ?1, consecutive_checkin = ?2, last_checkin_date = ?3, points = points + ?4 WHERE user_id = ?5",
        params![total, consecutive, today_str, reward, user_id],
    )?;
    Ok(CheckIn::Done {
        reward,
        total,
        consecutive,
    })
}

pub fn format_check_in(result: &CheckIn) -> String {
    match result {
        CheckIn::Done {
            reward,
            total,
            consecutive,
        } => format!(
            "✅ 출석 완료! (🅟{})\n📅 총 출석: {}일\n🔥 연속 출석: {}일째",
            reward, total, consecutive
        ),
        CheckIn::Already { total, consecutive } => format!(
            "⚠️ 이미 출석했습니다.\n📅 총 출석: {}일\n🔥 연속 출석: {}일",
            total, consecutive
        ),
    }
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub user: User,
    pub last_rename: Option<(String, String)>,
    /// Owned items with quantity.
    pub items: Vec<(String, i64)>,
}

pub fn profile(conn: &Connection, user_id: i64) -> Result<Profile, EconomyError> {
    let user = find_user(conn, user_id)?.ok_or(EconomyError::UnknownUser)?;
    let last_rename = conn
        .query_row(
            "SELECT old_name, new_name FROM name_logs WHERE user_id = ?1 ORDER BY id DESC LIMIT 1",
            params![user_id],
            |r| Ok((r.get::<_, Option<String>>(0)?, r.get::<_, Option<String>>(1)?)),
        )
        .optional()?
        .map(|(old, new)| (old.unwrap_or_default(), new.unwrap_or_default()));

    let mut stmt = conn.prepare(
        "SELECT i.item_name, inv.quantity FROM inventory inv \
         JOIN items i ON inv.item_id = i.item_id \
         WHERE inv.user_id = ?1 AND inv.quantity > 0 ORDER BY inv.id",
    )?;
    let items = stmt
        .query_map(params![user_id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Profile {
        user,
        last_rename,
        items,
    })
}

pub fn format_profile(profile: &Profile) -> String {
    let user = &profile.user;
    let rename = profile
        .last_rename
        .as_ref()
        .map(|(old, new)| format!("\n•닉네임 변경: {}\n➜ {}", old, new))
        .unwrap_or_default();
    let items = if profile.items.is_empty() {
        "보유 아이템이 없습니다.".to_string()
    } else {
        profile
            .items
            .iter()
            .map(|(name, qty)| format!("{}({})", name, qty))
            .collect::<Vec<_>>()
            .join(", ")
    };

    [
        format!("🌱 {}", user.name),
        String::new(),
        format!("• 클래스 : {}", user.job),
        format!("• 가입일 : {}", user.join_date),
        format!("• 총 출석일 : {}일", user.total_checkin),
        format!("• 연속 출석일 : {}일{}", user.consecutive_checkin, rename),
        "────────".to_string(),
        format!("• 전체 채팅 : {}회", with_commas(user.total_chat)),
        format!("• 오늘 채팅 : {}회", with_commas(user.today_chat)),
        "────────".to_string(),
        format!("• 보유 포인트 : 🅟{}", with_commas(user.points)),
        format!("• 소비 포인트 : 🅟{}", with_commas(user.spent_points)),
        "────────".to_string(),
        "• 구매 아이템 :".to_string(),
        "────────".to_string(),
        items,
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, day, hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn job_from_nickname() {
        assert_eq!(extract_job("홍길동 [전사]").as_deref(), Some("전사"));
        assert_eq!(extract_job("임꺽정(궁수)").as_deref(), Some("궁수"));
        assert_eq!(extract_job("철수"), None);
    }

    #[test]
    fn registration_tracks_names_and_chat_counts() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            let first = get_or_create_user(c, 1, "철수", at(10, 9))?;
            assert_eq!(first.user.job, DEFAULT_JOB);
            assert_eq!(first.user.today_chat, 1);
            assert!(first.renamed_from.is_none());

            let second = get_or_create_user(c, 1, "철수 [도적]", at(10, 10))?;
            assert_eq!(second.renamed_from.as_deref(), Some("철수"));
            assert_eq!(second.user.job, "도적");
            assert_eq!(second.user.today_chat, 2);

            let next_day = get_or_create_user(c, 1, "철수 [도적]", at(11, 8))?;
            assert_eq!(next_day.user.today_chat, 1);
            assert_eq!(next_day.user.total_chat, 3);

            let profile = profile(c, 1)?;
            assert_eq!(
                profile.last_rename,
                Some(("철수".to_string(), "철수 [도적]".to_string()))
            );
            Ok::<_, EconomyError>(())
        })
        .unwrap();
    }

    #[test]
    fn check_in_once_per_day_with_streak() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            get_or_create_user(c, 1, "철수", at(10, 9))?;
            let d10 = at(10, 9).date_naive();

            assert_eq!(
                check_in(c, 1, d10, 10)?,
                CheckIn::Done { reward: 10, total: 1, consecutive: 1 }
            );
            assert_eq!(
                check_in(c, 1, d10, 10)?,
                CheckIn::Already { total: 1, consecutive: 1 }
            );
            assert_eq!(find_user(c, 1)?.unwrap().points, 10);

            let d11 = d10 + Duration::days(1);
            assert_eq!(
                check_in(c, 1, d11, 10)?,
                CheckIn::Done { reward: 10, total: 2, consecutive: 2 }
            );

            let d13 = d10 + Duration::days(3);
            assert_eq!(
                check_in(c, 1, d13, 10)?,
                CheckIn::Done { reward: 10, total: 3, consecutive: 1 }
            );
            assert_eq!(find_user(c, 1)?.unwrap().points, 30);
            Ok::<_, EconomyError>(())
        })
        .unwrap();
    }

    #[test]
    fn profile_text_lists_inventory() {
        let db = Database::open_in_memory().unwrap();
        let text = db
            .with_conn(|c| {
                get_or_create_user(c, 1, "철수", at(10, 9))?;
                let p = profile(c, 1)?;
                Ok::<_, EconomyError>(format_profile(&p))
            })
            .unwrap();
        assert!(text.starts_with("🌱 철수"));
        assert!(text.contains("• 클래스 : 초보자"));
        assert!(text.ends_with("보유 아이템이 없습니다."));
    }
}
