//! Point shop.

use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::chat::text::with_commas;

use super::error::EconomyError;
use super::users::find_user;

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub item_id: i64,
    pub name: String,
    pub price: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub item: Item,
    pub remaining: i64,
}

fn find_item(conn: &Connection, name: &str) -> rusqlite::Result<Option<Item>> {
    conn.query_row(
        "SELECT item_id, item_name, price, description FROM items WHERE item_name = ?1",
        params![name],
        |r| {
            Ok(Item {
                item_id: r.get(0)?,
                name: r.get(1)?,
                price: r.get::<_, Option<i64>>(2)?.unwrap_or(0),
                description: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        },
    )
    .optional()
}

pub fn list_items(conn: &Connection) -> rusqlite::Result<Vec<Item>> {
    let mut stmt = conn.prepare("SELECT item_id, item_name, price, description FROM items ORDER BY item_id")?;
    let items = stmt
        .query_map([], |r| {
            Ok(Item {
                item_id: r.get(0)?,
                name: r.get(1)?,
                price: r.get::<_, Option<i64>>(2)?.unwrap_or(0),
                description: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

/// Buy one unit. Run inside a transaction so the balance check and the
/// debit see the same row.
pub fn purchase(
    conn: &Connection,
    user_id: i64,
    item_name: &str,
    now: DateTime<FixedOffset>,
) -> Result<Purchase, EconomyError> {
    let item = find_item(conn, item_name)?.ok_or_else(|| EconomyError::UnknownItem(item_name.to_string()))?;
    let user = find_user(conn, user_id)?.ok_or(EconomyError::UnknownUser)?;
    if user.points < item.price {
        return Err(EconomyError::InsufficientPoints {
            have: user.points,
            need: item.price,
        });
    }

    conn.execute(
        "UPDATE users SET points = points - ?1, spent_points = spent_points + ?1 WHERE user_id = ?2",
        params![item.price, user_id],
    )?;

    let slot: Option<i64> = conn
        .query_row(
            "SELECT id FROM inventory WHERE user_id = ?1 AND item_id = ?2",
            params![user_id, item.item_id],
            |r| r.get(0),
        )
        .optional()?;
    match slot {
        Some(id) => {
            conn.execute("UPDATE inventory SET quantity = quantity + 1 WHERE id = ?1", params![id])?;
        }
        None => {
            conn.execute(
                "INSERT INTO inventory (user_id, item_id, quantity, purchase_date) VALUES (?1, ?2, 1, ?3)",
                params![user_id, item.item_id, now.format("%Y-%m-%d %H:%M:%S").to_string()],
            )?;
        }
    }

    tracing::info!(user = user_id, item = %item.name, price = item.price, "Item purchased");
    Ok(Purchase {
        remaining: user.points - item.price,
        item,
    })
}

/// Register a new shop item. Prices must not be negative.
pub fn add_item(conn: &Connection, name: &str, price: i64, description: &str) -> Result<Item, EconomyError> {
    if price < 0 {
        return Err(EconomyError::NegativePrice);
    }
    match conn.execute(
        "INSERT INTO items (item_name, price, description) VALUES (?1, ?2, ?3)",
        params![name, price, description],
    ) {
        Ok(_) => Ok(Item {
            item_id: conn.last_insert_rowid(),
            name: name.to_string(),
            price,
            description: description.to_string(),
        }),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(EconomyError::DuplicateItem(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Remove an item from the shop. Inventories keep what was bought.
pub fn remove_item(conn: &Connection, name: &str) -> Result<(), EconomyError> {
    let removed = conn.execute("DELETE FROM items WHERE item_name = ?1", params![name])?;
    if removed == 0 {
        return Err(EconomyError::NotListed(name.to_string()));
    }
    Ok(())
}

pub fn format_items(items: &[Item]) -> String {
    let mut lines = vec!["🏪 [ 포인트 상점 ]".to_string(), "────────".to_string()];
    for item in items {
        lines.push(format!("📦 {} - 🅟{}", item.name, with_commas(item.price)));
        lines.push(format!("   ㄴ {}", item.description));
    }
    lines.push("────────".to_string());
    lines.push("💡 주문 : /구매 [아이템이름]".to_string());
    lines.join("\n")
}

pub fn format_purchase(purchase: &Purchase) -> String {
    format!(
        "🛍️ 구매 완료: [{}]\n결제 금액: 🅟{}\n남은 포인트: 🅟{}",
        purchase.item.name,
        with_commas(purchase.item.price),
        with_commas(purchase.remaining)
    )
}
