//! settings 表（键值对）

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension, params};

use crate::model::setting::KNOWN_SETTINGS;

pub fn get(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
        row.get(0)
    })
    .optional()
}

pub fn all(conn: &Connection) -> rusqlite::Result<BTreeMap<String, String>> {
    let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect()
}

/// 指定前缀的全部设置项
pub fn with_prefix(conn: &Connection, prefix: &str) -> rusqlite::Result<BTreeMap<String, String>> {
    let mut stmt = conn.prepare("SELECT key, value FROM settings WHERE substr(key, 1, ?2) = ?1")?;
    stmt.query_map(params![prefix, prefix.len() as i64], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?
    .collect()
}

/// 读取设置，缺失时使用内置默认值（未知键默认为空串）
pub fn get_or_default(conn: &Connection, key: &str) -> rusqlite::Result<String> {
    Ok(get(conn, key)?.unwrap_or_else(|| {
        KNOWN_SETTINGS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
            .unwrap_or_default()
    }))
}

/// 公开设置：全部已知键，数据库值覆盖默认值
pub fn public(conn: &Connection) -> rusqlite::Result<BTreeMap<String, String>> {
    let stored = all(conn)?;
    Ok(KNOWN_SETTINGS
        .iter()
        .map(|(key, default)| {
            let value = stored
                .get(*key)
                .cloned()
                .unwrap_or_else(|| default.to_string());
            (key.to_string(), value)
        })
        .collect())
}

pub fn upsert(conn: &Connection, key: &str, value: &str, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now],
    )?;
    Ok(())
}

/// 批量写入（单事务）
pub fn upsert_many(
    conn: &Connection,
    entries: &BTreeMap<String, String>,
    now: &str,
) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    for (key, value) in entries {
        upsert(&tx, key, value, now)?;
    }
    tx.commit()
}

/// 仅在键不存在时写入，返回是否写入
pub fn insert_if_missing(
    conn: &Connection,
    key: &str,
    value: &str,
    now: &str,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
        params![key, value, now],
    )?;
    Ok(inserted > 0)
}

pub fn delete(conn: &Connection, key: &str) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM settings WHERE key = ?1", [key])? > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    #[test]
    fn test_upsert_overwrites() {
        let conn = test_conn();
        upsert(&conn, "site_name", "A", "t1").unwrap();
        upsert(&conn, "site_name", "B", "t2").unwrap();
        assert_eq!(get(&conn, "site_name").unwrap().as_deref(), Some("B"));
        assert!(get(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_if_missing_keeps_existing() {
        let conn = test_conn();
        upsert(&conn, "site_name", "Custom", "t1").unwrap();
        assert!(!insert_if_missing(&conn, "site_name", "Default", "t2").unwrap());
        assert!(insert_if_missing(&conn, "icp_number", "", "t2").unwrap());
        assert_eq!(get(&conn, "site_name").unwrap().as_deref(), Some("Custom"));
    }

    #[test]
    fn test_defaults_and_public_view() {
        let conn = test_conn();
        assert_eq!(get_or_default(&conn, "friend_link_enabled").unwrap(), "true");
        assert_eq!(get_or_default(&conn, "unknown").unwrap(), "");

        upsert(&conn, "site_notice", "维护中", "t").unwrap();
        upsert(&conn, "internal_flag", "x", "t").unwrap();
        let public = public(&conn).unwrap();
        assert_eq!(public.get("site_notice").map(String::as_str), Some("维护中"));
        assert_eq!(public.get("site_name").map(String::as_str), Some("AiQiji 工具箱"));
        assert!(!public.contains_key("internal_flag"));
    }

    #[test]
    fn test_prefix_and_batch() {
        let conn = test_conn();
        let mut entries = BTreeMap::new();
        entries.insert("email_template:feedback_admin".to_string(), "{}".to_string());
        entries.insert("site_name".to_string(), "X".to_string());
        upsert_many(&conn, &entries, "t").unwrap();

        let templates = with_prefix(&conn, "email_template:").unwrap();
        assert_eq!(templates.len(), 1);
        assert!(templates.contains_key("email_template:feedback_admin"));
        assert_eq!(all(&conn).unwrap().len(), 2);
        assert!(delete(&conn, "site_name").unwrap());
        assert!(!delete(&conn, "site_name").unwrap());
    }
}
