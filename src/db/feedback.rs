//! feedback 表

use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{WhereBuilder, parse_column};
use crate::model::feedback::{Feedback, FeedbackDraft, FeedbackKind, FeedbackStatus};

const COLUMNS: &str = "id, name, email, kind, content, status, ip, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        kind: parse_column::<FeedbackKind>(row, 3)?,
        content: row.get(4)?,
        status: parse_column::<FeedbackStatus>(row, 5)?,
        ip: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn insert(
    conn: &Connection,
    draft: &FeedbackDraft,
    ip: Option<&str>,
    now: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO feedback (name, email, kind, content, status, ip, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'new', ?5, ?6, ?6)",
        params![
            draft.name,
            draft.email,
            draft.kind.as_str(),
            draft.content,
            ip,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list(
    conn: &Connection,
    status: Option<FeedbackStatus>,
    kind: Option<FeedbackKind>,
    limit: u32,
    offset: u64,
) -> rusqlite::Result<(u64, Vec<Feedback>)> {
    let mut w = WhereBuilder::new();
    if let Some(status) = status {
        w.eq("status", status.as_str());
    }
    if let Some(kind) = kind {
        w.eq("kind", kind.as_str());
    }
    let where_sql = w.sql();
    let total: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM feedback {}", where_sql),
        rusqlite::params_from_iter(w.params()),
        |row| row.get(0),
    )?;
    let limit_sql = w.limit_offset(limit, offset);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM feedback {} ORDER BY id DESC {}",
        COLUMNS, where_sql, limit_sql
    ))?;
    let items = stmt
        .query_map(rusqlite::params_from_iter(w.params()), map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((total, items))
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<Feedback>> {
    conn.query_row(
        &format!("SELECT {} FROM feedback WHERE id = ?1", COLUMNS),
        [id],
        map_row,
    )
    .optional()
}

pub fn set_status(
    conn: &Connection,
    id: i64,
    status: FeedbackStatus,
    now: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE feedback SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM feedback WHERE id = ?1", [id])? > 0)
}

pub fn delete_all(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM feedback", [])
}

/// 各状态数量
pub fn count_by_status(conn: &Connection) -> rusqlite::Result<Vec<(FeedbackStatus, u64)>> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM feedback GROUP BY status")?;
    stmt.query_map([], |row| Ok((parse_column(row, 0)?, row.get(1)?)))?
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    fn draft(kind: FeedbackKind) -> FeedbackDraft {
        FeedbackDraft {
            name: "访客".into(),
            email: "visitor@example.com".into(),
            kind,
            content: "希望增加更多 AI 工具".into(),
        }
    }

    #[test]
    fn test_insert_list_and_status() {
        let conn = test_conn();
        let now = "2026-01-01T00:00:00Z";
        let first = insert(&conn, &draft(FeedbackKind::Suggestion), Some("127.0.0.1"), now).unwrap();
        insert(&conn, &draft(FeedbackKind::Bug), None, now).unwrap();

        let (total, items) = list(&conn, None, None, 20, 0).unwrap();
        assert_eq!(total, 2);
        // 最新的在前
        assert_eq!(items[0].kind, FeedbackKind::Bug);
        assert_eq!(items[1].ip.as_deref(), Some("127.0.0.1"));

        assert!(set_status(&conn, first, FeedbackStatus::Resolved, now).unwrap());
        let (total, _) = list(&conn, Some(FeedbackStatus::New), None, 20, 0).unwrap();
        assert_eq!(total, 1);
        let (total, _) = list(&conn, None, Some(FeedbackKind::Suggestion), 20, 0).unwrap();
        assert_eq!(total, 1);

        let counts = count_by_status(&conn).unwrap();
        assert!(counts.contains(&(FeedbackStatus::Resolved, 1)));
        assert!(counts.contains(&(FeedbackStatus::New, 1)));
    }

    #[test]
    fn test_delete() {
        let conn = test_conn();
        let id = insert(&conn, &draft(FeedbackKind::Other), None, "t").unwrap();
        assert!(get(&conn, id).unwrap().is_some());
        assert!(delete(&conn, id).unwrap());
        assert!(get(&conn, id).unwrap().is_none());
        assert_eq!(delete_all(&conn).unwrap(), 0);
    }
}
