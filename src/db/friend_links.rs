//! friend_links 表

use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{WhereBuilder, parse_column};
use crate::model::friend_link::{FriendLink, FriendLinkDraft, FriendLinkStatus};

const COLUMNS: &str = "id, site_name, site_url, normalized_url, description, logo, contact_email, \
                       status, reject_reason, sort_order, expires_at, last_checked_at, reciprocal, \
                       created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<FriendLink> {
    Ok(FriendLink {
        id: row.get(0)?,
        site_name: row.get(1)?,
        site_url: row.get(2)?,
        normalized_url: row.get(3)?,
        description: row.get(4)?,
        logo: row.get(5)?,
        contact_email: row.get(6)?,
        status: parse_column::<FriendLinkStatus>(row, 7)?,
        reject_reason: row.get(8)?,
        sort_order: row.get(9)?,
        expires_at: row.get(10)?,
        last_checked_at: row.get(11)?,
        reciprocal: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// 公开展示：已通过且未过期（`now` 为 RFC3339 UTC）
pub fn list_public(conn: &Connection, now: &str) -> rusqlite::Result<Vec<FriendLink>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM friend_links WHERE status = 'approved' \
         AND (expires_at IS NULL OR expires_at > ?1) ORDER BY sort_order ASC, id ASC",
        COLUMNS
    ))?;
    stmt.query_map([now], map_row)?.collect()
}

/// 指定状态的全部友链
pub fn list_by_status(
    conn: &Connection,
    status: FriendLinkStatus,
) -> rusqlite::Result<Vec<FriendLink>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM friend_links WHERE status = ?1 ORDER BY sort_order ASC, id ASC",
        COLUMNS
    ))?;
    stmt.query_map([status.as_str()], map_row)?.collect()
}

pub fn list(
    conn: &Connection,
    status: Option<FriendLinkStatus>,
    query: Option<&str>,
    limit: u32,
    offset: u64,
) -> rusqlite::Result<(u64, Vec<FriendLink>)> {
    let mut w = WhereBuilder::new();
    if let Some(status) = status {
        w.eq("status", status.as_str());
    }
    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
        w.contains_any(&["site_name", "site_url", "description"], q);
    }
    let where_sql = w.sql();
    let total: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM friend_links {}", where_sql),
        rusqlite::params_from_iter(w.params()),
        |row| row.get(0),
    )?;
    let limit_sql = w.limit_offset(limit, offset);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM friend_links {} ORDER BY id DESC {}",
        COLUMNS, where_sql, limit_sql
    ))?;
    let links = stmt
        .query_map(rusqlite::params_from_iter(w.params()), map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((total, links))
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<FriendLink>> {
    conn.query_row(
        &format!("SELECT {} FROM friend_links WHERE id = ?1", COLUMNS),
        [id],
        map_row,
    )
    .optional()
}

/// 是否存在占用该地址的待审核/已通过记录（可排除自身）
pub fn live_url_exists(
    conn: &Connection,
    normalized_url: &str,
    exclude_id: Option<i64>,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friend_links WHERE normalized_url = ?1 \
         AND status IN ('pending', 'approved') AND id != ?2)",
        params![normalized_url, exclude_id.unwrap_or(-1)],
        |row| row.get(0),
    )
}

pub fn insert(
    conn: &Connection,
    draft: &FriendLinkDraft,
    status: FriendLinkStatus,
    now: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO friend_links (site_name, site_url, normalized_url, description, logo, \
         contact_email, status, sort_order, expires_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            draft.site_name,
            draft.site_url,
            draft.normalized_url,
            draft.description,
            draft.logo,
            draft.contact_email,
            status.as_str(),
            draft.sort_order,
            draft.expires_at,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(
    conn: &Connection,
    id: i64,
    draft: &FriendLinkDraft,
    now: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE friend_links SET site_name = ?1, site_url = ?2, normalized_url = ?3, \
         description = ?4, logo = ?5, contact_email = ?6, sort_order = ?7, expires_at = ?8, \
         updated_at = ?9 WHERE id = ?10",
        params![
            draft.site_name,
            draft.site_url,
            draft.normalized_url,
            draft.description,
            draft.logo,
            draft.contact_email,
            draft.sort_order,
            draft.expires_at,
            now,
            id,
        ],
    )?;
    Ok(changed > 0)
}

/// 更新审核状态。`expires_at` 为 `Some` 时同时覆盖过期时间
pub fn set_status(
    conn: &Connection,
    id: i64,
    status: FriendLinkStatus,
    reject_reason: Option<&str>,
    expires_at: Option<Option<&str>>,
    now: &str,
) -> rusqlite::Result<bool> {
    let changed = match expires_at {
        Some(expires_at) => conn.execute(
            "UPDATE friend_links SET status = ?1, reject_reason = ?2, expires_at = ?3, \
             updated_at = ?4 WHERE id = ?5",
            params![status.as_str(), reject_reason, expires_at, now, id],
        )?,
        None => conn.execute(
            "UPDATE friend_links SET status = ?1, reject_reason = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.as_str(), reject_reason, now, id],
        )?,
    };
    Ok(changed > 0)
}

/// 记录互链检测结果
pub fn record_check(
    conn: &Connection,
    id: i64,
    reciprocal: Option<bool>,
    now: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE friend_links SET reciprocal = ?1, last_checked_at = ?2 WHERE id = ?3",
        params![reciprocal, now, id],
    )?;
    Ok(())
}

/// 将已到期的已通过友链标记为 expired，返回影响行数
pub fn expire_overdue(conn: &Connection, now: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE friend_links SET status = 'expired', updated_at = ?1 \
         WHERE status = 'approved' AND expires_at IS NOT NULL AND expires_at <= ?1",
        [now],
    )
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM friend_links WHERE id = ?1", [id])? > 0)
}

pub fn delete_all(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM friend_links", [])
}

/// 各状态数量
pub fn count_by_status(conn: &Connection) -> rusqlite::Result<Vec<(FriendLinkStatus, u64)>> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM friend_links GROUP BY status")?;
    stmt.query_map([], |row| Ok((parse_column(row, 0)?, row.get(1)?)))?
        .collect()
}
