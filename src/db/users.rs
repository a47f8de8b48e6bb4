//! users 表

use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{WhereBuilder, parse_column};
use crate::model::user::{User, UserProfile, UserRole, UserStatus};

const COLUMNS: &str = "id, username, email, role, status, avatar, qq, password_hash, \
                       last_login_at, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: parse_column::<UserRole>(row, 3)?,
        status: parse_column::<UserStatus>(row, 4)?,
        avatar: row.get(5)?,
        qq: row.get(6)?,
        password_hash: row.get(7)?,
        last_login_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn count(conn: &Connection) -> rusqlite::Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

/// 启用状态的管理员数量
pub fn count_active_admins(conn: &Connection) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'admin' AND status = 'active'",
        [],
        |row| row.get(0),
    )
}

pub fn list(
    conn: &Connection,
    query: Option<&str>,
    limit: u32,
    offset: u64,
) -> rusqlite::Result<(u64, Vec<User>)> {
    let mut w = WhereBuilder::new();
    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
        w.contains_any(&["username", "email"], q);
    }
    let where_sql = w.sql();
    let total: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM users {}", where_sql),
        rusqlite::params_from_iter(w.params()),
        |row| row.get(0),
    )?;
    let limit_sql = w.limit_offset(limit, offset);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users {} ORDER BY id ASC {}",
        COLUMNS, where_sql, limit_sql
    ))?;
    let users = stmt
        .query_map(rusqlite::params_from_iter(w.params()), map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((total, users))
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", COLUMNS),
        [id],
        map_row,
    )
    .optional()
}

/// 按用户名查询（不区分大小写）
pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", COLUMNS),
        [username.trim()],
        map_row,
    )
    .optional()
}

pub fn insert(
    conn: &Connection,
    profile: &UserProfile,
    password_hash: &str,
    now: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (username, email, role, status, avatar, qq, password_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            profile.username,
            profile.email,
            profile.role.as_str(),
            profile.status.as_str(),
            profile.avatar,
            profile.qq,
            password_hash,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_profile(
    conn: &Connection,
    id: i64,
    profile: &UserProfile,
    now: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET username = ?1, email = ?2, role = ?3, status = ?4, avatar = ?5, qq = ?6, \
         updated_at = ?7 WHERE id = ?8",
        params![
            profile.username,
            profile.email,
            profile.role.as_str(),
            profile.status.as_str(),
            profile.avatar,
            profile.qq,
            now,
            id,
        ],
    )?;
    Ok(changed > 0)
}

pub fn update_password(
    conn: &Connection,
    id: i64,
    password_hash: &str,
    now: &str,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![password_hash, now, id],
    )?;
    Ok(changed > 0)
}

pub fn touch_last_login(conn: &Connection, id: i64, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    fn profile(username: &str, role: UserRole) -> UserProfile {
        UserProfile {
            username: username.to_string(),
            email: Some(format!("{}@example.com", username)),
            role,
            status: UserStatus::Active,
            avatar: None,
            qq: None,
        }
    }

    #[test]
    fn test_insert_and_find_case_insensitive() {
        let conn = test_conn();
        let id = insert(&conn, &profile("Alice", UserRole::Admin), "hash", "2026-01-01T00:00:00Z")
            .unwrap();
        let user = find_by_username(&conn, "alice").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, UserRole::Admin);
        assert!(user.is_active_admin());
        assert!(find_by_username(&conn, "bob").unwrap().is_none());
    }

    #[test]
    fn test_username_unique() {
        let conn = test_conn();
        let now = "2026-01-01T00:00:00Z";
        insert(&conn, &profile("alice", UserRole::User), "h", now).unwrap();
        assert!(insert(&conn, &profile("ALICE", UserRole::User), "h", now).is_err());
    }

    #[test]
    fn test_count_active_admins() {
        let conn = test_conn();
        let now = "2026-01-01T00:00:00Z";
        insert(&conn, &profile("root", UserRole::Admin), "h", now).unwrap();
        let mut disabled = profile("old", UserRole::Admin);
        disabled.status = UserStatus::Disabled;
        insert(&conn, &disabled, "h", now).unwrap();
        insert(&conn, &profile("guest", UserRole::User), "h", now).unwrap();
        assert_eq!(count_active_admins(&conn).unwrap(), 1);
        assert_eq!(count(&conn).unwrap(), 3);
    }

    #[test]
    fn test_list_search_and_update() {
        let conn = test_conn();
        let now = "2026-01-01T00:00:00Z";
        let id = insert(&conn, &profile("alice", UserRole::User), "h", now).unwrap();
        insert(&conn, &profile("bob", UserRole::User), "h", now).unwrap();

        let (total, users) = list(&conn, Some("ali"), 20, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].username, "alice");

        assert!(update_password(&conn, id, "new-hash", now).unwrap());
        touch_last_login(&conn, id, "2026-03-01T00:00:00Z").unwrap();
        let user = get(&conn, id).unwrap().unwrap();
        assert_eq!(user.password_hash, "new-hash");
        assert_eq!(user.last_login_at.as_deref(), Some("2026-03-01T00:00:00Z"));
        assert!(delete(&conn, id).unwrap());
        assert!(get(&conn, id).unwrap().is_none());
    }
}
