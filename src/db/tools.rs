//! tools 表

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use super::{WhereBuilder, parse_column};
use crate::model::tool::{Category, Tool, ToolDraft, ToolStatus};

const COLUMNS: &str = "id, name, description, icon, category, tags, url, featured, status, \
                       sort_order, view_count, click_count, created_at, updated_at";

/// 目录默认排序：推荐优先，其次排序值，最后 id
const ORDER_BY: &str = "ORDER BY featured DESC, sort_order ASC, id ASC";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Tool> {
    let tags: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags).unwrap_or_default();
    Ok(Tool {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        category: parse_column::<Category>(row, 4)?,
        tags,
        url: row.get(6)?,
        featured: row.get(7)?,
        status: parse_column::<ToolStatus>(row, 8)?,
        sort_order: row.get(9)?,
        view_count: row.get(10)?,
        click_count: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn tags_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// 全部上架工具（目录缓存的数据源）
pub fn list_active(conn: &Connection) -> rusqlite::Result<Vec<Tool>> {
    let sql = format!("SELECT {} FROM tools WHERE status = 'active' {}", COLUMNS, ORDER_BY);
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map([], map_row)?.collect()
}

/// 管理端查询条件
#[derive(Debug, Clone, Default)]
pub struct AdminToolFilter {
    pub category: Option<Category>,
    pub status: Option<ToolStatus>,
    pub featured: Option<bool>,
    pub query: Option<String>,
}

/// 管理端分页查询，返回 (总数, 当前页)
pub fn list_filtered(
    conn: &Connection,
    filter: &AdminToolFilter,
    limit: u32,
    offset: u64,
) -> rusqlite::Result<(u64, Vec<Tool>)> {
    let mut w = WhereBuilder::new();
    if let Some(category) = filter.category {
        w.eq("category", category.slug());
    }
    if let Some(status) = filter.status {
        w.eq("status", status.as_str());
    }
    if let Some(featured) = filter.featured {
        w.eq("featured", featured);
    }
    if let Some(q) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        w.contains_any(&["name", "description", "tags", "url"], q);
    }

    let where_sql = w.sql();
    let total: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM tools {}", where_sql),
        rusqlite::params_from_iter(w.params()),
        |row| row.get(0),
    )?;

    let limit_sql = w.limit_offset(limit, offset);
    let sql = format!(
        "SELECT {} FROM tools {} {} {}",
        COLUMNS, where_sql, ORDER_BY, limit_sql
    );
    let mut stmt = conn.prepare(&sql)?;
    let tools = stmt
        .query_map(rusqlite::params_from_iter(w.params()), map_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((total, tools))
}

pub fn get(conn: &Connection, id: i64) -> rusqlite::Result<Option<Tool>> {
    conn.query_row(
        &format!("SELECT {} FROM tools WHERE id = ?1", COLUMNS),
        [id],
        map_row,
    )
    .optional()
}

pub fn exists_url(conn: &Connection, url: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM tools WHERE url = ?1)", [url], |row| {
        row.get(0)
    })
}

pub fn insert(conn: &Connection, draft: &ToolDraft, now: &str) -> rusqlite::Result<i64> {
    insert_with_counters(conn, draft, 0, 0, now)
}

/// 插入工具并指定初始计数（种子数据使用）
pub fn insert_with_counters(
    conn: &Connection,
    draft: &ToolDraft,
    view_count: i64,
    click_count: i64,
    now: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO tools (name, description, icon, category, tags, url, featured, status, \
         sort_order, view_count, click_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            draft.name,
            draft.description,
            draft.icon,
            draft.category.slug(),
            tags_json(&draft.tags),
            draft.url,
            draft.featured,
            draft.status.as_str(),
            draft.sort_order,
            view_count,
            click_count,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// 更新工具，返回是否命中
pub fn update(conn: &Connection, id: i64, draft: &ToolDraft, now: &str) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE tools SET name = ?1, description = ?2, icon = ?3, category = ?4, tags = ?5, \
         url = ?6, featured = ?7, status = ?8, sort_order = ?9, updated_at = ?10 WHERE id = ?11",
        params![
            draft.name,
            draft.description,
            draft.icon,
            draft.category.slug(),
            tags_json(&draft.tags),
            draft.url,
            draft.featured,
            draft.status.as_str(),
            draft.sort_order,
            now,
            id,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    Ok(conn.execute("DELETE FROM tools WHERE id = ?1", [id])? > 0)
}

pub fn delete_all(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM tools", [])
}

/// 计数器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    View,
    Click,
}

/// 上架工具的计数器 +1，返回新值（工具不存在或已下架时返回 None）
pub fn increment(conn: &Connection, id: i64, counter: Counter) -> rusqlite::Result<Option<i64>> {
    let column = match counter {
        Counter::View => "view_count",
        Counter::Click => "click_count",
    };
    conn.query_row(
        &format!(
            "UPDATE tools SET {col} = {col} + 1 WHERE id = ?1 AND status = 'active' RETURNING {col}",
            col = column
        ),
        [id],
        |row| row.get(0),
    )
    .optional()
}

/// 工具统计
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStats {
    pub total: u64,
    pub active: u64,
    pub featured: u64,
    pub total_views: i64,
    pub total_clicks: i64,
}

pub fn stats(conn: &Connection) -> rusqlite::Result<ToolStats> {
    conn.query_row(
        "SELECT COUNT(*), \
                COUNT(CASE WHEN status = 'active' THEN 1 END), \
                COUNT(CASE WHEN featured = 1 THEN 1 END), \
                COALESCE(SUM(view_count), 0), \
                COALESCE(SUM(click_count), 0) \
         FROM tools",
        [],
        |row| {
            Ok(ToolStats {
                total: row.get(0)?,
                active: row.get(1)?,
                featured: row.get(2)?,
                total_views: row.get(3)?,
                total_clicks: row.get(4)?,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    fn draft(name: &str, category: Category, featured: bool, sort_order: i64) -> ToolDraft {
        ToolDraft {
            name: name.to_string(),
            description: format!("{} description", name),
            icon: None,
            category,
            tags: vec!["tag".into()],
            url: format!("https://{}.example.com", name.to_lowercase()),
            featured,
            status: ToolStatus::Active,
            sort_order,
        }
    }

    #[test]
    fn test_insert_get_roundtrip() {
        let conn = test_conn();
        let id = insert(&conn, &draft("Figma", Category::Design, true, 0), "2026-01-01T00:00:00Z")
            .unwrap();
        let tool = get(&conn, id).unwrap().unwrap();
        assert_eq!(tool.name, "Figma");
        assert_eq!(tool.category, Category::Design);
        assert_eq!(tool.tags, vec!["tag".to_string()]);
        assert!(tool.featured);
        assert!(get(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn test_list_active_order_and_status() {
        let conn = test_conn();
        let now = "2026-01-01T00:00:00Z";
        insert(&conn, &draft("B", Category::Ai, false, 1), now).unwrap();
        insert(&conn, &draft("A", Category::Ai, false, 0), now).unwrap();
        insert(&conn, &draft("C", Category::Ai, true, 9), now).unwrap();
        let mut hidden = draft("D", Category::Ai, true, 0);
        hidden.status = ToolStatus::Inactive;
        insert(&conn, &hidden, now).unwrap();

        let names: Vec<String> = list_active(&conn).unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_duplicate_url_is_constraint_violation() {
        let conn = test_conn();
        let now = "2026-01-01T00:00:00Z";
        insert(&conn, &draft("Dup", Category::Other, false, 0), now).unwrap();
        let err = insert(&conn, &draft("Dup", Category::Other, false, 0), now).unwrap_err();
        let api: crate::error::ApiError = err.into();
        assert!(matches!(api, crate::error::ApiError::Conflict(_)));
        assert!(exists_url(&conn, "https://dup.example.com").unwrap());
    }

    #[test]
    fn test_list_filtered() {
        let conn = test_conn();
        let now = "2026-01-01T00:00:00Z";
        insert(&conn, &draft("Figma", Category::Design, false, 0), now).unwrap();
        insert(&conn, &draft("Canva", Category::Design, false, 1), now).unwrap();
        insert(&conn, &draft("Cursor", Category::Development, false, 0), now).unwrap();

        let filter = AdminToolFilter {
            category: Some(Category::Design),
            ..Default::default()
        };
        let (total, page) = list_filtered(&conn, &filter, 1, 0).unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Figma");

        let filter = AdminToolFilter {
            query: Some("CURSOR".into()),
            ..Default::default()
        };
        let (total, page) = list_filtered(&conn, &filter, 20, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].category, Category::Development);
    }

    #[test]
    fn test_increment_only_active() {
        let conn = test_conn();
        let now = "2026-01-01T00:00:00Z";
        let id = insert(&conn, &draft("Notion", Category::Productivity, false, 0), now).unwrap();
        assert_eq!(increment(&conn, id, Counter::View).unwrap(), Some(1));
        assert_eq!(increment(&conn, id, Counter::View).unwrap(), Some(2));
        assert_eq!(increment(&conn, id, Counter::Click).unwrap(), Some(1));

        let mut d = draft("Notion", Category::Productivity, false, 0);
        d.status = ToolStatus::Inactive;
        update(&conn, id, &d, now).unwrap();
        assert_eq!(increment(&conn, id, Counter::Click).unwrap(), None);

        let stats = stats(&conn).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.total_views, 2);
        assert_eq!(stats.total_clicks, 1);
    }

    #[test]
    fn test_update_and_delete() {
        let conn = test_conn();
        let id = insert(&conn, &draft("X", Category::Other, false, 0), "2026-01-01T00:00:00Z")
            .unwrap();
        let mut d = draft("Y", Category::Other, true, 5);
        d.url = "https://y.example.com".into();
        assert!(update(&conn, id, &d, "2026-02-01T00:00:00Z").unwrap());
        let tool = get(&conn, id).unwrap().unwrap();
        assert_eq!(tool.name, "Y");
        assert_eq!(tool.updated_at, "2026-02-01T00:00:00Z");
        assert_eq!(tool.created_at, "2026-01-01T00:00:00Z");
        assert!(delete(&conn, id).unwrap());
        assert!(!delete(&conn, id).unwrap());
        assert!(!update(&conn, id, &d, "2026-02-01T00:00:00Z").unwrap());
    }
}
