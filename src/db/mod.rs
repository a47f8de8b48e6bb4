//! SQLite 存储
//!
//! 单连接 + `parking_lot::Mutex`，异步调用方通过 `spawn_blocking` 访问。
//! 各表的仓储函数均为同步函数，接收 `&Connection`，便于在测试中直接使用内存数据库。

pub mod feedback;
pub mod friend_links;
mod schema;
pub mod settings;
pub mod tools;
pub mod users;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, Row};

use crate::error::{ApiError, ApiResult};

/// 数据库句柄（可廉价克隆）
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// 打开（或创建）数据库文件并执行建表
    pub fn open(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("创建数据库目录失败: {}", parent.display()))?;
            }
        }
        let conn =
            Connection::open(path).with_context(|| format!("打开数据库失败: {}", path))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("SQLite journal_mode = {}", mode);
        Self::from_connection(conn)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        schema::migrate(&conn).context("初始化数据库表结构失败")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程池中执行数据库操作
    pub async fn call<F, R>(&self, f: F) -> ApiResult<R>
    where
        F: FnOnce(&Connection) -> ApiResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await?
    }

    /// 同步执行数据库操作（CLI 与启动阶段使用）
    pub fn call_blocking<F, R>(&self, f: F) -> ApiResult<R>
    where
        F: FnOnce(&Connection) -> ApiResult<R>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }
}

/// 读取文本列并解析为枚举
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ApiError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 动态 WHERE 子句构造器
#[derive(Default)]
pub(crate) struct WhereBuilder {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl WhereBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_placeholder(&self) -> String {
        format!("?{}", self.params.len() + 1)
    }

    /// `column = ?`
    pub(crate) fn eq<V: ToSql + 'static>(&mut self, column: &str, value: V) -> &mut Self {
        let placeholder = self.next_placeholder();
        self.clauses.push(format!("{} = {}", column, placeholder));
        self.params.push(Box::new(value));
        self
    }

    /// 任一列包含关键字（LIKE，不区分大小写）
    pub(crate) fn contains_any(&mut self, columns: &[&str], term: &str) -> &mut Self {
        let placeholder = self.next_placeholder();
        let parts: Vec<String> = columns
            .iter()
            .map(|c| format!("{} LIKE {} ESCAPE '\\'", c, placeholder))
            .collect();
        self.clauses.push(format!("({})", parts.join(" OR ")));
        self.params.push(Box::new(format!("%{}%", escape_like(term))));
        self
    }

    pub(crate) fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// 追加 LIMIT/OFFSET 参数，返回对应的 SQL 片段
    pub(crate) fn limit_offset(&mut self, limit: u32, offset: u64) -> String {
        let sql = format!(
            "LIMIT ?{} OFFSET ?{}",
            self.params.len() + 1,
            self.params.len() + 2
        );
        self.params.push(Box::new(i64::from(limit)));
        self.params.push(Box::new(offset as i64));
        sql
    }

    pub(crate) fn params(&self) -> impl Iterator<Item = &dyn ToSql> {
        self.params.iter().map(|p| p.as_ref())
    }

    pub(crate) fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// 已建表的内存连接（测试用）
#[cfg(test)]
pub(crate) fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory sqlite");
    schema::migrate(&conn).expect("migrate");
    conn
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/toolbox.db");
        let db = Database::open(path.to_str().unwrap()).unwrap();
        let count: i64 = db
            .call_blocking(|c| Ok(c.query_row("SELECT COUNT(*) FROM tools", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_call_runs_on_blocking_pool() {
        let db = Database::open_in_memory().unwrap();
        let value: i64 = db
            .call(|c| Ok(c.query_row("SELECT 40 + 2", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_where_builder() {
        let mut w = WhereBuilder::new();
        assert_eq!(w.sql(), "");
        w.eq("status", "active".to_string())
            .contains_any(&["name", "description"], "50%_off");
        assert_eq!(
            w.sql(),
            "WHERE status = ?1 AND (name LIKE ?2 ESCAPE '\\' OR description LIKE ?2 ESCAPE '\\')"
        );
        assert_eq!(w.param_count(), 2);
        assert_eq!(w.limit_offset(10, 20), "LIMIT ?3 OFFSET ?4");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
