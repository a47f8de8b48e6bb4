//! 工具目录检索
//!
//! 公开接口从一份内存中的上架工具列表做分类过滤和关键字搜索。
//! 列表由 `ToolCatalog` 做单条目缓存，任何工具写操作都会使其失效。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::db::{self, Database};
use crate::error::ApiResult;
use crate::model::tool::{Category, CategoryFilter, Tool};

/// 目录缓存有效期
pub const CATALOG_TTL: Duration = Duration::from_secs(60);

/// 过滤条件
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub category: CategoryFilter,
    pub query: Option<String>,
    pub featured_only: bool,
}

impl ToolFilter {
    /// 归一化后的搜索词（去空白、小写，空串视为无搜索）
    fn normalized_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}

/// 工具是否命中搜索词（名称、描述、任一标签包含即可）
fn matches_query(tool: &Tool, query: &str) -> bool {
    tool.name.to_lowercase().contains(query)
        || tool.description.to_lowercase().contains(query)
        || tool.tags.iter().any(|t| t.to_lowercase().contains(query))
}

/// 过滤工具列表，保持输入顺序
pub fn filter_tools(tools: &[Tool], filter: &ToolFilter) -> Vec<Tool> {
    let query = filter.normalized_query();
    tools
        .iter()
        .filter(|t| filter.category.matches(t.category))
        .filter(|t| !filter.featured_only || t.featured)
        .filter(|t| query.as_deref().is_none_or(|q| matches_query(t, q)))
        .cloned()
        .collect()
}

/// 分类计数项
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    /// 分类标识（`all` 或分类 slug）
    pub key: &'static str,
    pub label: &'static str,
    pub count: usize,
}

/// 各分类的工具数量，首项为 `全部`
pub fn category_counts(tools: &[Tool]) -> Vec<CategoryCount> {
    let mut counts = Vec::with_capacity(Category::ALL.len() + 1);
    counts.push(CategoryCount {
        key: "all",
        label: CategoryFilter::ALL_LABEL,
        count: tools.len(),
    });
    for category in Category::ALL {
        counts.push(CategoryCount {
            key: category.slug(),
            label: category.label(),
            count: tools.iter().filter(|t| t.category == category).count(),
        });
    }
    counts
}

struct CachedTools {
    tools: Arc<Vec<Tool>>,
    loaded_at: Instant,
}

/// 上架工具列表的单条目缓存
pub struct ToolCatalog {
    db: Database,
    ttl: Duration,
    entry: RwLock<Option<CachedTools>>,
    /// 每次失效 +1；加载期间发生失效时不回填缓存
    generation: AtomicU64,
}

impl ToolCatalog {
    pub fn new(db: Database) -> Self {
        Self::with_ttl(db, CATALOG_TTL)
    }

    pub fn with_ttl(db: Database, ttl: Duration) -> Self {
        Self {
            db,
            ttl,
            entry: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// 获取缓存的列表，过期或失效时从数据库重新加载
    pub async fn get(&self) -> ApiResult<Arc<Vec<Tool>>> {
        if let Some(cached) = self.entry.read().as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.tools.clone());
            }
        }

        let generation = self.generation.load(Ordering::Acquire);
        let tools = Arc::new(
            self.db
                .call(|conn| Ok(db::tools::list_active(conn)?))
                .await?,
        );

        let mut entry = self.entry.write();
        if self.generation.load(Ordering::Acquire) == generation {
            *entry = Some(CachedTools {
                tools: tools.clone(),
                loaded_at: Instant::now(),
            });
        }
        tracing::debug!("工具目录已重新加载: {} 个上架工具", tools.len());
        Ok(tools)
    }

    /// 使缓存失效（工具写操作后调用）
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.entry.write() = None;
    }

    /// 查询：读取缓存后在内存中过滤
    pub async fn search(&self, filter: &ToolFilter) -> ApiResult<Vec<Tool>> {
        let tools = self.get().await?;
        Ok(filter_tools(&tools, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tool::{ToolDraft, ToolStatus};

    fn tool(id: i64, name: &str, category: Category, tags: &[&str], featured: bool) -> Tool {
        Tool {
            id,
            name: name.to_string(),
            description: format!("{} 的描述", name),
            icon: None,
            category,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            url: format!("https://{}.example.com", id),
            featured,
            status: ToolStatus::Active,
            sort_order: 0,
            view_count: 0,
            click_count: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn sample() -> Vec<Tool> {
        vec![
            tool(1, "GitHub", Category::Development, &["Git", "代码托管"], true),
            tool(2, "Figma", Category::Design, &["UI"], false),
            tool(3, "ChatGPT", Category::Ai, &["LLM"], true),
            tool(4, "Notion", Category::Productivity, &["笔记"], false),
        ]
    }

    fn ids(tools: &[Tool]) -> Vec<i64> {
        tools.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_all_category_no_query_keeps_everything() {
        let result = filter_tools(&sample(), &ToolFilter::default());
        assert_eq!(ids(&result), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_category_filter() {
        let filter = ToolFilter {
            category: CategoryFilter::Only(Category::Design),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tools(&sample(), &filter)), vec![2]);
    }

    #[test]
    fn test_query_matches_name_description_and_tags_case_insensitive() {
        let by_name = ToolFilter {
            query: Some("  github ".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tools(&sample(), &by_name)), vec![1]);

        let by_tag = ToolFilter {
            query: Some("llm".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tools(&sample(), &by_tag)), vec![3]);

        let by_description = ToolFilter {
            query: Some("描述".into()),
            ..Default::default()
        };
        assert_eq!(filter_tools(&sample(), &by_description).len(), 4);

        let blank = ToolFilter {
            query: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(filter_tools(&sample(), &blank).len(), 4);
    }

    #[test]
    fn test_category_and_query_combined() {
        let filter = ToolFilter {
            category: CategoryFilter::Only(Category::Development),
            query: Some("figma".into()),
            featured_only: false,
        };
        assert!(filter_tools(&sample(), &filter).is_empty());
    }

    #[test]
    fn test_featured_only() {
        let filter = ToolFilter {
            featured_only: true,
            ..Default::default()
        };
        assert_eq!(ids(&filter_tools(&sample(), &filter)), vec![1, 3]);
    }

    #[test]
    fn test_category_counts() {
        let counts = category_counts(&sample());
        assert_eq!(counts.len(), 6);
        assert_eq!(counts[0].label, "全部");
        assert_eq!(counts[0].count, 4);
        let design = counts.iter().find(|c| c.key == "design").unwrap();
        assert_eq!(design.count, 1);
        let other = counts.iter().find(|c| c.key == "other").unwrap();
        assert_eq!(other.count, 0);
    }

    fn draft(url: &str) -> ToolDraft {
        ToolDraft {
            name: "Tool".into(),
            description: String::new(),
            icon: None,
            category: Category::Other,
            tags: vec![],
            url: url.into(),
            featured: false,
            status: ToolStatus::Active,
            sort_order: 0,
        }
    }

    #[tokio::test]
    async fn test_catalog_caches_until_invalidated() {
        let database = Database::open_in_memory().unwrap();
        let catalog = ToolCatalog::new(database.clone());

        database
            .call(|c| Ok(db::tools::insert(c, &draft("https://a.example.com"), "t")?))
            .await
            .unwrap();
        assert_eq!(catalog.get().await.unwrap().len(), 1);

        database
            .call(|c| Ok(db::tools::insert(c, &draft("https://b.example.com"), "t")?))
            .await
            .unwrap();
        // 未失效时仍返回缓存
        assert_eq!(catalog.get().await.unwrap().len(), 1);

        catalog.invalidate();
        assert_eq!(catalog.get().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_catalog_expires_after_ttl() {
        let database = Database::open_in_memory().unwrap();
        let catalog = ToolCatalog::with_ttl(database.clone(), Duration::ZERO);
        assert!(catalog.get().await.unwrap().is_empty());
        database
            .call(|c| Ok(db::tools::insert(c, &draft("https://a.example.com"), "t")?))
            .await
            .unwrap();
        assert_eq!(catalog.get().await.unwrap().len(), 1);
    }
}
