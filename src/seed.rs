//! 种子数据
//!
//! 写入默认设置、示例工具与示例友链，供本地开发和新站点初始化使用。
//! 同时提供 `seed` 子命令与管理后台 `POST /api/admin/seed` 两个入口。

use rusqlite::Connection;
use serde::Serialize;

use crate::common::now_rfc3339;
use crate::common::validate::normalize_site_url;
use crate::db;
use crate::model::friend_link::{FriendLinkDraft, FriendLinkStatus};
use crate::model::setting::KNOWN_SETTINGS;
use crate::model::tool::{Category, ToolDraft, ToolStatus};

/// 种子执行结果
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub settings: usize,
    pub tools: usize,
    pub friend_links: usize,
    /// reset 时删除的行数
    pub removed: usize,
}

struct SeedTool {
    name: &'static str,
    description: &'static str,
    category: Category,
    tags: &'static [&'static str],
    url: &'static str,
    featured: bool,
}

const TOOLS: &[SeedTool] = &[
    SeedTool {
        name: "GitHub",
        description: "全球最大的代码托管与协作平台",
        category: Category::Development,
        tags: &["Git", "代码托管", "开源"],
        url: "https://github.com",
        featured: true,
    },
    SeedTool {
        name: "Stack Overflow",
        description: "程序员问答社区",
        category: Category::Development,
        tags: &["问答", "社区"],
        url: "https://stackoverflow.com",
        featured: false,
    },
    SeedTool {
        name: "MDN Web Docs",
        description: "权威的 Web 技术文档",
        category: Category::Development,
        tags: &["文档", "前端", "JavaScript"],
        url: "https://developer.mozilla.org",
        featured: true,
    },
    SeedTool {
        name: "Regex101",
        description: "在线正则表达式测试与解释",
        category: Category::Development,
        tags: &["正则", "调试"],
        url: "https://regex101.com",
        featured: false,
    },
    SeedTool {
        name: "Figma",
        description: "基于浏览器的协作式界面设计工具",
        category: Category::Design,
        tags: &["UI", "原型", "协作"],
        url: "https://www.figma.com",
        featured: true,
    },
    SeedTool {
        name: "Coolors",
        description: "快速生成配色方案",
        category: Category::Design,
        tags: &["配色", "调色板"],
        url: "https://coolors.co",
        featured: false,
    },
    SeedTool {
        name: "Unsplash",
        description: "免费高质量图片素材",
        category: Category::Design,
        tags: &["图片", "素材"],
        url: "https://unsplash.com",
        featured: false,
    },
    SeedTool {
        name: "TinyPNG",
        description: "智能压缩 PNG 与 JPEG 图片",
        category: Category::Design,
        tags: &["图片压缩"],
        url: "https://tinypng.com",
        featured: false,
    },
    SeedTool {
        name: "Notion",
        description: "笔记、文档与项目管理一体化工作区",
        category: Category::Productivity,
        tags: &["笔记", "文档", "协作"],
        url: "https://www.notion.so",
        featured: true,
    },
    SeedTool {
        name: "Excalidraw",
        description: "手绘风格的在线白板",
        category: Category::Productivity,
        tags: &["白板", "绘图"],
        url: "https://excalidraw.com",
        featured: false,
    },
    SeedTool {
        name: "DeepL 翻译",
        description: "高质量机器翻译",
        category: Category::Productivity,
        tags: &["翻译"],
        url: "https://www.deepl.com/translator",
        featured: false,
    },
    SeedTool {
        name: "ChatGPT",
        description: "OpenAI 推出的对话式 AI 助手",
        category: Category::Ai,
        tags: &["对话", "写作", "LLM"],
        url: "https://chat.openai.com",
        featured: true,
    },
    SeedTool {
        name: "Claude",
        description: "擅长长文本与代码的 AI 助手",
        category: Category::Ai,
        tags: &["对话", "LLM"],
        url: "https://claude.ai",
        featured: true,
    },
    SeedTool {
        name: "Hugging Face",
        description: "开源模型与数据集社区",
        category: Category::Ai,
        tags: &["模型", "数据集", "开源"],
        url: "https://huggingface.co",
        featured: false,
    },
    SeedTool {
        name: "Can I Use",
        description: "查询浏览器对前端特性的支持情况",
        category: Category::Other,
        tags: &["兼容性", "前端"],
        url: "https://caniuse.com",
        featured: false,
    },
    SeedTool {
        name: "Speedtest",
        description: "网络测速",
        category: Category::Other,
        tags: &["网络", "测速"],
        url: "https://www.speedtest.net",
        featured: false,
    },
];

/// (名称, 地址, 描述)
const FRIEND_LINKS: &[(&str, &str, &str)] = &[
    ("Rust 语言中文社区", "https://rustcc.cn", "Rust 中文开发者社区"),
    ("阮一峰的网络日志", "https://www.ruanyifeng.com/blog", "科技爱好者周刊"),
];

fn tool_draft(seed: &SeedTool, sort_order: i64) -> ToolDraft {
    ToolDraft {
        name: seed.name.to_string(),
        description: seed.description.to_string(),
        icon: None,
        category: seed.category,
        tags: seed.tags.iter().map(|t| t.to_string()).collect(),
        url: seed.url.to_string(),
        featured: seed.featured,
        status: ToolStatus::Active,
        sort_order,
    }
}

/// 写入种子数据（单事务）
///
/// `reset` 为 true 时先清空工具、友链和反馈（用户与设置保留）
pub fn run(conn: &Connection, reset: bool) -> rusqlite::Result<SeedReport> {
    let tx = conn.unchecked_transaction()?;
    let now = now_rfc3339();
    let mut report = SeedReport::default();

    if reset {
        report.removed = db::tools::delete_all(&tx)?
            + db::friend_links::delete_all(&tx)?
            + db::feedback::delete_all(&tx)?;
    }

    for (key, value) in KNOWN_SETTINGS {
        if db::settings::insert_if_missing(&tx, key, value, &now)? {
            report.settings += 1;
        }
    }

    for (index, seed) in TOOLS.iter().enumerate() {
        if db::tools::exists_url(&tx, seed.url)? {
            continue;
        }
        let views = fastrand::i64(50..5000);
        let clicks = fastrand::i64(10..=views / 2);
        db::tools::insert_with_counters(
            &tx,
            &tool_draft(seed, index as i64 * 10),
            views,
            clicks,
            &now,
        )?;
        report.tools += 1;
    }

    for (index, (name, url, description)) in FRIEND_LINKS.iter().enumerate() {
        let Some(normalized_url) = normalize_site_url(url) else {
            continue;
        };
        if db::friend_links::live_url_exists(&tx, &normalized_url, None)? {
            continue;
        }
        let draft = FriendLinkDraft {
            site_name: name.to_string(),
            site_url: url.to_string(),
            normalized_url,
            description: description.to_string(),
            logo: None,
            contact_email: None,
            sort_order: index as i64,
            expires_at: None,
        };
        db::friend_links::insert(&tx, &draft, FriendLinkStatus::Approved, &now)?;
        report.friend_links += 1;
    }

    tx.commit()?;
    tracing::info!(
        "种子数据写入完成: {} 项设置，{} 个工具，{} 个友链{}",
        report.settings,
        report.tools,
        report.friend_links,
        if reset {
            format!("（已清除 {} 条旧数据）", report.removed)
        } else {
            String::new()
        }
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    #[test]
    fn test_seed_covers_every_category() {
        for category in Category::ALL {
            assert!(
                TOOLS.iter().any(|t| t.category == category),
                "missing seed tool for {:?}",
                category
            );
        }
    }

    #[test]
    fn test_seed_is_idempotent() {
        let conn = test_conn();
        let first = run(&conn, false).unwrap();
        assert_eq!(first.tools, TOOLS.len());
        assert_eq!(first.friend_links, FRIEND_LINKS.len());
        assert_eq!(first.settings, KNOWN_SETTINGS.len());

        let second = run(&conn, false).unwrap();
        assert_eq!(second, SeedReport::default());

        let active = db::tools::list_active(&conn).unwrap();
        assert_eq!(active.len(), TOOLS.len());
        assert!(active.iter().all(|t| t.view_count >= 50 && t.click_count <= t.view_count));
    }

    #[test]
    fn test_reset_reinserts() {
        let conn = test_conn();
        run(&conn, false).unwrap();
        let report = run(&conn, true).unwrap();
        assert_eq!(report.removed, TOOLS.len() + FRIEND_LINKS.len());
        assert_eq!(report.tools, TOOLS.len());
        assert_eq!(report.settings, 0);
    }
}
