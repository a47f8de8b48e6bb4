//! sitemap.xml 与 robots.txt 生成

use crate::model::tool::Tool;

/// 静态页面（路径, 更新频率, 优先级）
const STATIC_PAGES: &[(&str, &str, &str)] = &[
    ("/about", "monthly", "0.5"),
    ("/friends", "monthly", "0.5"),
    ("/feedback", "monthly", "0.5"),
];

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn push_url(out: &mut String, loc: &str, lastmod: Option<&str>, changefreq: &str, priority: &str) {
    out.push_str("  <url>\n");
    out.push_str(&format!("    <loc>{}</loc>\n", escape_xml(loc)));
    if let Some(lastmod) = lastmod {
        out.push_str(&format!("    <lastmod>{}</lastmod>\n", escape_xml(lastmod)));
    }
    out.push_str(&format!("    <changefreq>{}</changefreq>\n", changefreq));
    out.push_str(&format!("    <priority>{}</priority>\n", priority));
    out.push_str("  </url>\n");
}

/// 生成 sitemap，`base_url` 不含结尾 `/`
pub fn sitemap_xml(base_url: &str, tools: &[Tool]) -> String {
    let base = base_url.trim_end_matches('/');
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    push_url(&mut out, &format!("{}/", base), None, "daily", "1.0");
    for (path, changefreq, priority) in STATIC_PAGES {
        push_url(&mut out, &format!("{}{}", base, path), None, changefreq, priority);
    }
    for tool in tools {
        // updatedAt 取日期部分
        let lastmod = tool.updated_at.get(..10).filter(|d| !d.is_empty());
        push_url(
            &mut out,
            &format!("{}/tools/{}", base, tool.id),
            lastmod,
            "weekly",
            "0.8",
        );
    }
    out.push_str("</urlset>\n");
    out
}

pub fn robots_txt(base_url: &str) -> String {
    format!(
        "User-agent: *\nAllow: /\nDisallow: /admin\nDisallow: /api/\n\nSitemap: {}/sitemap.xml\n",
        base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tool::{Category, ToolStatus};

    fn tool(id: i64, updated_at: &str) -> Tool {
        Tool {
            id,
            name: "T".into(),
            description: String::new(),
            icon: None,
            category: Category::Other,
            tags: vec![],
            url: "https://t.example.com".into(),
            featured: false,
            status: ToolStatus::Active,
            sort_order: 0,
            view_count: 0,
            click_count: 0,
            created_at: String::new(),
            updated_at: updated_at.into(),
        }
    }

    #[test]
    fn test_sitemap_contains_pages_and_tools() {
        let xml = sitemap_xml("https://tools.example.com/", &[tool(7, "2026-03-04T05:06:07Z")]);
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://tools.example.com/</loc>"));
        assert!(xml.contains("<loc>https://tools.example.com/about</loc>"));
        assert!(xml.contains("<loc>https://tools.example.com/feedback</loc>"));
        assert!(xml.contains("<loc>https://tools.example.com/tools/7</loc>"));
        assert!(xml.contains("<lastmod>2026-03-04</lastmod>"));
        assert!(xml.contains("<priority>0.8</priority>"));
        assert_eq!(xml.matches("<url>").count(), 5);
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn test_sitemap_escapes_and_skips_empty_lastmod() {
        let xml = sitemap_xml("https://a.com/?x=1&y=2", &[tool(1, "")]);
        assert!(xml.contains("https://a.com/?x=1&amp;y=2/about"));
        assert!(!xml.contains("<lastmod>"));
    }

    #[test]
    fn test_robots() {
        let robots = robots_txt("https://tools.example.com/");
        assert!(robots.contains("Disallow: /admin\n"));
        assert!(robots.contains("Disallow: /api/\n"));
        assert!(robots.ends_with("Sitemap: https://tools.example.com/sitemap.xml\n"));
    }
}
