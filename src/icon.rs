//! 网站图标提取
//!
//! 依次抓取页面 HTML（解析 `<link>`）、manifest（解析 `icons`），
//! 最后补上 `/favicon.ico` 兜底，按优先级和尺寸排序后返回最佳候选。

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::common::validate::parse_http_url;
use crate::error::{ApiError, ApiResult};
use crate::http_client::fetch_text;

static LINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("link tag regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("attribute regex")
});

/// 页面与 manifest 的抓取次数
const FETCH_ATTEMPTS: u32 = 2;

/// 候选来源，数值越小优先级越高
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconKind {
    AppleTouchIcon = 1,
    Manifest = 2,
    SizedIcon = 3,
    Icon = 4,
    MaskIcon = 5,
    Favicon = 6,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IconCandidate {
    pub url: String,
    pub kind: IconKind,
    pub sizes: Option<String>,
    pub priority: u8,
}

impl IconCandidate {
    fn new(url: Url, kind: IconKind, sizes: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            kind,
            sizes: sizes.filter(|s| !s.trim().is_empty()),
            priority: kind as u8,
        }
    }

    /// 声明尺寸中的最大边长，`any` 视为最大
    fn size_score(&self) -> u32 {
        self.sizes.as_deref().map(parse_sizes).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IconResult {
    pub best: IconCandidate,
    pub candidates: Vec<IconCandidate>,
}

/// 解析 `sizes` 属性，如 `"16x16 32x32"` 返回 32
pub fn parse_sizes(sizes: &str) -> u32 {
    sizes
        .split_whitespace()
        .filter_map(|token| {
            if token.eq_ignore_ascii_case("any") {
                return Some(u32::MAX);
            }
            let (w, h) = token.to_ascii_lowercase().split_once('x').map(|(w, h)| {
                (w.parse::<u32>().ok(), h.parse::<u32>().ok())
            })?;
            Some(w?.max(h?))
        })
        .max()
        .unwrap_or(0)
}

fn attributes(tag: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))?
                .as_str()
                .trim()
                .to_string();
            Some((name, value))
        })
        .collect()
}

/// 解析 HTML 中的图标 `<link>`，返回候选列表与 manifest 地址
pub fn parse_link_icons(html: &str, page: &Url) -> (Vec<IconCandidate>, Option<Url>) {
    let mut icons = Vec::new();
    let mut manifest = None;

    for tag in LINK_TAG.find_iter(html) {
        let attrs = attributes(tag.as_str());
        let get = |key: &str| {
            attrs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, v)| v.clone())
        };
        let (Some(rel), Some(href)) = (get("rel"), get("href")) else {
            continue;
        };
        if href.is_empty() {
            continue;
        }
        let Ok(url) = page.join(&href) else {
            continue;
        };
        let rel = rel.to_ascii_lowercase();
        let tokens: Vec<&str> = rel.split_whitespace().collect();
        let sizes = get("sizes");

        let kind = if tokens
            .iter()
            .any(|t| t.starts_with("apple-touch-icon"))
        {
            IconKind::AppleTouchIcon
        } else if tokens.contains(&"mask-icon") {
            IconKind::MaskIcon
        } else if tokens.contains(&"manifest") {
            if manifest.is_none() {
                manifest = Some(url);
            }
            continue;
        } else if tokens.contains(&"icon") {
            if sizes.as_deref().map(parse_sizes).unwrap_or(0) > 0 {
                IconKind::SizedIcon
            } else {
                IconKind::Icon
            }
        } else {
            continue;
        };
        icons.push(IconCandidate::new(url, kind, sizes));
    }

    (icons, manifest)
}

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    icons: Vec<ManifestIcon>,
}

#[derive(Deserialize)]
struct ManifestIcon {
    src: String,
    sizes: Option<String>,
}

/// 解析 manifest 中的 icons，相对地址按 manifest 地址解析
pub fn parse_manifest_icons(json: &str, manifest_url: &Url) -> Vec<IconCandidate> {
    let manifest: Manifest = match serde_json::from_str(json) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!("manifest 解析失败 {}: {}", manifest_url, e);
            return Vec::new();
        }
    };
    manifest
        .icons
        .into_iter()
        .filter_map(|icon| {
            let url = manifest_url.join(icon.src.trim()).ok()?;
            Some(IconCandidate::new(url, IconKind::Manifest, icon.sizes))
        })
        .collect()
}

/// `<origin>/favicon.ico`
pub fn favicon_candidate(page: &Url) -> Option<IconCandidate> {
    let url = page.join("/favicon.ico").ok()?;
    Some(IconCandidate::new(url, IconKind::Favicon, None))
}

/// 按优先级升序、同优先级尺寸降序排序，并按 URL 去重（保留排名靠前者）
pub fn rank(mut candidates: Vec<IconCandidate>) -> Vec<IconCandidate> {
    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.size_score().cmp(&a.size_score()))
    });
    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.url.clone()));
    candidates
}

/// 提取网站图标
pub async fn extract_icons(client: &Client, site_url: &str) -> ApiResult<IconResult> {
    let page = parse_http_url(site_url.trim())
        .ok_or_else(|| ApiError::invalid("网站地址必须是 http(s) 链接"))?;

    let mut candidates = Vec::new();
    match fetch_text(client, page.as_str(), FETCH_ATTEMPTS).await {
        Ok(html) => {
            let (links, manifest) = parse_link_icons(&html, &page);
            candidates.extend(links);
            if let Some(manifest_url) = manifest {
                match fetch_text(client, manifest_url.as_str(), FETCH_ATTEMPTS).await {
                    Ok(json) => candidates.extend(parse_manifest_icons(&json, &manifest_url)),
                    Err(e) => tracing::warn!("获取 manifest 失败 {}: {:#}", manifest_url, e),
                }
            }
        }
        Err(e) => tracing::warn!("获取页面失败 {}: {:#}，仅使用 favicon.ico", page, e),
    }
    candidates.extend(favicon_candidate(&page));

    let candidates = rank(candidates);
    let best = candidates
        .first()
        .cloned()
        .ok_or_else(|| ApiError::internal("未找到任何图标候选"))?;
    tracing::debug!("{} 的最佳图标: {} ({:?})", page, best.url, best.kind);
    Ok(IconResult { best, candidates })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/docs/index.html").unwrap()
    }

    const HTML: &str = r##"
        <html><head>
        <link rel="stylesheet" href="/style.css">
        <link rel="icon" href="/favicon-16.png" sizes="16x16">
        <link rel="icon" href="/favicon-32.png" sizes="32x32">
        <link rel="shortcut icon" href="favicon.ico">
        <LINK REL='apple-touch-icon' HREF='/apple.png'>
        <link href="/safari.svg" rel="mask-icon" color="#000">
        <link rel="manifest" href="/site.webmanifest">
        </head></html>
    "##;

    #[test]
    fn test_parse_sizes() {
        assert_eq!(parse_sizes("16x16"), 16);
        assert_eq!(parse_sizes("16x16 48X48 32x32"), 48);
        assert_eq!(parse_sizes("any"), u32::MAX);
        assert_eq!(parse_sizes("bogus"), 0);
    }

    #[test]
    fn test_parse_link_icons() {
        let (icons, manifest) = parse_link_icons(HTML, &page());
        assert_eq!(icons.len(), 5);
        assert_eq!(
            manifest.map(|m| m.to_string()).as_deref(),
            Some("https://example.com/site.webmanifest")
        );
        let shortcut = icons.iter().find(|i| i.kind == IconKind::Icon).unwrap();
        // 相对地址按页面地址解析
        assert_eq!(shortcut.url, "https://example.com/docs/favicon.ico");
        assert!(icons.iter().any(|i| i.kind == IconKind::AppleTouchIcon));
        assert!(icons.iter().any(|i| i.kind == IconKind::MaskIcon));
        assert_eq!(
            icons.iter().filter(|i| i.kind == IconKind::SizedIcon).count(),
            2
        );
    }

    #[test]
    fn test_parse_manifest_icons() {
        let manifest_url = Url::parse("https://example.com/static/site.webmanifest").unwrap();
        let json = r#"{"name":"x","icons":[{"src":"icon-192.png","sizes":"192x192"},{"src":"/icon-any.svg","sizes":"any"}]}"#;
        let icons = parse_manifest_icons(json, &manifest_url);
        assert_eq!(icons.len(), 2);
        assert_eq!(icons[0].url, "https://example.com/static/icon-192.png");
        assert_eq!(icons[1].url, "https://example.com/icon-any.svg");
        assert!(parse_manifest_icons("not json", &manifest_url).is_empty());
    }

    #[test]
    fn test_rank_priority_then_size() {
        let (mut icons, _) = parse_link_icons(HTML, &page());
        let manifest_url = Url::parse("https://example.com/m.json").unwrap();
        icons.extend(parse_manifest_icons(
            r#"{"icons":[{"src":"/m-192.png","sizes":"192x192"},{"src":"/m-512.png","sizes":"512x512"}]}"#,
            &manifest_url,
        ));
        icons.extend(favicon_candidate(&page()));

        let ranked = rank(icons);
        let urls: Vec<&str> = ranked.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/apple.png",
                "https://example.com/m-512.png",
                "https://example.com/m-192.png",
                "https://example.com/favicon-32.png",
                "https://example.com/favicon-16.png",
                "https://example.com/docs/favicon.ico",
                "https://example.com/safari.svg",
                "https://example.com/favicon.ico",
            ]
        );
    }

    #[test]
    fn test_rank_dedups_keeping_best() {
        let url = Url::parse("https://example.com/favicon.ico").unwrap();
        let ranked = rank(vec![
            IconCandidate::new(url.clone(), IconKind::Favicon, None),
            IconCandidate::new(url, IconKind::Icon, None),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].kind, IconKind::Icon);
    }

    #[tokio::test]
    async fn test_extract_rejects_non_http_url() {
        let client = Client::new();
        let err = extract_icons(&client, "ftp://example.com").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }
}
