//! 头像解析
//!
//! 按顺序尝试：显式 URL → QQ 头像 → Gravatar → 字母头像，首个命中即返回。
//! 离线解析不发请求（假设 Gravatar 存在），在线解析会先校验 Gravatar 是否存在。

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::http_client::retry_linear;

/// 字母头像背景色
const LETTER_COLORS: [&str; 10] = [
    "#f56a00", "#7265e6", "#ffbf00", "#00a2ae", "#1677ff", "#52c41a", "#eb2f96", "#fa541c",
    "#13c2c2", "#722ed1",
];

/// 头像解析输入
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvatarInput {
    pub url: Option<String>,
    pub qq: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarSource {
    Url,
    Qq,
    Gravatar,
    Letter,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAvatar {
    pub source: AvatarSource,
    pub url: String,
}

/// QQ 号：5-11 位数字，不以 0 开头
pub fn is_valid_qq(qq: &str) -> bool {
    (5..=11).contains(&qq.len())
        && qq.bytes().all(|b| b.is_ascii_digit())
        && !qq.starts_with('0')
}

pub fn qq_avatar_url(qq: &str) -> String {
    format!("https://q1.qlogo.cn/g?b=qq&nk={}&s=100", qq)
}

/// Gravatar 地址（SHA-256 of trim(lower(email))，不存在时 404）
pub fn gravatar_url(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!("https://www.gravatar.com/avatar/{}?s=200&d=404", hex::encode(digest))
}

fn pick_color(name: &str) -> &'static str {
    // FNV-1a，保证同名同色
    let hash = name.bytes().fold(0x811c_9dc5_u32, |h, b| {
        (h ^ u32::from(b)).wrapping_mul(0x0100_0193)
    });
    LETTER_COLORS[hash as usize % LETTER_COLORS.len()]
}

fn escape_xml_char(c: char) -> String {
    match c {
        '&' => "&amp;".to_string(),
        '<' => "&lt;".to_string(),
        '>' => "&gt;".to_string(),
        '"' => "&quot;".to_string(),
        '\'' => "&apos;".to_string(),
        c => c.to_string(),
    }
}

/// 字母头像（SVG data URL）
pub fn letter_avatar(name: Option<&str>) -> String {
    let name = name.map(str::trim).unwrap_or_default();
    let letter = name
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect::<String>())
        .unwrap_or_else(|| "?".to_string());
    let letter: String = letter.chars().map(escape_xml_char).collect();
    let svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"100\" height=\"100\" viewBox=\"0 0 100 100\">\
         <rect width=\"100\" height=\"100\" fill=\"{}\"/>\
         <text x=\"50\" y=\"50\" dy=\".35em\" text-anchor=\"middle\" font-family=\"sans-serif\" \
         font-size=\"48\" fill=\"#ffffff\">{}</text></svg>",
        pick_color(name),
        letter
    );
    format!("data:image/svg+xml;charset=utf-8,{}", urlencoding::encode(&svg))
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// 除字母头像外的候选，按优先级排列
fn candidates(input: &AvatarInput) -> Vec<ResolvedAvatar> {
    let mut out = Vec::with_capacity(3);
    if let Some(url) = non_empty(input.url.as_ref()) {
        if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:image/")
        {
            out.push(ResolvedAvatar {
                source: AvatarSource::Url,
                url: url.to_string(),
            });
        }
    }
    if let Some(qq) = non_empty(input.qq.as_ref()).filter(|q| is_valid_qq(q)) {
        out.push(ResolvedAvatar {
            source: AvatarSource::Qq,
            url: qq_avatar_url(qq),
        });
    }
    if let Some(email) = non_empty(input.email.as_ref()).filter(|e| e.contains('@')) {
        out.push(ResolvedAvatar {
            source: AvatarSource::Gravatar,
            url: gravatar_url(email),
        });
    }
    out
}

fn letter_for(input: &AvatarInput) -> ResolvedAvatar {
    ResolvedAvatar {
        source: AvatarSource::Letter,
        url: letter_avatar(input.name.as_deref()),
    }
}

/// 离线解析（不发网络请求）
pub fn resolve_offline(input: &AvatarInput) -> ResolvedAvatar {
    candidates(input)
        .into_iter()
        .next()
        .unwrap_or_else(|| letter_for(input))
}

/// Gravatar 是否存在（404 视为不存在，网络错误重试后仍失败也视为不存在）
async fn gravatar_exists(client: &Client, url: &str) -> bool {
    let result = retry_linear(2, Duration::from_millis(300), move |_| async move {
        let response = client.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(anyhow::anyhow!("Gravatar 返回 {}", status)),
        }
    })
    .await;
    match result {
        Ok(exists) => exists,
        Err(e) => {
            tracing::debug!("Gravatar 校验失败: {}", e);
            false
        }
    }
}

/// 在线解析：`verify` 为 true 时校验 Gravatar
pub async fn resolve(client: &Client, input: &AvatarInput, verify: bool) -> ResolvedAvatar {
    for candidate in candidates(input) {
        if candidate.source == AvatarSource::Gravatar
            && verify
            && !gravatar_exists(client, &candidate.url).await
        {
            continue;
        }
        return candidate;
    }
    letter_for(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(url: Option<&str>, qq: Option<&str>, email: Option<&str>, name: Option<&str>) -> AvatarInput {
        AvatarInput {
            url: url.map(str::to_string),
            qq: qq.map(str::to_string),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_qq_validation() {
        assert!(is_valid_qq("12345"));
        assert!(is_valid_qq("12345678901"));
        assert!(!is_valid_qq("1234"));
        assert!(!is_valid_qq("123456789012"));
        assert!(!is_valid_qq("012345"));
        assert!(!is_valid_qq("12a45"));
    }

    #[test]
    fn test_explicit_url_wins() {
        let resolved = resolve_offline(&input(
            Some("https://cdn.example.com/me.png"),
            Some("123456"),
            Some("a@b.com"),
            None,
        ));
        assert_eq!(resolved.source, AvatarSource::Url);
        assert_eq!(resolved.url, "https://cdn.example.com/me.png");
    }

    #[test]
    fn test_invalid_url_falls_through_to_qq() {
        let resolved = resolve_offline(&input(Some("ftp://x"), Some("123456"), None, None));
        assert_eq!(resolved.source, AvatarSource::Qq);
        assert_eq!(resolved.url, "https://q1.qlogo.cn/g?b=qq&nk=123456&s=100");
    }

    #[test]
    fn test_gravatar_hash_normalizes_email() {
        let a = gravatar_url("  Someone@Example.COM ");
        let b = gravatar_url("someone@example.com");
        assert_eq!(a, b);
        assert!(a.starts_with("https://www.gravatar.com/avatar/"));
        assert!(a.ends_with("?s=200&d=404"));
        // sha256 十六进制
        let hash = a
            .trim_start_matches("https://www.gravatar.com/avatar/")
            .trim_end_matches("?s=200&d=404");
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_offline_assumes_gravatar_exists() {
        let resolved = resolve_offline(&input(None, Some("0123"), Some("a@b.com"), Some("x")));
        assert_eq!(resolved.source, AvatarSource::Gravatar);
    }

    #[test]
    fn test_letter_avatar_is_deterministic() {
        let resolved = resolve_offline(&input(None, None, None, Some("alice")));
        assert_eq!(resolved.source, AvatarSource::Letter);
        assert!(resolved.url.starts_with("data:image/svg+xml;charset=utf-8,"));
        assert_eq!(resolved.url, letter_avatar(Some("alice")));
        let decoded = urlencoding::decode(&resolved.url).unwrap();
        assert!(decoded.contains(">A</text>"));
        assert!(decoded.contains(pick_color("alice")));
    }

    #[test]
    fn test_letter_avatar_without_name_uses_question_mark() {
        let decoded = urlencoding::decode(&letter_avatar(None)).unwrap().into_owned();
        assert!(decoded.contains(">?</text>"));
        let escaped = urlencoding::decode(&letter_avatar(Some("<b>"))).unwrap().into_owned();
        assert!(escaped.contains(">&lt;</text>"));
    }

    #[tokio::test]
    async fn test_online_without_verify_matches_offline() {
        let client = Client::new();
        let data = input(None, None, Some("a@b.com"), Some("a"));
        assert_eq!(resolve(&client, &data, false).await, resolve_offline(&data));
    }
}
