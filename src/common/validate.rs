//! 输入校验工具

use reqwest::Url;

/// 解析绝对 http(s) URL
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

/// 是否为绝对 http(s) URL
pub fn is_http_url(raw: &str) -> bool {
    parse_http_url(raw).is_some()
}

/// 粗略校验邮箱格式：`local@domain.tld`
pub fn looks_like_email(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.len() > 254 || raw.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && tld.len() >= 2,
        None => false,
    }
}

/// 归一化站点 URL，用于友链去重
///
/// 保留协议与非默认端口，host 转小写（`www.` 前缀保留），去掉查询串、片段和路径结尾的 `/`
pub fn normalize_site_url(raw: &str) -> Option<String> {
    let url = parse_http_url(raw)?;
    let host = url.host_str()?.to_lowercase();
    let mut normalized = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        normalized.push_str(&format!(":{}", port));
    }
    let path = url.path().trim_end_matches('/');
    normalized.push_str(path);
    Some(normalized)
}

/// 按字符（而非字节）计算长度
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://example.com"));
        assert!(is_http_url("http://example.com/path?q=1"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
        assert!(!is_http_url("javascript:alert(1)"));
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("user@example.com"));
        assert!(looks_like_email(" user.name+tag@sub.example.cn "));
        assert!(!looks_like_email("user@example"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("user example@example.com"));
        assert!(!looks_like_email("a@b@c.com"));
    }

    #[test]
    fn test_normalize_site_url() {
        assert_eq!(
            normalize_site_url("https://Example.COM/").as_deref(),
            Some("https://example.com")
        );
        assert_eq!(
            normalize_site_url("https://example.com/blog/").as_deref(),
            Some("https://example.com/blog")
        );
        assert_eq!(
            normalize_site_url("http://example.com:8080").as_deref(),
            Some("http://example.com:8080")
        );
        assert_eq!(
            normalize_site_url("https://www.Example.com/?ref=1#top").as_deref(),
            Some("https://www.example.com")
        );
        assert_eq!(
            normalize_site_url("https://example.com:443/").as_deref(),
            Some("https://example.com")
        );
        assert!(normalize_site_url("not a url").is_none());
    }

    #[test]
    fn test_char_len_counts_chars() {
        assert_eq!(char_len("工具"), 2);
        assert_eq!(char_len("ab"), 2);
    }
}
