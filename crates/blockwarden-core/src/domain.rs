//! Hostname normalization and blocked-host matching.
//!
//! Every comparison in the system happens on a normalized hostname: scheme,
//! path, query, fragment, port and a leading `www.` are stripped, and the
//! result is lowercased. A blocked entry covers itself and every subdomain.

use url::Url;

/// Normalize a user-entered domain or full URL down to a bare hostname.
pub fn normalize_domain(input: &str) -> String {
    let s = input.trim().to_ascii_lowercase();
    let s = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(&s);
    let cut = s.find(['/', '?', '#']).unwrap_or(s.len());
    let host = &s[..cut];
    let host = host.split(':').next().unwrap_or(host);
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// True when `host` equals `blocked` or is a subdomain of it.
/// Both sides must already be normalized.
pub fn host_matches(host: &str, blocked: &str) -> bool {
    if blocked.is_empty() {
        return false;
    }
    host == blocked || host.ends_with(&format!(".{blocked}"))
}

/// True when `url`'s hostname matches any entry of `blocked_hosts`.
/// Unparseable URLs never match.
pub fn is_blocked_url(url: &str, blocked_hosts: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = normalize_domain(host);
    blocked_hosts
        .iter()
        .any(|b| host_matches(&host, &normalize_domain(b)))
}
