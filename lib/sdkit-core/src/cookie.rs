//! In-memory cookie jar.
//!
//! Stores cookies from `Set-Cookie` response headers and produces the
//! `Cookie` header for later requests. Matching follows domain, path, the
//! `Secure` flag and `Max-Age`; `Expires` dates are not interpreted, so such
//! cookies live for the lifetime of the jar.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
    secure: bool,
    expires_at: Option<Instant>,
}

impl StoredCookie {
    fn parse(header: &str, url: &url::Url, now: Instant) -> Option<Self> {
        let mut attributes = header.split(';');
        let (name, value) = attributes.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();

        let mut cookie = Self {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            domain: host,
            host_only: true,
            path: default_path(url),
            secure: false,
            expires_at: None,
        };

        for attribute in attributes {
            let (key, value) = attribute
                .split_once('=')
                .map_or((attribute.trim(), ""), |(k, v)| (k.trim(), v.trim()));
            match key.to_ascii_lowercase().as_str() {
                "domain" if !value.is_empty() => {
                    let domain = value.trim_start_matches('.').to_ascii_lowercase();
                    // A server may only widen the cookie to one of its parent domains.
                    if !domain_matches(&cookie.domain, &domain) {
                        return None;
                    }
                    cookie.domain = domain;
                    cookie.host_only = false;
                }
                "path" if value.starts_with('/') => cookie.path = value.to_string(),
                "secure" => cookie.secure = true,
                "max-age" => {
                    let seconds = value.parse::<i64>().ok()?;
                    let ttl = u64::try_from(seconds).unwrap_or(0);
                    cookie.expires_at = Some(now + Duration::from_secs(ttl));
                }
                _ => {}
            }
        }
        Some(cookie)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn matches(&self, url: &url::Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(&host, &self.domain)
        };
        domain_ok && path_matches(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }

    fn same_slot(&self, other: &Self) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || request_path.strip_prefix(cookie_path).is_some_and(|rest| {
            cookie_path.ends_with('/') || rest.starts_with('/')
        })
}

fn default_path(url: &url::Url) -> String {
    match url.path().rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => "/".to_string(),
    }
}

/// A shareable cookie jar; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Arc<Mutex<Vec<StoredCookie>>>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the cookies of `Set-Cookie` header values received from `url`.
    ///
    /// A cookie with a non-positive `Max-Age` removes the stored one.
    pub fn store<'a>(&self, url: &url::Url, set_cookies: impl IntoIterator<Item = &'a str>) {
        let now = Instant::now();
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        for header in set_cookies {
            let Some(cookie) = StoredCookie::parse(header, url, now) else {
                tracing::debug!(header, "ignoring malformed or foreign Set-Cookie");
                continue;
            };
            cookies.retain(|stored| !stored.same_slot(&cookie));
            if !cookie.is_expired(now) {
                cookies.push(cookie);
            }
        }
        cookies.retain(|stored| !stored.is_expired(now));
    }

    /// The `Cookie` header value for a request to `url`, if any cookie matches.
    #[must_use]
    pub fn header_for(&self, url: &url::Url) -> Option<String> {
        let now = Instant::now();
        let cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        let pairs: Vec<String> = cookies
            .iter()
            .filter(|cookie| !cookie.is_expired(now) && cookie.matches(url))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Stored (name, value) pairs, in insertion order.
    #[must_use]
    pub fn cookies(&self) -> Vec<(String, String)> {
        let now = Instant::now();
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|cookie| !cookie.is_expired(now))
            .map(|cookie| (cookie.name.clone(), cookie.value.clone()))
            .collect()
    }

    /// Number of stored cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies().len()
    }

    /// Whether the jar is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every cookie.
    pub fn clear(&self) {
        self.cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> url::Url {
        url::Url::parse(raw).expect("valid URL")
    }

    #[test]
    fn store_and_send_back() {
        let jar = CookieJar::new();
        jar.store(
            &url("https://api.example.com/cgi-bin/login"),
            ["session=abc; Path=/; HttpOnly", "lang=zh_CN"],
        );

        assert_eq!(
            jar.header_for(&url("https://api.example.com/cgi-bin/user")),
            Some("session=abc; lang=zh_CN".to_string())
        );
        assert_eq!(
            jar.header_for(&url("https://api.example.com/other")),
            Some("session=abc".to_string())
        );
        assert_eq!(jar.header_for(&url("https://other.example.com/")), None);
    }

    #[test]
    fn domain_attribute_widens_to_subdomains() {
        let jar = CookieJar::new();
        jar.store(&url("https://login.example.com/"), ["sid=1; Domain=.example.com"]);
        jar.store(&url("https://login.example.com/"), ["evil=1; Domain=attacker.com"]);

        assert_eq!(jar.len(), 1);
        assert_eq!(
            jar.header_for(&url("https://api.example.com/")),
            Some("sid=1".to_string())
        );
        assert_eq!(jar.header_for(&url("https://notexample.com/")), None);
    }

    #[test]
    fn secure_cookies_need_https() {
        let jar = CookieJar::new();
        jar.store(&url("https://example.com/"), ["token=t; Secure"]);

        assert_eq!(jar.header_for(&url("http://example.com/")), None);
        assert!(jar.header_for(&url("https://example.com/")).is_some());
    }

    #[test]
    fn max_age_zero_deletes() {
        let jar = CookieJar::new();
        let origin = url("https://example.com/");
        jar.store(&origin, ["a=1", "b=2"]);
        jar.store(&origin, ["a=gone; Max-Age=0"]);

        assert_eq!(jar.cookies(), vec![("b".to_string(), "2".to_string())]);
    }

    #[test]
    fn replaces_same_cookie() {
        let jar = CookieJar::new();
        let origin = url("https://example.com/");
        jar.store(&origin, ["a=1"]);
        jar.store(&origin, ["a=2"]);

        assert_eq!(jar.cookies(), vec![("a".to_string(), "2".to_string())]);
        jar.clear();
        assert!(jar.is_empty());
    }

    #[test]
    fn path_matching() {
        assert!(path_matches("/api/users", "/api"));
        assert!(path_matches("/api/", "/api/"));
        assert!(!path_matches("/apiv2", "/api"));
        assert_eq!(default_path(&url("https://e.com/a/b/c")), "/a/b");
        assert_eq!(default_path(&url("https://e.com/a")), "/");
    }
}
