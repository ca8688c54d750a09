//! Cookie jar
//!
//! Cookies are bucketed by domain and identified by `(domain, name)`.
//! Matching follows the cookie `Domain` attribute rules without public-suffix
//! checks: a cookie for `example.com` is sent to `example.com` and to any of
//! its subdomains.

use chrono::{DateTime, TimeDelta, Utc};
use cookie::{Cookie as RawCookie, SameSite as RawSameSite};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use url::Url;

/// SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// A stored cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: SameSite,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    /// Create a session cookie for `domain`
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            expires: None,
            http_only: false,
            secure: false,
            same_site: SameSite::Lax,
        }
    }

    pub fn is_session(&self) -> bool {
        self.expires.is_none()
    }

    /// Expired cookies have an expiry that is not in the future
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires {
            Some(expires) => expires <= now,
            None => false,
        }
    }
}

/// Host portion of a URL, lowercased
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Check if a request host matches a cookie domain
///
/// Example: "api.example.com" matches "example.com", "notexample.com" does not.
pub fn domain_matches(request_host: &str, cookie_domain: &str) -> bool {
    let cookie_domain = cookie_domain.trim_start_matches('.');

    request_host == cookie_domain
        || request_host.ends_with(&format!(".{}", cookie_domain))
}

/// Parse a single `Set-Cookie` header value received for `request_url`.
///
/// Never fails: a value the `cookie` crate rejects (no `name=` pair, empty
/// name) yields an unnamed cookie for the request host, which the jar
/// refuses to store. Unknown or malformed attributes are ignored.
pub fn parse_set_cookie(header: &str, request_url: &str) -> Cookie {
    parse_set_cookie_at(header, request_url, Utc::now())
}

pub(crate) fn parse_set_cookie_at(header: &str, request_url: &str, now: DateTime<Utc>) -> Cookie {
    let mut cookie = Cookie::new("", "", host_of(request_url).unwrap_or_default());

    let parsed = match RawCookie::parse(header) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "unparseable Set-Cookie value");
            return cookie;
        }
    };

    cookie.name = parsed.name().to_string();
    cookie.value = parsed.value().to_string();
    if let Some(domain) = parsed.domain().map(|d| d.trim_start_matches('.')) {
        if !domain.is_empty() {
            cookie.domain = domain.to_ascii_lowercase();
        }
    }
    if let Some(path) = parsed.path().filter(|p| !p.is_empty()) {
        cookie.path = path.to_string();
    }
    cookie.http_only = parsed.http_only().unwrap_or(false);
    cookie.secure = parsed.secure().unwrap_or(false);
    cookie.same_site = match parsed.same_site() {
        Some(RawSameSite::Strict) => SameSite::Strict,
        Some(RawSameSite::None) => SameSite::None,
        _ => SameSite::Lax,
    };

    // Max-Age wins over Expires; the crate already clamps negatives to zero
    cookie.expires = match parsed.max_age() {
        Some(max_age) => expiry_from_max_age(now, max_age.whole_seconds()),
        None => parsed
            .expires_datetime()
            .and_then(|at| DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())),
    };
    cookie
}

fn expiry_from_max_age(now: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    match TimeDelta::try_seconds(seconds).and_then(|delta| now.checked_add_signed(delta)) {
        Some(at) => Some(at),
        None if seconds < 0 => Some(DateTime::<Utc>::MIN_UTC),
        None => None,
    }
}

/// Split a Set-Cookie header value into individual cookies
///
/// Handles the tricky case where cookie values may contain commas
/// (e.g., in Expires date), but cookies are separated by ", name=".
pub fn split_cookies(cookies: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut rest = cookies;

    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix(", ") {
            if looks_like_cookie_start(after) {
                result.push(current.trim().to_string());
                current.clear();
                rest = after;
                continue;
            }
        }
        current.push(c);
        rest = &rest[c.len_utf8()..];
    }

    if !current.trim().is_empty() {
        result.push(current.trim().to_string());
    }

    result
}

/// Check if string starts with a cookie name pattern (token=)
fn looks_like_cookie_start(s: &str) -> bool {
    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {}
        _ => return false,
    }

    for c in chars {
        if c == '=' {
            return true;
        }
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
            return false;
        }
    }

    false
}

/// Cookies bucketed by domain, each bucket keyed by cookie name.
///
/// Both levels keep insertion order, which makes the generated `Cookie`
/// header reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CookieJar {
    domains: IndexMap<String, IndexMap<String, Cookie>>,
}

impl<'de> Deserialize<'de> for CookieJar {
    /// Loaded cookies go through [`CookieJar::store`] so hand-edited
    /// domains are normalized
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let buckets = IndexMap::<String, IndexMap<String, Cookie>>::deserialize(deserializer)?;
        let mut jar = CookieJar::new();
        for cookie in buckets.into_values().flat_map(IndexMap::into_values) {
            jar.store(cookie);
        }
        Ok(jar)
    }
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the cookie identified by `(domain, name)`.
    ///
    /// The domain is stored lowercased without a leading dot so it compares
    /// against [`host_of`].
    pub fn store(&mut self, mut cookie: Cookie) {
        cookie.domain = cookie.domain.trim_start_matches('.').to_ascii_lowercase();
        if cookie.name.is_empty() || cookie.domain.is_empty() {
            return;
        }
        self.domains
            .entry(cookie.domain.clone())
            .or_default()
            .insert(cookie.name.clone(), cookie);
    }

    /// Parse and store every cookie folded into a `Set-Cookie` header value.
    ///
    /// Returns the number of cookies stored.
    pub fn ingest(&mut self, header: &str, request_url: &str) -> usize {
        let mut stored = 0;
        for raw in split_cookies(header) {
            let cookie = parse_set_cookie(&raw, request_url);
            if !cookie.name.is_empty() && !cookie.domain.is_empty() {
                self.store(cookie);
                stored += 1;
            }
        }
        stored
    }

    pub fn get(&self, domain: &str, name: &str) -> Option<&Cookie> {
        self.domains.get(domain).and_then(|bucket| bucket.get(name))
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn cookies_in(&self, domain: &str) -> impl Iterator<Item = &Cookie> {
        self.domains.get(domain).into_iter().flat_map(|bucket| bucket.values())
    }

    /// Total number of stored cookies
    pub fn len(&self) -> usize {
        self.domains.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Cookies that apply to `url`, as name → value.
    ///
    /// Matching domains are walked in insertion order; when the same name is
    /// stored under several matching domains the last one walked wins, keeping
    /// the position where the name was first seen.
    pub fn cookies_for(&self, url: &str) -> IndexMap<String, String> {
        self.cookies_for_at(url, Utc::now())
    }

    fn cookies_for_at(&self, url: &str, now: DateTime<Utc>) -> IndexMap<String, String> {
        let mut matching = IndexMap::new();
        let Some(host) = host_of(url) else {
            return matching;
        };

        let buckets = self
            .domains
            .iter()
            .filter(|(domain, _)| domain_matches(&host, domain));

        for (_, bucket) in buckets {
            for cookie in bucket.values() {
                if cookie.is_expired_at(now) {
                    continue;
                }
                matching.insert(cookie.name.clone(), cookie.value.clone());
            }
        }

        matching
    }

    /// `name1=value1; name2=value2` for every cookie that applies to `url`
    pub fn build_cookie_header(&self, url: &str) -> String {
        self.cookies_for(url)
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Delete one cookie; an emptied domain bucket is removed
    pub fn delete(&mut self, domain: &str, name: &str) -> bool {
        let Some(bucket) = self.domains.get_mut(domain) else {
            return false;
        };
        let removed = bucket.shift_remove(name).is_some();
        if bucket.is_empty() {
            self.domains.shift_remove(domain);
        }
        removed
    }

    pub fn delete_domain(&mut self, domain: &str) -> bool {
        self.domains.shift_remove(domain).is_some()
    }

    pub fn delete_all(&mut self) {
        self.domains.clear();
    }

    /// Drop expired cookies, returning how many were removed
    pub fn purge_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.len();
        for bucket in self.domains.values_mut() {
            bucket.retain(|_, cookie| !cookie.is_expired_at(now));
        }
        self.domains.retain(|_, bucket| !bucket.is_empty());
        before - self.len()
    }
}
