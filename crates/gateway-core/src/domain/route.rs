//! Route table - maps inbound path prefixes to destinations.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::RouteConfigError;

/// Prefix that matches every path.
pub const CATCH_ALL: &str = "/";

/// Where a matched request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Forward to an upstream service rooted at this base URL.
    Upstream(String),
    /// Serve files from this local directory.
    Static(PathBuf),
}

/// A single prefix → destination mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    prefix: String,
    destination: Destination,
}

impl RouteRule {
    pub fn new(prefix: impl Into<String>, destination: Destination) -> Self {
        Self {
            prefix: normalize_prefix(prefix.into()),
            destination,
        }
    }

    pub fn upstream(prefix: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self::new(prefix, Destination::Upstream(base_url.into()))
    }

    pub fn static_dir(prefix: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::new(prefix, Destination::Static(root.into()))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn is_catch_all(&self) -> bool {
        self.prefix == CATCH_ALL
    }

    /// Segment-aware prefix match: `/assets` matches `/assets` and
    /// `/assets/app.js`, never `/assetsfoo`.
    pub fn matches(&self, path: &str) -> bool {
        if self.is_catch_all() {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Path remainder below the prefix, without a leading slash.
    pub fn remainder<'a>(&self, path: &'a str) -> &'a str {
        let rest = if self.is_catch_all() {
            path
        } else {
            path.strip_prefix(self.prefix.as_str()).unwrap_or(path)
        };
        rest.trim_start_matches('/')
    }
}

fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() && prefix.starts_with('/') {
        CATCH_ALL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Validated, ordered set of route rules.
///
/// Rules are kept longest-prefix-first with the catch-all (if any) last, so
/// the first match is always the most specific one. Immutable after construction.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    /// Validate and order the given rules.
    pub fn new(rules: Vec<RouteRule>) -> Result<Self, RouteConfigError> {
        let mut seen = HashSet::new();
        let mut catch_all_count = 0;

        for rule in &rules {
            if !rule.prefix.starts_with('/') {
                return Err(RouteConfigError::InvalidPrefix(rule.prefix.clone()));
            }
            if rule.is_catch_all() {
                catch_all_count += 1;
                if catch_all_count > 1 {
                    return Err(RouteConfigError::MultipleCatchAll);
                }
            }
            if !seen.insert(rule.prefix.clone()) {
                return Err(RouteConfigError::DuplicatePrefix(rule.prefix.clone()));
            }
            if let Destination::Upstream(url) = &rule.destination {
                if !is_absolute_http_url(url) {
                    return Err(RouteConfigError::InvalidUpstream {
                        prefix: rule.prefix.clone(),
                        url: url.clone(),
                    });
                }
            }
        }

        let mut rules = rules;
        rules.sort_by(|a, b| {
            a.is_catch_all()
                .cmp(&b.is_catch_all())
                .then_with(|| b.prefix.len().cmp(&a.prefix.len()))
                .then_with(|| {
                    let a_static = matches!(a.destination, Destination::Static(_));
                    let b_static = matches!(b.destination, Destination::Static(_));
                    b_static.cmp(&a_static)
                })
        });

        Ok(Self { rules })
    }

    /// First (most specific) rule matching `path`.
    pub fn resolve(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn has_catch_all(&self) -> bool {
        self.rules.last().is_some_and(RouteRule::is_catch_all)
    }

    /// Upstream base URLs, in evaluation order.
    pub fn upstreams(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().filter_map(|rule| match &rule.destination {
            Destination::Upstream(url) => Some(url.as_str()),
            Destination::Static(_) => None,
        })
    }
}

fn is_absolute_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        Some(rest) => {
            let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !authority.is_empty() && !authority.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::new(vec![
            RouteRule::upstream("/", "http://localhost:6000"),
            RouteRule::static_dir("/assets", "assets"),
            RouteRule::upstream("/api/orders", "http://localhost:7000"),
            RouteRule::upstream("/api", "http://localhost:6100"),
        ])
        .unwrap()
    }

    #[test]
    fn test_catch_all_is_evaluated_last() {
        let table = table();

        assert!(table.has_catch_all());
        assert!(table.rules().last().unwrap().is_catch_all());
        assert_eq!(table.rules()[0].prefix(), "/api/orders");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table();

        let rule = table.resolve("/api/orders/42").unwrap();
        assert_eq!(
            rule.destination(),
            &Destination::Upstream("http://localhost:7000".to_string())
        );

        let rule = table.resolve("/api/customers").unwrap();
        assert_eq!(rule.prefix(), "/api");
    }

    #[test]
    fn test_static_prefix_beats_catch_all() {
        let table = table();

        let rule = table.resolve("/assets/logo.png").unwrap();
        assert_eq!(rule.destination(), &Destination::Static(PathBuf::from("assets")));
        assert_eq!(rule.remainder("/assets/img/logo.png"), "img/logo.png");
    }

    #[test]
    fn test_prefix_match_respects_segments() {
        let table = table();

        let rule = table.resolve("/assetsfoo").unwrap();
        assert!(rule.is_catch_all());
        assert_eq!(rule.remainder("/assetsfoo"), "assetsfoo");
    }

    #[test]
    fn test_without_catch_all_unmatched_is_none() {
        let table = RouteTable::new(vec![RouteRule::upstream("/auth", "http://auth:6000")]).unwrap();

        assert!(!table.has_catch_all());
        assert!(table.resolve("/orders").is_none());
        assert!(table.resolve("/auth/login").is_some());
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let rule = RouteRule::upstream("/auth/", "http://auth:6000");
        assert_eq!(rule.prefix(), "/auth");
        assert!(RouteRule::upstream("///", "http://a").is_catch_all());
    }

    #[test]
    fn test_rejects_two_catch_alls() {
        let result = RouteTable::new(vec![
            RouteRule::upstream("/", "http://a:1"),
            RouteRule::static_dir("/", "public"),
        ]);

        assert_eq!(result.unwrap_err(), RouteConfigError::MultipleCatchAll);
    }

    #[test]
    fn test_rejects_duplicates_and_bad_prefixes() {
        let dup = RouteTable::new(vec![
            RouteRule::upstream("/auth", "http://a:1"),
            RouteRule::upstream("/auth/", "http://b:1"),
        ]);
        assert!(matches!(dup, Err(RouteConfigError::DuplicatePrefix(_))));

        let bad = RouteTable::new(vec![RouteRule::upstream("auth", "http://a:1")]);
        assert!(matches!(bad, Err(RouteConfigError::InvalidPrefix(_))));
    }

    #[test]
    fn test_rejects_invalid_upstream_urls() {
        for url in ["localhost:6000", "ftp://files", "http://", "http:// spaced"] {
            let result = RouteTable::new(vec![RouteRule::upstream("/", url)]);
            assert!(
                matches!(result, Err(RouteConfigError::InvalidUpstream { .. })),
                "{url} should be rejected"
            );
        }
        assert!(RouteTable::new(vec![RouteRule::upstream("/", "https://svc.internal/v1")]).is_ok());
    }
}
