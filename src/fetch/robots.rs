//! Per-domain robots.txt cache. Fail-closed: a robots fetch or parse
//! problem caches a disallow-all entry (with a shorter TTL so a
//! transient outage self-heals) rather than assuming permission.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsVerdict {
    Allowed,
    Disallowed,
}

/// One parsed rule line from the group that applies to our agent.
#[derive(Debug, Clone)]
struct RobotsRule {
    allow: bool,
    pattern: String,
}

/// Parsed rules for one domain.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    rules: Vec<RobotsRule>,
    deny_everything: bool,
}

impl RobotsRules {
    /// Parses the rule group applying to `user_agent`, falling back to
    /// the `*` group. A specific group replaces wildcard rules.
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let mut wildcard: Vec<RobotsRule> = Vec::new();
        let mut specific: Vec<RobotsRule> = Vec::new();
        let mut in_wildcard = false;
        let mut in_specific = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_ascii_lowercase();
            let value = value.trim();
            match directive.as_str() {
                "user-agent" => {
                    let agent = value.to_ascii_lowercase();
                    in_wildcard = agent == "*";
                    in_specific = !in_wildcard && ua.contains(&agent);
                }
                "allow" | "disallow" => {
                    let allow = directive == "allow";
                    if value.is_empty() {
                        continue;
                    }
                    let rule = RobotsRule {
                        allow,
                        pattern: value.to_string(),
                    };
                    if in_specific {
                        specific.push(rule);
                    } else if in_wildcard {
                        wildcard.push(rule);
                    }
                }
                _ => {}
            }
        }

        Self {
            rules: if specific.is_empty() { wildcard } else { specific },
            deny_everything: false,
        }
    }

    /// The fail-closed entry cached after a robots fetch/parse error.
    pub fn deny_all() -> Self {
        Self {
            rules: Vec::new(),
            deny_everything: true,
        }
    }

    /// Longest-match-wins; on a tie, allow wins. No matching rule means
    /// allowed.
    pub fn is_allowed(&self, path: &str) -> bool {
        if self.deny_everything {
            return false;
        }
        let mut best: Option<(usize, bool)> = None;
        for rule in &self.rules {
            if pattern_matches(path, &rule.pattern) {
                let len = rule.pattern.len();
                match best {
                    Some((best_len, best_allow)) => {
                        if len > best_len || (len == best_len && rule.allow && !best_allow) {
                            best = Some((len, rule.allow));
                        }
                    }
                    None => best = Some((len, rule.allow)),
                }
            }
        }
        best.map(|(_, allow)| allow).unwrap_or(true)
    }
}

/// Robots pattern match: prefix semantics with `*` wildcards and an
/// optional `$` end anchor.
fn pattern_matches(path: &str, pattern: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let parts: Vec<&str> = pattern.split('*').collect();

    let mut pos = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if anchored && i == parts.len() - 1 {
            // The final literal of an anchored pattern must sit at the
            // very end of the path. Its first occurrence may be earlier
            // (e.g. `/*.pdf$` against `/a.pdf.pdf`), so match the path
            // suffix instead of scanning forward.
            if i == 0 {
                return path == *part;
            }
            return path.len() >= pos + part.len() && path.ends_with(part);
        }
        match path[pos..].find(part) {
            Some(found) if i > 0 || found == 0 => pos += found + part.len(),
            _ => return false,
        }
    }
    // A trailing `*` absorbs the rest of the path even under `$`.
    !anchored || pattern.ends_with('*') || pos == path.len()
}

/// Cached per-domain robots policy.
pub struct RobotsCache {
    user_agent: String,
    success_ttl: Duration,
    failure_ttl: Duration,
    entries: Mutex<HashMap<String, (RobotsRules, Instant, Duration)>>,
    client: reqwest::Client,
}

impl RobotsCache {
    pub fn new(
        client: reqwest::Client,
        user_agent: impl Into<String>,
        success_ttl: Duration,
        failure_ttl: Duration,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            success_ttl,
            failure_ttl,
            entries: Mutex::new(HashMap::new()),
            client,
        }
    }

    /// Checks whether `url`'s path is allowed for our agent, fetching
    /// and caching the domain's robots.txt if needed. Any fetch or
    /// parse problem yields `Disallowed`.
    pub async fn check(&self, url: &Url) -> RobotsVerdict {
        let Some(host) = url.host_str() else {
            return RobotsVerdict::Disallowed;
        };
        let host = host.to_string();
        let path = url.path().to_string();

        if let Some(rules) = self.cached(&host) {
            return verdict(rules.is_allowed(&path));
        }

        let (rules, ttl) = match self.fetch_rules(url, &host).await {
            Some(rules) => (rules, self.success_ttl),
            None => {
                warn!(host, "robots.txt unavailable; failing closed");
                (RobotsRules::deny_all(), self.failure_ttl)
            }
        };

        let allowed = rules.is_allowed(&path);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(host, (rules, Instant::now(), ttl));
        verdict(allowed)
    }

    /// Seeds the cache directly. Used by tests and by admin tooling
    /// that pre-validates a domain.
    pub fn seed(&self, host: &str, rules: RobotsRules, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(host.to_string(), (rules, Instant::now(), ttl));
    }

    fn cached(&self, host: &str) -> Option<RobotsRules> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(host).and_then(|(rules, fetched_at, ttl)| {
            (fetched_at.elapsed() < *ttl).then(|| rules.clone())
        })
    }

    async fn fetch_rules(&self, url: &Url, host: &str) -> Option<RobotsRules> {
        let robots_url = format!("{}://{}/robots.txt", url.scheme(), host_with_port(url));
        let response = self.client.get(&robots_url).send().await.ok()?;
        let status = response.status();
        if status.is_success() {
            let body = response.text().await.ok()?;
            debug!(host, "robots.txt fetched");
            Some(RobotsRules::parse(&body, &self.user_agent))
        } else if status.as_u16() == 404 {
            // An absent robots.txt is an explicit allow-everything.
            Some(RobotsRules::default())
        } else {
            None
        }
    }
}

fn host_with_port(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_string(),
    }
}

fn verdict(allowed: bool) -> RobotsVerdict {
    if allowed {
        RobotsVerdict::Allowed
    } else {
        RobotsVerdict::Disallowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_group_replaces_wildcard() {
        let content = "\
User-agent: *\n\
Disallow: /private/\n\
\n\
User-agent: ammobot\n\
Disallow: /admin/\n";
        let rules = RobotsRules::parse(content, "ammobot/1.0");
        assert!(!rules.is_allowed("/admin/settings"));
        assert!(rules.is_allowed("/private/catalog"));
    }

    #[test]
    fn longest_match_wins_and_allow_breaks_ties() {
        let content = "\
User-agent: *\n\
Disallow: /shop/\n\
Allow: /shop/ammo/\n";
        let rules = RobotsRules::parse(content, "ammobot");
        assert!(!rules.is_allowed("/shop/gear"));
        assert!(rules.is_allowed("/shop/ammo/9mm"));
        assert!(rules.is_allowed("/home"));
    }

    #[test]
    fn wildcard_and_anchor_patterns() {
        assert!(pattern_matches("/p/cat.pdf", "/*.pdf$"));
        assert!(!pattern_matches("/p/cat.pdf?x=1", "/*.pdf$"));
        assert!(pattern_matches("/cart/checkout", "/cart/"));
        assert!(!pattern_matches("/shop", "/cart/"));
        assert!(pattern_matches("/cart", "/cart$"));
        assert!(!pattern_matches("/cart/x", "/cart$"));
        assert!(pattern_matches("/downloads/anything", "/downloads/*$"));
    }

    #[test]
    fn anchored_wildcard_matches_repeated_suffixes() {
        // The anchor literal can occur earlier in the path too; only the
        // end position counts.
        assert!(pattern_matches("/a.pdf.pdf", "/*.pdf$"));
        assert!(!pattern_matches("/a.pdf.html", "/*.pdf$"));
        assert!(pattern_matches("/x/sale-sale/buy-sale", "/*sale*sale$"));
    }

    #[test]
    fn anchored_wildcard_disallow_is_not_bypassed() {
        let rules = RobotsRules::parse("User-agent: *\nDisallow: /*.pdf$\n", "ammobot");
        assert!(!rules.is_allowed("/a.pdf"));
        assert!(!rules.is_allowed("/a.pdf.pdf"));
        assert!(rules.is_allowed("/a.pdf.html"));
    }

    #[test]
    fn deny_all_refuses_everything() {
        let rules = RobotsRules::deny_all();
        assert!(!rules.is_allowed("/"));
        assert!(!rules.is_allowed("/anything"));
    }

    #[test]
    fn no_rules_means_allowed() {
        let rules = RobotsRules::parse("", "ammobot");
        assert!(rules.is_allowed("/any/path"));
    }

    #[tokio::test]
    async fn seeded_cache_is_consulted_without_network() {
        let cache = RobotsCache::new(
            reqwest::Client::new(),
            "ammobot",
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );
        cache.seed(
            "shop.test",
            RobotsRules::parse("User-agent: *\nDisallow: /blocked/\n", "ammobot"),
            Duration::from_secs(3600),
        );
        let blocked = Url::parse("https://shop.test/blocked/item").unwrap();
        let open = Url::parse("https://shop.test/item").unwrap();
        assert_eq!(cache.check(&blocked).await, RobotsVerdict::Disallowed);
        assert_eq!(cache.check(&open).await, RobotsVerdict::Allowed);
    }
}
