//! Minimal robots.txt evaluation.
//!
//! Covers the directives outlet storefronts actually serve: `User-agent`
//! groups with `Allow` and `Disallow` prefix rules. Unknown directives are
//! ignored and an empty or missing policy allows everything.

/// A single prefix rule within a user-agent group.
#[derive(Debug, Clone, PartialEq)]
enum Rule {
    Allow(String),
    Disallow(String),
}

#[derive(Debug, Clone, Default)]
struct Group {
    agents: Vec<String>,
    rules: Vec<Rule>,
}

/// A parsed robots policy.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    groups: Vec<Group>,
}

impl RobotsPolicy {
    /// Parses robots.txt content. Never fails; unparseable lines are
    /// skipped.
    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current = Group::default();
        let mut in_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim().to_string();

            match field.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group.
                    if in_rules {
                        groups.push(std::mem::take(&mut current));
                        in_rules = false;
                    }
                    current.agents.push(value.to_ascii_lowercase());
                }
                "allow" => {
                    if !current.agents.is_empty() {
                        in_rules = true;
                        current.rules.push(Rule::Allow(value));
                    }
                }
                "disallow" => {
                    if !current.agents.is_empty() {
                        in_rules = true;
                        current.rules.push(Rule::Disallow(value));
                    }
                }
                _ => {}
            }
        }
        if !current.agents.is_empty() {
            groups.push(current);
        }

        Self { groups }
    }

    /// Whether the given user agent may fetch the given path.
    ///
    /// The most specific (longest) matching rule of the applicable group
    /// wins; ties go to `Allow`. No applicable group or no matching rule
    /// means allowed.
    pub fn allows(&self, user_agent: &str, path: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };

        let mut verdict = true;
        let mut matched_len = 0usize;
        for rule in &group.rules {
            let (prefix, allow) = match rule {
                Rule::Allow(p) => (p, true),
                Rule::Disallow(p) => (p, false),
            };
            // An empty Disallow value means "allow everything".
            if prefix.is_empty() {
                continue;
            }
            if path.starts_with(prefix.as_str())
                && (prefix.len() > matched_len || (prefix.len() == matched_len && allow))
            {
                matched_len = prefix.len();
                verdict = allow;
            }
        }
        verdict
    }

    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let ua = user_agent.to_ascii_lowercase();
        // Prefer a group naming a token of our user agent over the wildcard
        // group.
        self.groups
            .iter()
            .find(|g| g.agents.iter().any(|a| a != "*" && ua.contains(a.as_str())))
            .or_else(|| self.groups.iter().find(|g| g.agents.iter().any(|a| a == "*")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "\
# storefront policy
User-agent: *
Disallow: /checkout/
Disallow: /account/
Allow: /account/public/

User-agent: badbot
Disallow: /
";

    #[test]
    fn wildcard_group_applies_to_unknown_agents() {
        let policy = RobotsPolicy::parse(POLICY);
        assert!(policy.allows("Mozilla/5.0", "/en-GB/outlet/"));
        assert!(!policy.allows("Mozilla/5.0", "/checkout/basket"));
    }

    #[test]
    fn longest_match_wins() {
        let policy = RobotsPolicy::parse(POLICY);
        assert!(!policy.allows("Mozilla/5.0", "/account/orders"));
        assert!(policy.allows("Mozilla/5.0", "/account/public/profile"));
    }

    #[test]
    fn named_group_overrides_wildcard() {
        let policy = RobotsPolicy::parse(POLICY);
        assert!(!policy.allows("BadBot/1.0", "/en-GB/outlet/"));
    }

    #[test]
    fn empty_policy_allows_everything() {
        let policy = RobotsPolicy::parse("");
        assert!(policy.allows("Mozilla/5.0", "/anything"));
    }
}
