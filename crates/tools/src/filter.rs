//! Function-name filtering with `*`-wildcard patterns and a fixed
//! precedence: a provider-level disable always wins, then provider block,
//! then provider allow, then the global block list, then the global allow
//! list (an empty global-allow list means "allow everything not blocked").

/// Translate a `*`-wildcard pattern (the only metacharacter supported) into
/// an anchored, case-insensitive regex. `*` matches any run of characters,
/// including none.
fn wildcard_to_regex(pattern: &str) -> regex::Regex {
    let mut escaped = String::from("^");
    for part in pattern.split('*') {
        escaped.push_str(&regex::escape(part));
        escaped.push_str(".*");
    }
    // split('*') always yields at least one segment, so pushing ".*" after
    // each leaves exactly one trailing ".*" too many — trim it and anchor.
    escaped.truncate(escaped.len() - 2);
    escaped.push('$');
    regex::RegexBuilder::new(&escaped)
        .case_insensitive(true)
        .build()
        .expect("wildcard pattern always compiles")
}

fn matches_any(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|p| wildcard_to_regex(p).is_match(name))
}

#[derive(Debug, Clone, Default)]
pub struct ProviderFilterConfig {
    pub disabled: bool,
    pub blocked: Vec<String>,
    pub allowed: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionFilter {
    pub global_blocked: Vec<String>,
    pub global_allowed: Vec<String>,
}

impl FunctionFilter {
    pub fn new(global_blocked: Vec<String>, global_allowed: Vec<String>) -> Self {
        Self {
            global_blocked,
            global_allowed,
        }
    }

    /// Is `function_name` usable for a generation against this provider?
    pub fn is_allowed(&self, provider: &ProviderFilterConfig, function_name: &str) -> bool {
        if provider.disabled {
            return false;
        }
        if matches_any(&provider.blocked, function_name) {
            return false;
        }
        if !provider.allowed.is_empty() {
            return matches_any(&provider.allowed, function_name);
        }
        if matches_any(&self.global_blocked, function_name) {
            return false;
        }
        if !self.global_allowed.is_empty() {
            return matches_any(&self.global_allowed, function_name);
        }
        true
    }
}
