//! Static routing configuration consumed by the hooks.
//!
//! Both types are built once at startup and shared read-only.

use std::collections::HashMap;
use std::fmt;

use axum::http::Method;
use regex_lite::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("dispatch rule must be `METHOD path-regex`, got {0:?}")]
    Malformed(String),

    #[error("invalid HTTP method in dispatch rule: {0:?}")]
    Method(String),

    #[error("invalid path pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },
}

/// Scopes that authenticate through bearer tokens.
///
/// Values are the user-model label configured for the scope. Only key
/// membership drives the hooks.
#[derive(Debug, Clone, Default)]
pub struct ScopeRegistry {
    scopes: HashMap<String, String>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(mut self, scope: impl Into<String>, model: impl Into<String>) -> Self {
        self.scopes.insert(scope.into(), model.into());
        self
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.scopes.contains_key(scope)
    }

    pub fn model(&self, scope: &str) -> Option<&str> {
        self.scopes.get(scope).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, S)> for ScopeRegistry {
    fn from_iter<I: IntoIterator<Item = (S, S)>>(iter: I) -> Self {
        Self {
            scopes: iter
                .into_iter()
                .map(|(scope, model)| (scope.into(), model.into()))
                .collect(),
        }
    }
}

/// A `(method, path pattern)` pair that triggers token dispatch.
///
/// The pattern is searched anywhere in the path; anchor it with `^...$` for
/// exact matches. The method is compared case-sensitively.
#[derive(Clone)]
pub struct DispatchRule {
    method: Method,
    path: Regex,
}

impl DispatchRule {
    pub fn new(method: Method, path: &str) -> Result<Self, RuleError> {
        let path = Regex::new(path).map_err(|source| RuleError::Pattern {
            pattern: path.to_string(),
            source,
        })?;
        Ok(Self { method, path })
    }

    /// Parses `"POST ^/api/login$"`.
    pub fn parse(rule: &str) -> Result<Self, RuleError> {
        let (method, path) = rule
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| RuleError::Malformed(rule.to_string()))?;

        let path = path.trim();
        if path.is_empty() {
            return Err(RuleError::Malformed(rule.to_string()));
        }

        let method =
            Method::from_bytes(method.as_bytes()).map_err(|_| RuleError::Method(method.to_string()))?;

        Self::new(method, path)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        self.path.as_str()
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.path.is_match(path) && self.method.as_str() == method.as_str()
    }
}

impl fmt::Debug for DispatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchRules {
    rules: Vec<DispatchRule>,
}

impl DispatchRules {
    pub fn new(rules: Vec<DispatchRule>) -> Self {
        Self { rules }
    }

    /// Parses `;`-separated rules, skipping blank entries.
    pub fn parse(list: &str) -> Result<Self, RuleError> {
        let rules = list
            .split(';')
            .filter(|s| !s.trim().is_empty())
            .map(DispatchRule::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// First-match scan over the configured rules.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(method, path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DispatchRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<DispatchRule> for DispatchRules {
    fn from_iter<I: IntoIterator<Item = DispatchRule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_membership() {
        let registry = ScopeRegistry::new().with_scope("user_jwt", "User");
        assert!(registry.contains("user_jwt"));
        assert!(!registry.contains("html_session"));
        assert_eq!(registry.model("user_jwt"), Some("User"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_parse_rule() {
        let rule = DispatchRule::parse("POST ^/api/login$").unwrap();
        assert_eq!(rule.method(), Method::POST);
        assert_eq!(rule.pattern(), "^/api/login$");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            DispatchRule::parse("POST"),
            Err(RuleError::Malformed(_))
        ));
        assert!(matches!(
            DispatchRule::parse("POST ^/api/(login$"),
            Err(RuleError::Pattern { .. })
        ));
        assert!(matches!(
            DispatchRule::parse("P(ST /login"),
            Err(RuleError::Method(_))
        ));
    }

    #[test]
    fn test_method_is_case_sensitive() {
        let rule = DispatchRule::parse("POST ^/api/login$").unwrap();
        let lower = Method::from_bytes(b"post").unwrap();
        assert!(rule.matches(&Method::POST, "/api/login"));
        assert!(!rule.matches(&lower, "/api/login"));
        assert!(!rule.matches(&Method::GET, "/api/login"));
    }

    #[test]
    fn test_unanchored_pattern_searches_path() {
        let rule = DispatchRule::parse("POST /login").unwrap();
        assert!(rule.matches(&Method::POST, "/api/v1/login"));
        assert!(rule.matches(&Method::POST, "/login/extra"));

        let anchored = DispatchRule::parse("POST ^/login$").unwrap();
        assert!(!anchored.matches(&Method::POST, "/login/extra"));
    }

    #[test]
    fn test_rules_parse_list() {
        let rules = DispatchRules::parse("POST ^/api/login$; GET ^/api/refresh$ ;").unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules.matches(&Method::POST, "/api/login"));
        assert!(rules.matches(&Method::GET, "/api/refresh"));
        assert!(!rules.matches(&Method::GET, "/dashboard"));
    }

    #[test]
    fn test_empty_rules_never_match() {
        let rules = DispatchRules::parse("").unwrap();
        assert!(rules.is_empty());
        assert!(!rules.matches(&Method::POST, "/api/login"));
    }

    #[test]
    fn test_rule_order_does_not_change_outcome() {
        let forward = DispatchRules::parse("POST ^/a$;GET ^/b$").unwrap();
        let reverse = DispatchRules::parse("GET ^/b$;POST ^/a$").unwrap();

        let requests = [
            (Method::POST, "/a"),
            (Method::GET, "/b"),
            (Method::GET, "/a"),
            (Method::DELETE, "/c"),
        ];
        for (method, path) in requests {
            assert_eq!(
                forward.matches(&method, path),
                reverse.matches(&method, path)
            );
        }
    }
}
