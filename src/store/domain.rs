//! Hostname to cookie-domain derivation.

use std::sync::LazyLock;

use regex::Regex;

/// Pattern matching the shared domain family, from the family label to the end
/// of the hostname.
pub const DEFAULT_DOMAIN_PATTERN: &str = "freelancer.*$";

#[allow(clippy::expect_used)]
static DEFAULT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DEFAULT_DOMAIN_PATTERN).expect("default domain regex is valid") // Static pattern, safe to panic
});

/// Errors building a [`DomainRule`].
#[derive(Debug, thiserror::Error)]
pub enum DomainRuleError {
    /// The family pattern is not a valid regular expression.
    #[error("invalid domain pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Derives the cookie domain for a hostname so that cookies are shared across
/// all subdomains of a known domain family.
///
/// When the pattern matches, everything from the leftmost match onward is kept
/// and prefixed with `.`; otherwise the hostname is returned unchanged and the
/// cookie stays scoped to that exact host.
#[derive(Debug, Clone)]
pub struct DomainRule {
    pattern: Regex,
}

impl DomainRule {
    /// Builds a rule from a regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`DomainRuleError::InvalidPattern`] if `pattern` does not compile.
    pub fn new(pattern: &str) -> Result<Self, DomainRuleError> {
        let pattern = Regex::new(pattern).map_err(|source| DomainRuleError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { pattern })
    }

    /// Returns the pattern source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns the cookie domain for `host_name`.
    #[must_use]
    pub fn derive(&self, host_name: &str) -> String {
        match self.pattern.find(host_name) {
            Some(found) => format!(".{}", found.as_str()),
            None => host_name.to_string(),
        }
    }
}

impl Default for DomainRule {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
        }
    }
}
