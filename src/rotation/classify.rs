use globset::{Glob, GlobMatcher};

use crate::config::ClassifyRule;
use crate::error::{Result, VaultError};

/// Classification assigned when no rule matches.
pub const GENERIC: &str = "generic";

/// Rules applied when the config adds none of its own. Order matters:
/// the first matching pattern wins.
const DEFAULT_RULES: &[(&str, &str)] = &[
    ("*_API_KEY", "api-key"),
    ("API_KEY", "api-key"),
    ("*_TOKEN", "token"),
    ("TOKEN", "token"),
    ("*_PASSWORD", "password"),
    ("PASSWORD", "password"),
    ("*_URL", "connection-string"),
    ("*_URI", "connection-string"),
    ("*_DSN", "connection-string"),
];

struct CompiledRule {
    matcher: GlobMatcher,
    classification: String,
}

/// Maps secret key names to classification labels through ordered glob
/// rules. The classification selects generator and verifier strategies,
/// so adding a secret type is a rule plus a registry entry rather than a
/// new branch in the engine.
pub struct Classifier {
    rules: Vec<CompiledRule>,
}

impl Classifier {
    /// Build a classifier from config rules, falling back to the built-in
    /// rules after them.
    pub fn new(config_rules: &[ClassifyRule]) -> Result<Self> {
        let mut rules = Vec::with_capacity(config_rules.len() + DEFAULT_RULES.len());
        for rule in config_rules {
            rules.push(CompiledRule {
                matcher: compile(&rule.pattern)?,
                classification: rule.classification.clone(),
            });
        }
        for (pattern, classification) in DEFAULT_RULES {
            rules.push(CompiledRule {
                matcher: compile(pattern)?,
                classification: (*classification).to_string(),
            });
        }
        Ok(Self { rules })
    }

    /// Classifier with only the built-in rules.
    pub fn with_defaults() -> Self {
        // Built-in patterns are static and valid.
        Self::new(&[]).expect("built-in classify rules compile")
    }

    /// Classify a secret key. First matching rule wins; unmatched keys are
    /// [`GENERIC`].
    pub fn classify(&self, key: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matcher.is_match(key))
            .map(|rule| rule.classification.as_str())
            .unwrap_or(GENERIC)
    }
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    Ok(Glob::new(pattern)
        .map_err(|e| VaultError::Validation(format!("invalid classify pattern '{}': {}", pattern, e)))?
        .compile_matcher())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_rules_cover_common_keys() {
        let classifier = Classifier::with_defaults();
        assert_eq!(classifier.classify("STRIPE_API_KEY"), "api-key");
        assert_eq!(classifier.classify("API_KEY"), "api-key");
        assert_eq!(classifier.classify("GITHUB_TOKEN"), "token");
        assert_eq!(classifier.classify("DB_PASSWORD"), "password");
        assert_eq!(classifier.classify("DATABASE_URL"), "connection-string");
        assert_eq!(classifier.classify("REDIS_DSN"), "connection-string");
        assert_eq!(classifier.classify("SOMETHING_ELSE"), GENERIC);
    }

    #[test]
    fn config_rules_take_precedence() {
        let rules = vec![ClassifyRule {
            pattern: "*_API_KEY".to_string(),
            classification: "partner-key".to_string(),
        }];
        let classifier = Classifier::new(&rules).unwrap();
        assert_eq!(classifier.classify("STRIPE_API_KEY"), "partner-key");
        // Built-ins still apply after config rules.
        assert_eq!(classifier.classify("GITHUB_TOKEN"), "token");
    }

    #[test]
    fn invalid_pattern_is_a_validation_error() {
        let rules = vec![ClassifyRule {
            pattern: "[".to_string(),
            classification: "broken".to_string(),
        }];
        assert!(matches!(
            Classifier::new(&rules),
            Err(VaultError::Validation(_))
        ));
    }
}
