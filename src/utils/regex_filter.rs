//! Safe evaluation of user supplied patterns
//!
//! Patterns are screened before compilation (length, nested quantifiers),
//! compiled with a bounded program size, memoized in the regex cache and
//! evaluated under a time budget. Callers in the filter and sort stages treat
//! every error as a non-match.

use regex::{Regex, RegexBuilder};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::config::RegexConfig;
use crate::errors::RegexError;
use crate::models::{NamedPattern, RankMatch};

/// Outcome of compiling one user pattern. Rejections are cached alongside
/// successes so a bad pattern is compiled and reported once per TTL.
pub type CompiledPattern = Result<Arc<Regex>, RegexError>;

#[derive(Clone)]
pub struct RegexFilterEngine {
    cache: Arc<TtlCache<String, CompiledPattern>>,
    config: RegexConfig,
}

impl RegexFilterEngine {
    pub fn new(cache: Arc<TtlCache<String, CompiledPattern>>, config: RegexConfig) -> Self {
        Self { cache, config }
    }

    /// Compile (or fetch from cache) a case-insensitive pattern
    pub fn compile(&self, pattern: &str) -> CompiledPattern {
        self.cache.get_or_insert_with(pattern.to_string(), || {
            let compiled = self.build(pattern);
            if let Err(e) = &compiled {
                warn!("Ignoring user pattern: {}", e);
            }
            compiled
        })
    }

    fn build(&self, pattern: &str) -> Result<Arc<Regex>, RegexError> {
        self.screen(pattern)?;
        debug!("Compiling user pattern '{}'", pattern);
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(self.config.size_limit)
            .build()
            .map(Arc::new)
            .map_err(|e| RegexError::Invalid {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    fn screen(&self, pattern: &str) -> Result<(), RegexError> {
        if pattern.is_empty() {
            return Err(RegexError::Rejected {
                message: "empty pattern".to_string(),
            });
        }
        if pattern.len() > self.config.max_pattern_length {
            return Err(RegexError::Rejected {
                message: format!(
                    "pattern length {} exceeds limit of {}",
                    pattern.len(),
                    self.config.max_pattern_length
                ),
            });
        }
        if has_nested_quantifier(pattern) {
            return Err(RegexError::Rejected {
                message: format!("nested quantifiers in '{pattern}'"),
            });
        }
        Ok(())
    }

    /// Test one pattern against one input. Inputs over the length bound and
    /// evaluations over the time budget report `Timeout`.
    pub fn is_match(&self, pattern: &str, haystack: &str) -> Result<bool, RegexError> {
        let regex = self.compile(pattern)?;
        if haystack.len() > self.config.max_input_length {
            return Err(RegexError::Timeout {
                pattern: pattern.to_string(),
            });
        }

        let started = Instant::now();
        let matched = regex.is_match(haystack);
        if started.elapsed() > self.config.timeout {
            return Err(RegexError::Timeout {
                pattern: pattern.to_string(),
            });
        }
        Ok(matched)
    }

    /// `is_match` with every error logged and read as a non-match
    pub fn matches_lenient(&self, pattern: &str, haystack: &str) -> bool {
        match self.is_match(pattern, haystack) {
            Ok(matched) => matched,
            Err(RegexError::Timeout { pattern }) => {
                warn!("Pattern '{}' timed out, treating as non-match", pattern);
                false
            }
            Err(e) => {
                debug!("Skipping pattern: {}", e);
                false
            }
        }
    }

    /// Whether any pattern matches any field
    pub fn any_match(&self, patterns: &[String], fields: &[&str]) -> bool {
        patterns.iter().any(|pattern| {
            fields
                .iter()
                .any(|field| self.matches_lenient(pattern, field))
        })
    }

    /// First named pattern matching any field, tested in list order
    pub fn first_named_match(
        &self,
        patterns: &[NamedPattern],
        fields: &[&str],
    ) -> Option<RankMatch> {
        patterns.iter().enumerate().find_map(|(index, named)| {
            fields
                .iter()
                .any(|field| self.matches_lenient(&named.pattern, field))
                .then(|| RankMatch {
                    name: named.name.clone(),
                    pattern_index: index,
                })
        })
    }
}

/// Detect a quantified group that itself contains a quantifier, e.g. `(a+)+`
fn has_nested_quantifier(pattern: &str) -> bool {
    let mut chars = pattern.chars().peekable();
    let mut group_has_quantifier: Vec<bool> = Vec::new();
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '(' => group_has_quantifier.push(false),
            ')' => {
                let inner = group_has_quantifier.pop().unwrap_or(false);
                let quantified = matches!(chars.peek(), Some('*' | '+' | '{'));
                if inner && quantified {
                    return true;
                }
                if inner {
                    if let Some(parent) = group_has_quantifier.last_mut() {
                        *parent = true;
                    }
                }
            }
            '*' | '+' | '{' => {
                if let Some(current) = group_has_quantifier.last_mut() {
                    *current = true;
                }
            }
            _ => {}
        }
    }
    false
}
