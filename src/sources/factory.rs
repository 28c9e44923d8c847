//! Stream parser registry
//!
//! Maps a source type id to its parsing strategy. Unknown types fall back to
//! the generic strategy so an unrecognised addon still yields usable records.

use std::collections::HashMap;
use std::sync::Arc;

use super::strategies::{
    CometParser, GenericParser, JackettioParser, MediaFusionParser, TorBoxParser, TorrentioParser,
};
use super::traits::StreamParser;

/// Registry of stream parsers keyed by source type id
///
/// # Examples
///
/// ```rust
/// use stream_aggregator::sources::SourceRegistry;
///
/// let registry = SourceRegistry::new();
/// assert_eq!(registry.parser_for("torrentio").source_type(), "torrentio");
/// assert_eq!(registry.parser_for("something-else").source_type(), "generic");
/// ```
#[derive(Clone)]
pub struct SourceRegistry {
    parsers: HashMap<&'static str, Arc<dyn StreamParser>>,
    fallback: Arc<dyn StreamParser>,
}

impl SourceRegistry {
    /// Registry holding every built-in strategy
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: HashMap::new(),
            fallback: Arc::new(GenericParser),
        };
        registry.register(Arc::new(GenericParser));
        registry.register(Arc::new(TorrentioParser));
        registry.register(Arc::new(CometParser));
        registry.register(Arc::new(MediaFusionParser));
        registry.register(Arc::new(TorBoxParser));
        registry.register(Arc::new(JackettioParser));
        registry
    }

    /// Add or replace the strategy for its source type
    pub fn register(&mut self, parser: Arc<dyn StreamParser>) {
        self.parsers.insert(parser.source_type(), parser);
    }

    pub fn parser_for(&self, source_type: &str) -> Arc<dyn StreamParser> {
        self.parsers
            .get(source_type)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn is_supported(&self, source_type: &str) -> bool {
        self.parsers.contains_key(source_type)
    }

    /// Registered type ids, sorted
    pub fn supported_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.parsers.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_strategies_are_registered() {
        let registry = SourceRegistry::new();
        assert_eq!(
            registry.supported_types(),
            vec!["comet", "generic", "jackettio", "mediafusion", "torbox", "torrentio"]
        );
        assert!(registry.is_supported("comet"));
        assert!(!registry.is_supported("unknown"));
    }

    #[test]
    fn test_unknown_type_falls_back_to_generic() {
        let registry = SourceRegistry::new();
        assert_eq!(registry.parser_for("unknown").source_type(), "generic");
        assert_eq!(registry.parser_for("torbox").size_base(), 1000);
    }
}
