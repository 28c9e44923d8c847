//! Built-in stream parser strategies
//!
//! Each upstream addon formats its descriptions differently. A strategy only
//! declares the capability regexes for its source; the shared normalisation
//! lives in [`StreamParser::normalize`].

use regex::Regex;
use std::sync::LazyLock;

use super::traits::StreamParser;

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

/// Sources that follow no particular convention
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericParser;

impl StreamParser for GenericParser {
    fn source_type(&self) -> &'static str {
        "generic"
    }
}

static TORRENTIO_SIZE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)💾\s*(\d+(?:[.,]\d+)?)\s*(KB|MB|GB|TB)"));
static TORRENTIO_SEEDERS: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"👤\s*(\d+)"));
static TORRENTIO_INDEXER: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"⚙\x{FE0F}?\s*([^\n]+)"));

/// Torrentio: release name first, then a `👤 💾 ⚙️` stats line
#[derive(Debug, Default, Clone, Copy)]
pub struct TorrentioParser;

impl StreamParser for TorrentioParser {
    fn source_type(&self) -> &'static str {
        "torrentio"
    }

    fn size_regex(&self) -> Option<&Regex> {
        TORRENTIO_SIZE.as_ref()
    }

    fn seeders_regex(&self) -> Option<&Regex> {
        TORRENTIO_SEEDERS.as_ref()
    }

    fn indexer_regex(&self) -> Option<&Regex> {
        TORRENTIO_INDEXER.as_ref()
    }
}

static COMET_FILENAME: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"📄\s*([^\n]+)"));
static COMET_FOLDER: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"📁\s*([^\n]+)"));
static COMET_INDEXER: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"🔎\s*([^\n]+)"));

#[derive(Debug, Default, Clone, Copy)]
pub struct CometParser;

impl StreamParser for CometParser {
    fn source_type(&self) -> &'static str {
        "comet"
    }

    fn filename_regex(&self) -> Option<&Regex> {
        COMET_FILENAME.as_ref()
    }

    fn folder_regex(&self) -> Option<&Regex> {
        COMET_FOLDER.as_ref()
    }

    fn indexer_regex(&self) -> Option<&Regex> {
        COMET_INDEXER.as_ref()
    }
}

static MEDIAFUSION_FILENAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"📂\s*([^\n┈]+)"));
static MEDIAFUSION_INDEXER: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"🔗\s*([^\n]+)"));

#[derive(Debug, Default, Clone, Copy)]
pub struct MediaFusionParser;

impl StreamParser for MediaFusionParser {
    fn source_type(&self) -> &'static str {
        "mediafusion"
    }

    fn filename_regex(&self) -> Option<&Regex> {
        MEDIAFUSION_FILENAME.as_ref()
    }

    fn size_regex(&self) -> Option<&Regex> {
        TORRENTIO_SIZE.as_ref()
    }

    fn indexer_regex(&self) -> Option<&Regex> {
        MEDIAFUSION_INDEXER.as_ref()
    }
}

static TORBOX_FILENAME: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"Name:\s*([^\n]+)"));
static TORBOX_SIZE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"(?i)Size:\s*(\d+(?:[.,]\d+)?)\s*(KB|MB|GB|TB)"));
static TORBOX_INDEXER: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r"Source:\s*([^|\n]+)"));
static TORBOX_AGE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"Age:\s*([^|\n]+)"));
static TORBOX_LIBRARY: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)your\s+media"));
static TORBOX_ACCOUNT_ERRORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)invalid\s+(?:api\s*key|token|credentials)",
        r"(?i)(?:no|requires\s+a)\s+torbox\s+(?:account|subscription)",
        r"(?i)torbox\s+(?:plan|subscription)\s+(?:has\s+)?expired",
    ]
    .iter()
    .filter_map(|pattern| compile(pattern))
    .collect()
});

/// TorBox reports sizes in decimal units and labels every field
#[derive(Debug, Default, Clone, Copy)]
pub struct TorBoxParser;

impl StreamParser for TorBoxParser {
    fn source_type(&self) -> &'static str {
        "torbox"
    }

    fn filename_regex(&self) -> Option<&Regex> {
        TORBOX_FILENAME.as_ref()
    }

    fn size_regex(&self) -> Option<&Regex> {
        TORBOX_SIZE.as_ref()
    }

    fn size_base(&self) -> u64 {
        1000
    }

    fn seeders_regex(&self) -> Option<&Regex> {
        None
    }

    fn age_regex(&self) -> Option<&Regex> {
        TORBOX_AGE.as_ref()
    }

    fn indexer_regex(&self) -> Option<&Regex> {
        TORBOX_INDEXER.as_ref()
    }

    fn library_regex(&self) -> Option<&Regex> {
        TORBOX_LIBRARY.as_ref()
    }

    fn account_error_patterns(&self) -> &[Regex] {
        TORBOX_ACCOUNT_ERRORS.as_slice()
    }
}

static JACKETTIO_SEEDERS: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"👥\s*(\d+)"));

#[derive(Debug, Default, Clone, Copy)]
pub struct JackettioParser;

impl StreamParser for JackettioParser {
    fn source_type(&self) -> &'static str {
        "jackettio"
    }

    fn size_regex(&self) -> Option<&Regex> {
        TORRENTIO_SIZE.as_ref()
    }

    fn seeders_regex(&self) -> Option<&Regex> {
        JACKETTIO_SEEDERS.as_ref()
    }

    fn indexer_regex(&self) -> Option<&Regex> {
        TORRENTIO_INDEXER.as_ref()
    }
}
