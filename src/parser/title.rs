//! Title, year, season and episode parsing
//!
//! The extractor consumes this through the `TitleParser` trait so a richer
//! release-name parser can be swapped in without touching the tag tables.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleInfo {
    pub title: Option<String>,
    pub year: Option<u32>,
    pub seasons: Vec<u32>,
    pub episodes: Vec<u32>,
}

pub trait TitleParser: Send + Sync {
    fn parse(&self, filename: &str) -> TitleInfo;
}

static SEASON_EPISODE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])s(\d{1,2})[ .\-_]?e(\d{1,4})(?:[ .\-_]?-?[ .\-_]?e(\d{1,4}))?")
        .ok()
});
static CROSS_FORMAT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])(\d{1,2})x(\d{1,3})(?:[^a-z0-9]|$)").ok());
static SEASON_RANGE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])s(?:eason)?[ .\-_]?(\d{1,2})[ .\-_]?(?:-|to)[ .\-_]?s?(?:eason)?[ .\-_]?(\d{1,2})(?:[^a-z0-9]|$)")
        .ok()
});
static SEASON_ONLY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(?:s|season|saison|temporada)[ .\-_]?(\d{1,2})(?:[^a-z0-9]|$)")
        .ok()
});
static EPISODE_ONLY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(?:e|ep|episode)[ .\-_]?(\d{1,4})(?:[^a-z0-9]|$)").ok()
});
static ABSOLUTE_EPISODE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\s-\s(\d{1,4})(?:v\d)?(?:[\s.\[(]|$)").ok());
static YEAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|[^A-Za-z0-9])((?:19|20)\d{2})(?:[^A-Za-z0-9]|$)").ok());
static TECH_TOKEN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[ ._\-\[(])(?:\d{3,4}[pi]|4k|uhd|blu[ .\-]?ray|bdrip|remux|web[ .\-]?dl|web[ .\-]?rip|hdtv|[xh]\.?26[45]|hevc|avc)(?:[ ._\-\])]|$)")
        .ok()
});
static LEADING_GROUP: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\[[^\]]*\]\s*").ok());
static EXTENSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\.(?:mkv|mp4|avi|m4v|mov|wmv|ts|webm|flv)$").ok());

/// Regex-based title parser covering the common scene and anime layouts
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTitleParser;

impl DefaultTitleParser {
    fn seasons_and_episodes(text: &str) -> (Vec<u32>, Vec<u32>, Option<usize>) {
        let mut seasons = Vec::new();
        let mut episodes = Vec::new();
        let mut first_marker: Option<usize> = None;
        let mut mark = |pos: usize| {
            first_marker = Some(first_marker.map_or(pos, |current| current.min(pos)));
        };

        if let Some(caps) = SEASON_EPISODE.as_ref().and_then(|re| re.captures(text)) {
            mark(caps.get(0).map_or(0, |m| m.start()));
            seasons.extend(number(caps.get(1)));
            let first = number(caps.get(2));
            let last = number(caps.get(3));
            match (first, last) {
                (Some(first), Some(last)) if last > first => episodes.extend(first..=last),
                (Some(first), _) => episodes.push(first),
                _ => {}
            }
        } else if let Some(caps) = CROSS_FORMAT.as_ref().and_then(|re| re.captures(text)) {
            mark(caps.get(0).map_or(0, |m| m.start()));
            seasons.extend(number(caps.get(1)));
            episodes.extend(number(caps.get(2)));
        }

        if seasons.is_empty() {
            if let Some(caps) = SEASON_RANGE.as_ref().and_then(|re| re.captures(text)) {
                mark(caps.get(0).map_or(0, |m| m.start()));
                if let (Some(from), Some(to)) = (number(caps.get(1)), number(caps.get(2))) {
                    if to >= from {
                        seasons.extend(from..=to);
                    }
                }
            } else if let Some(caps) = SEASON_ONLY.as_ref().and_then(|re| re.captures(text)) {
                mark(caps.get(0).map_or(0, |m| m.start()));
                seasons.extend(number(caps.get(1)));
            }
        }

        if episodes.is_empty() {
            let episode = EPISODE_ONLY
                .as_ref()
                .and_then(|re| re.captures(text))
                .or_else(|| ABSOLUTE_EPISODE.as_ref().and_then(|re| re.captures(text)));
            if let Some(caps) = episode {
                mark(caps.get(0).map_or(0, |m| m.start()));
                episodes.extend(number(caps.get(1)));
            }
        }

        (seasons, episodes, first_marker)
    }

    /// Last year-like token, ignoring one at the very start when another exists
    fn year(text: &str) -> Option<(u32, usize)> {
        let re = YEAR.as_ref()?;
        let mut candidates: Vec<(u32, usize)> = Vec::new();
        let mut start = 0;
        // Resume right after the digits so a shared separator can bound the next year
        while let Some(m) = re.captures_at(text, start).and_then(|caps| caps.get(1)) {
            if let Ok(value) = m.as_str().parse() {
                candidates.push((value, m.start()));
            }
            start = m.end();
        }
        match candidates.as_slice() {
            [] => None,
            [only] => Some(*only),
            many => many.iter().rev().find(|(_, pos)| *pos > 0).copied(),
        }
    }

    fn clean_title(raw: &str) -> Option<String> {
        let without_group = match LEADING_GROUP.as_ref() {
            Some(re) => re.replace(raw, "").to_string(),
            None => raw.to_string(),
        };
        let without_ext = match EXTENSION.as_ref() {
            Some(re) => re.replace(&without_group, "").to_string(),
            None => without_group,
        };
        let spaced: String = without_ext
            .chars()
            .map(|c| if c == '.' || c == '_' { ' ' } else { c })
            .collect();
        let title = spaced
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_matches(|c: char| c == '-' || c == '(' || c == '[' || c.is_whitespace())
            .to_string();
        (!title.is_empty()).then_some(title)
    }
}

fn number(m: Option<regex::Match<'_>>) -> Option<u32> {
    m.and_then(|m| m.as_str().parse().ok())
}

impl TitleParser for DefaultTitleParser {
    fn parse(&self, filename: &str) -> TitleInfo {
        let (seasons, episodes, marker) = Self::seasons_and_episodes(filename);
        let year = Self::year(filename);
        let tech = TECH_TOKEN
            .as_ref()
            .and_then(|re| re.find(filename))
            .map(|m| m.start());

        let cut = [marker, year.map(|(_, pos)| pos), tech]
            .into_iter()
            .flatten()
            .filter(|pos| *pos > 0)
            .min()
            .unwrap_or(filename.len());

        TitleInfo {
            title: Self::clean_title(&filename[..cut]),
            year: year.map(|(value, _)| value),
            seasons,
            episodes,
        }
    }
}
