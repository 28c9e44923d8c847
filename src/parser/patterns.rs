//! Ordered tag tables for the filename extractor
//!
//! Every entry matches case-insensitively and only when bounded on both sides
//! by start/end of input or one of `[\s\[\]()_.,-]`. Entries may additionally
//! reject a candidate based on the text right before or right after it.
//! Table order is significant: single-valued categories take the first entry
//! that matches, so specific labels come before general ones.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

const SEP: &str = r"[\s\[\]()_.,\-]";

/// One labelled pattern with optional positional exclusions.
///
/// An exclusion is itself a whole token run: `reject_followed_by` must be
/// followed by a separator or end of input, `reject_preceded_by` must start
/// at one, so `HDR.10bit` keeps `HDR` while `HDR.10` does not.
pub struct TagPattern {
    pub label: &'static str,
    regex: Regex,
    reject_followed_by: Option<Regex>,
    reject_preceded_by: Option<Regex>,
}

impl TagPattern {
    fn build(
        label: &'static str,
        pattern: &str,
        reject_followed_by: Option<&str>,
        reject_preceded_by: Option<&str>,
    ) -> Option<Self> {
        let bounded = format!(r"(?:^|{SEP})(?P<tag>{pattern})(?:$|{SEP})");
        Some(Self {
            label,
            regex: case_insensitive(&bounded)?,
            reject_followed_by: match reject_followed_by {
                Some(p) => Some(case_insensitive(&format!("^(?:{p})(?:$|{SEP})"))?),
                None => None,
            },
            reject_preceded_by: match reject_preceded_by {
                Some(p) => Some(case_insensitive(&format!("(?:^|{SEP})(?:{p})$"))?),
                None => None,
            },
        })
    }

    /// Whether some bounded occurrence passes the exclusions
    pub fn is_match(&self, text: &str) -> bool {
        let mut start = 0;
        while start <= text.len() {
            let Some(caps) = self.regex.captures_at(text, start) else {
                return false;
            };
            let (Some(whole), Some(tag)) = (caps.get(0), caps.name("tag")) else {
                return false;
            };

            let rejected_after = self
                .reject_followed_by
                .as_ref()
                .is_some_and(|re| re.is_match(&text[tag.end()..]));
            let rejected_before = self
                .reject_preceded_by
                .as_ref()
                .is_some_and(|re| re.is_match(&text[..tag.start()]));
            if !rejected_after && !rejected_before {
                return true;
            }

            // Retry one character further so overlapping candidates are seen
            start = whole.start()
                + text[whole.start()..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
        }
        false
    }
}

fn case_insensitive(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern).case_insensitive(true).build().ok()
}

type Entry = (&'static str, &'static str, Option<&'static str>, Option<&'static str>);

fn table(entries: &[Entry]) -> Vec<TagPattern> {
    entries
        .iter()
        .filter_map(|(label, pattern, followed_by, preceded_by)| {
            TagPattern::build(label, pattern, *followed_by, *preceded_by)
        })
        .collect()
}

const RESOLUTION_ENTRIES: &[Entry] = &[
    ("2160p", r"(?:bd|hd|m)?(?:4k|2160[pi]?)|u(?:ltra)?[ .\-_]?hd|3840\s?x\s?\d{4}", None, None),
    ("1440p", r"(?:bd|hd|m)?1440[pi]?|2k|w?q(?:uad)?[ .\-_]?hd|2560\s?x\s?\d{4}", None, None),
    ("1080p", r"(?:bd|hd|m)?1080[pi]?|f(?:ull)?[ .\-_]?hd|1920\s?x\s?\d{3,4}", None, None),
    ("720p", r"(?:bd|hd|m)?(?:720|800)[pi]?|hd|1280\s?x\s?\d{3,4}", None, None),
    ("576p", r"(?:bd|hd|m)?(?:576|534)[pi]?", None, None),
    ("480p", r"(?:bd|hd|m)?480[pi]?|sd", None, None),
    ("360p", r"(?:bd|hd|m)?360[pi]?", None, None),
    ("240p", r"(?:bd|hd|m)?(?:240|266)[pi]?", None, None),
    ("144p", r"(?:bd|hd|m)?144[pi]?", None, None),
];

const QUALITY_ENTRIES: &[Entry] = &[
    ("BluRay REMUX", r"(?:bd|br|b|uhd)?remux", None, None),
    ("BluRay", r"bd|blu[ .\-_]?ray|(?:bd|br)[ .\-_]?rip", None, None),
    ("WEB-DL", r"web[ .\-_]?(?:dl)?", Some(r"[ .\-_]?(?:rip|dlrip|cam)"), None),
    ("WEBRip", r"web[ .\-_]?rip", None, None),
    ("HDRip", r"hd[ .\-_]?rip|web[ .\-_]?dl[ .\-_]?rip", None, None),
    ("HC HD-Rip", r"hc|hd[ .\-_]?rip", None, None),
    ("DVDRip", r"dvd[ .\-_]?(?:rip|mux|r|full|5|9)?", None, None),
    ("HDTV", r"(?:hd|pd)tv|tv[ .\-_]?rip|hdtv[ .\-_]?rip|dsr(?:ip)?|sat[ .\-_]?rip", None, None),
    ("CAM", r"cam|hdcam|cam[ .\-_]?rip", None, None),
    ("TS", r"telesync|ts|hd[ .\-_]?ts|pdvd|predvd(?:rip)?", None, None),
    ("TC", r"telecine|tc|hd[ .\-_]?tc", None, None),
    ("SCR", r"(?:(?:dvd|bd|web)[ .\-_]?)?scr(?:eener)?", None, None),
];

const ENCODE_ENTRIES: &[Entry] = &[
    ("HEVC", r"hevc(?:[ .\-_]?10)?|[xh][ .\-_]?265", None, None),
    ("AVC", r"avc|[xh][ .\-_]?264", None, None),
    ("AV1", r"av1", None, None),
    ("XviD", r"xvid", None, None),
    ("DivX", r"divx|dvix", None, None),
    ("H-OU", r"h?(?:alf)?[ .\-_]?(?:ou|over[ .\-_]?under)", None, None),
    ("H-SBS", r"h?(?:alf)?[ .\-_]?(?:sbs|side[ .\-_]?by[ .\-_]?side)", None, None),
];

const PLUS: &str = r"[ .\-_]?(?:\+|p(?:lus)?)";

const VISUAL_ENTRIES: &[Entry] = &[
    ("HDR10+", r"hdr[ .\-_]?10[ .\-_]?(?:p(?:lus)?|\+)", None, None),
    ("HDR10", r"hdr[ .\-_]?10", Some(PLUS), None),
    ("HDR", r"hdr", Some(r"[ .\-_]?(?:10|\+|p(?:lus)?)"), None),
    ("DV", r"dolby[ .\-_]?vision(?:[ .\-_]?atmos)?|dovi|dv", None, None),
    ("IMAX", r"imax", None, None),
    ("AI", r"ai(?:[ .\-_]?(?:upscale|enhanced|remaster))?", None, None),
    ("10bit", r"10[ .\-_]?bit", None, None),
    ("3D", r"3d", None, None),
    ("SDR", r"sdr", None, None),
];

const AUDIO_ENTRIES: &[Entry] = &[
    ("Atmos", r"atmos", None, None),
    ("DD+", r"d(?:olby)?[ .\-_]?d(?:igital)?[ .\-_]?(?:p(?:lus)?|\+)(?:[ .\-_]?(?:5[ .\-_]?1|7[ .\-_]?1))?|e[ .\-_]?ac[ .\-_]?3", None, None),
    ("DD", r"d(?:olby)?[ .\-_]?d(?:igital)?(?:[ .\-_]?(?:5[ .\-_]?1|7[ .\-_]?1))?|ac[ .\-_]?3", Some(r"[ .\-_]?(?:\+|p(?:lus)?)"), Some(r"e[ .\-_]?")),
    ("DTS:X", r"dts[ .\-_:]?x", None, None),
    ("DTS-HD MA", r"dts[ .\-_]?hd[ .\-_]?ma", None, None),
    ("DTS-HD", r"dts[ .\-_]?hd", Some(r"[ .\-_]?ma"), None),
    ("DTS-ES", r"dts[ .\-_]?es", None, None),
    ("DTS", r"dts", Some(r"[ .\-_:]?(?:hd|es|x)"), None),
    ("TrueHD", r"true[ .\-_]?hd", None, None),
    ("OPUS", r"opus", None, None),
    ("FLAC", r"flac", None, None),
    ("AAC", r"q?aac(?:[ .\-_]?2)?", None, None),
];

const AUDIO_CHANNEL_ENTRIES: &[Entry] = &[
    ("2.0", r"(?:d(?:olby)?[ .\-_]?d(?:igital)?)?2[ .\-_]?0(?:ch)?", None, None),
    ("5.1", r"(?:d(?:olby)?[ .\-_]?d(?:igital)?[ .\-_]?(?:p(?:lus)?|\+)?)?5[ .\-_]?1(?:ch)?", None, None),
    ("6.1", r"(?:d(?:olby)?[ .\-_]?d(?:igital)?[ .\-_]?(?:p(?:lus)?|\+)?)?6[ .\-_]?1(?:ch)?", None, None),
    ("7.1", r"(?:d(?:olby)?[ .\-_]?d(?:igital)?[ .\-_]?(?:p(?:lus)?|\+)?)?7[ .\-_]?1(?:ch)?", None, None),
];

/// Language matches followed by a subtitle marker describe subtitle packs
const SUBTITLE_SUFFIX: Option<&str> = Some(r"[ .\-_]?sub(?:title)?s?");

const LANGUAGE_ENTRIES: &[Entry] = &[
    ("Multi", r"multi", SUBTITLE_SUFFIX, None),
    ("Dual Audio", r"dual[ .\-_]?(?:audio|lang(?:uage)?|flac|ac3|aac2?)", SUBTITLE_SUFFIX, None),
    ("Dubbed", r"dub(?:s|bed|bing)?", SUBTITLE_SUFFIX, None),
    ("English", r"english|eng", SUBTITLE_SUFFIX, None),
    ("Japanese", r"japanese|jap|jpn", SUBTITLE_SUFFIX, None),
    ("Chinese", r"chinese|chi|mandarin|cantonese", SUBTITLE_SUFFIX, None),
    ("Russian", r"russian|rus", SUBTITLE_SUFFIX, None),
    ("Arabic", r"arabic|ara", SUBTITLE_SUFFIX, None),
    ("Portuguese", r"portuguese|por", SUBTITLE_SUFFIX, None),
    ("Spanish", r"spanish|spa|esp", SUBTITLE_SUFFIX, None),
    ("French", r"french|fra|fr|vf|vff|vfi|vf2|vfq|truefrench", SUBTITLE_SUFFIX, None),
    ("German", r"deu(?:tsch)?(?:land)?|ger(?:man)?", SUBTITLE_SUFFIX, None),
    ("Italian", r"italian|ita", SUBTITLE_SUFFIX, None),
    ("Korean", r"korean|kor", SUBTITLE_SUFFIX, None),
    ("Hindi", r"hindi|hin", SUBTITLE_SUFFIX, None),
    ("Bengali", r"bengali|ben", SUBTITLE_SUFFIX, None),
    ("Punjabi", r"punjabi|pan", SUBTITLE_SUFFIX, None),
    ("Marathi", r"marathi|mar", SUBTITLE_SUFFIX, None),
    ("Gujarati", r"gujarati|guj", SUBTITLE_SUFFIX, None),
    ("Tamil", r"tamil|tam", SUBTITLE_SUFFIX, None),
    ("Telugu", r"telugu|tel", SUBTITLE_SUFFIX, None),
    ("Kannada", r"kannada|kan", SUBTITLE_SUFFIX, None),
    ("Malayalam", r"malayalam|mal", SUBTITLE_SUFFIX, None),
    ("Thai", r"thai|tha", SUBTITLE_SUFFIX, None),
    ("Vietnamese", r"vietnamese|vie", SUBTITLE_SUFFIX, None),
    ("Indonesian", r"indonesian|ind", SUBTITLE_SUFFIX, None),
    ("Turkish", r"turkish|tur", SUBTITLE_SUFFIX, None),
    ("Hebrew", r"hebrew|heb", SUBTITLE_SUFFIX, None),
    ("Persian", r"persian|per|farsi", SUBTITLE_SUFFIX, None),
    ("Ukrainian", r"ukrainian|ukr", SUBTITLE_SUFFIX, None),
    ("Greek", r"greek|gre", SUBTITLE_SUFFIX, None),
    ("Lithuanian", r"lithuanian|lit", SUBTITLE_SUFFIX, None),
    ("Latvian", r"latvian|lav", SUBTITLE_SUFFIX, None),
    ("Estonian", r"estonian|est", SUBTITLE_SUFFIX, None),
    ("Polish", r"polish|pol", SUBTITLE_SUFFIX, None),
    ("Czech", r"czech|cze", SUBTITLE_SUFFIX, None),
    ("Slovak", r"slovak|slo", SUBTITLE_SUFFIX, None),
    ("Hungarian", r"hungarian|hun", SUBTITLE_SUFFIX, None),
    ("Romanian", r"romanian|rum", SUBTITLE_SUFFIX, None),
    ("Bulgarian", r"bulgarian|bul", SUBTITLE_SUFFIX, None),
    ("Serbian", r"serbian|srp", SUBTITLE_SUFFIX, None),
    ("Croatian", r"croatian|hrv", SUBTITLE_SUFFIX, None),
    ("Slovenian", r"slovenian|slv", SUBTITLE_SUFFIX, None),
    ("Dutch", r"dutch|dut", SUBTITLE_SUFFIX, None),
    ("Danish", r"danish|dan", SUBTITLE_SUFFIX, None),
    ("Finnish", r"finnish|fin", SUBTITLE_SUFFIX, None),
    ("Swedish", r"swedish|swe", SUBTITLE_SUFFIX, None),
    ("Norwegian", r"norwegian|nor", SUBTITLE_SUFFIX, None),
    ("Malay", r"malay|may", SUBTITLE_SUFFIX, None),
    ("Latino", r"latino|lat", SUBTITLE_SUFFIX, None),
];

pub static RESOLUTIONS: LazyLock<Vec<TagPattern>> = LazyLock::new(|| table(RESOLUTION_ENTRIES));
pub static QUALITIES: LazyLock<Vec<TagPattern>> = LazyLock::new(|| table(QUALITY_ENTRIES));
pub static ENCODES: LazyLock<Vec<TagPattern>> = LazyLock::new(|| table(ENCODE_ENTRIES));
pub static VISUAL_TAGS: LazyLock<Vec<TagPattern>> = LazyLock::new(|| table(VISUAL_ENTRIES));
pub static AUDIO_TAGS: LazyLock<Vec<TagPattern>> = LazyLock::new(|| table(AUDIO_ENTRIES));
pub static AUDIO_CHANNELS: LazyLock<Vec<TagPattern>> =
    LazyLock::new(|| table(AUDIO_CHANNEL_ENTRIES));
pub static LANGUAGES: LazyLock<Vec<TagPattern>> = LazyLock::new(|| table(LANGUAGE_ENTRIES));

/// Release group: the token after the last dash before an optional bracketed
/// tag and file extension.
static RELEASE_GROUP: LazyLock<Option<Regex>> = LazyLock::new(|| {
    case_insensitive(
        r"-[. ]?(?P<group>[^\-. \[]+[^\-. \[)\]\d][^\-. \[)\]]*)(?:\[[\w.\-]+\])?(?:\.\w{2,4})?$",
    )
});

/// Candidates that look like episode or numbering tokens rather than a group
static NOT_A_GROUP: LazyLock<Option<Regex>> =
    LazyLock::new(|| case_insensitive(r"^(?:\d+$|s\d+|\d+x|ep?\d+|[^\[]+\]$)"));

/// Extract the release group, skipping season/episode/number tokens
pub fn release_group(text: &str) -> Option<String> {
    let (Some(regex), Some(excluded)) = (RELEASE_GROUP.as_ref(), NOT_A_GROUP.as_ref()) else {
        return None;
    };

    let mut start = 0;
    while start <= text.len() {
        let caps = regex.captures_at(text, start)?;
        let whole = caps.get(0)?;
        let group = caps.name("group")?;
        if !excluded.is_match(&text[group.start()..]) {
            return Some(group.as_str().to_string());
        }
        start = whole.start() + 1;
    }
    None
}

/// First matching label in table order
pub fn first_label(table: &[TagPattern], text: &str) -> Option<String> {
    table
        .iter()
        .find(|entry| entry.is_match(text))
        .map(|entry| entry.label.to_string())
}

/// Every matching label in table order, without duplicates
pub fn all_labels(table: &[TagPattern], text: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for entry in table.iter().filter(|entry| entry.is_match(text)) {
        if !labels.iter().any(|l| l == entry.label) {
            labels.push(entry.label.to_string());
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_entry_compiles() {
        assert_eq!(RESOLUTIONS.len(), RESOLUTION_ENTRIES.len());
        assert_eq!(QUALITIES.len(), QUALITY_ENTRIES.len());
        assert_eq!(ENCODES.len(), ENCODE_ENTRIES.len());
        assert_eq!(VISUAL_TAGS.len(), VISUAL_ENTRIES.len());
        assert_eq!(AUDIO_TAGS.len(), AUDIO_ENTRIES.len());
        assert_eq!(AUDIO_CHANNELS.len(), AUDIO_CHANNEL_ENTRIES.len());
        assert_eq!(LANGUAGES.len(), LANGUAGE_ENTRIES.len());
        assert!(RELEASE_GROUP.is_some());
        assert!(NOT_A_GROUP.is_some());
    }

    #[test]
    fn test_boundaries_are_required() {
        assert_eq!(first_label(&RESOLUTIONS, "Movie.1080p.mkv").as_deref(), Some("1080p"));
        // "hd" inside "HDTV" is not a standalone token
        assert_eq!(first_label(&RESOLUTIONS, "Show.HDTV.mkv"), None);
    }

    #[test]
    fn test_followed_by_exclusion() {
        assert_eq!(all_labels(&VISUAL_TAGS, "Movie.HDR10.Plus.mkv"), vec!["HDR10+"]);
        assert_eq!(all_labels(&VISUAL_TAGS, "Movie.HDR10.mkv"), vec!["HDR10"]);
        assert_eq!(first_label(&QUALITIES, "Movie.WEB-Rip.mkv").as_deref(), Some("WEBRip"));
    }

    #[test]
    fn test_preceded_by_exclusion() {
        assert_eq!(all_labels(&AUDIO_TAGS, "Movie.E-AC3.mkv"), vec!["DD+"]);
        assert_eq!(all_labels(&AUDIO_TAGS, "Movie.AC3.mkv"), vec!["DD"]);
    }

    #[test]
    fn test_exclusions_only_veto_whole_tokens() {
        assert_eq!(all_labels(&VISUAL_TAGS, "Movie.HDR.10bit.mkv"), vec!["HDR", "10bit"]);
        assert_eq!(all_labels(&VISUAL_TAGS, "Movie.HDR.10.mkv"), vec!["HDR10"]);
        assert_eq!(all_labels(&VISUAL_TAGS, "Movie.HDR10.PROPER.mkv"), vec!["HDR10"]);
        assert_eq!(all_labels(&AUDIO_TAGS, "Movie.DD5.1.PROPER.mkv"), vec!["DD"]);
        assert_eq!(all_labels(&AUDIO_TAGS, "Movie.DTS.XviD.mkv"), vec!["DTS"]);
        assert_eq!(all_labels(&AUDIO_TAGS, "Movie.GE.AC3.mkv"), vec!["DD"]);
    }

    #[test]
    fn test_later_occurrence_is_found_after_rejected_one() {
        assert_eq!(
            all_labels(&LANGUAGES, "Movie.ENG.SUBS.ITA.ENG.mkv"),
            vec!["English", "Italian"]
        );
        assert!(all_labels(&LANGUAGES, "Movie.ENG.SUBS.mkv").is_empty());
    }

    #[test]
    fn test_release_group() {
        assert_eq!(
            release_group("Movie.2023.1080p.BluRay.x264-GRP.mkv").as_deref(),
            Some("GRP")
        );
        assert_eq!(
            release_group("Show.S01E01.1080p.WEB-DL-NTb[rarbg].mkv").as_deref(),
            Some("NTb")
        );
        assert_eq!(release_group("Show.2019-S01.mkv"), None);
        assert_eq!(release_group("Movie 2023 1080p"), None);
    }
}
