//! Field extraction helpers shared by every stream parser strategy

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

use crate::models::ServiceInfo;

/// Service whose streams are delivered over usenet rather than debrid
pub const USENET_SERVICE: &str = "easynews";

/// Known services and the aliases sources use for them in display names
const SERVICES: &[(&str, &[&str])] = &[
    ("realdebrid", &["RD", "Real-Debrid", "RealDebrid", "Real Debrid"]),
    ("alldebrid", &["AD", "AllDebrid", "All-Debrid", "All Debrid"]),
    ("premiumize", &["PM", "Premiumize"]),
    ("debridlink", &["DL", "DebridLink", "Debrid-Link"]),
    ("torbox", &["TB", "TRB", "TorBox"]),
    ("easydebrid", &["ED", "EasyDebrid"]),
    ("offcloud", &["OC", "Offcloud"]),
    ("putio", &["PO", "Put.io", "putio"]),
    ("pikpak", &["PKP", "PikPak"]),
    ("seedr", &["SR", "Seedr"]),
    ("easynews", &["EN", "Easynews"]),
];

/// Checked before the cached set, so a conflict reads as uncached
const UNCACHED_MARKERS: &[&str] = &["⏳", "download", "uncached"];
const CACHED_MARKERS: &[&str] = &["+]", "⚡", "🚀", "cached", "instant"];

/// Short codes like `RD` or `EN` are ordinary words in release text, so they
/// only count in a badge position: opening a bracket, next to a cache emoji,
/// followed by `+`, or as the leading token of the name.
fn is_short_code(alias: &str) -> bool {
    alias.len() <= 3 && alias.chars().all(|c| c.is_ascii_alphanumeric())
}

fn alternation<'a>(aliases: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined = aliases
        .map(|alias| regex::escape(alias))
        .collect::<Vec<_>>()
        .join("|");
    (!joined.is_empty()).then_some(joined)
}

fn service_pattern(aliases: &[&str]) -> Option<Regex> {
    const NOT_WORD: &str = r"[^\p{L}\p{N}]";
    const BADGE_EMOJI: &str = r"[⚡🚀⏳]\x{FE0F}?";
    let mut branches = Vec::new();

    // Full names are bounded by anything that is not a letter or digit. A
    // leading dash is excluded so `WEB-DL` style tokens never qualify.
    if let Some(names) = alternation(aliases.iter().copied().filter(|a| !is_short_code(a))) {
        branches.push(format!(
            r"(?:^|[^\p{{L}}\p{{N}}\-])(?:{names})(?:{NOT_WORD}|$)"
        ));
    }
    if let Some(codes) = alternation(aliases.iter().copied().filter(|a| is_short_code(a))) {
        branches.push(format!(
            r"(?:^\s*|[\[(]\s*|{BADGE_EMOJI}\s?)(?:{codes})(?:{NOT_WORD}|$)"
        ));
        branches.push(format!(
            r"(?:^|[^\p{{L}}\p{{N}}\-])(?:{codes})(?:\+|\s?{BADGE_EMOJI})"
        ));
    }

    RegexBuilder::new(&branches.join("|"))
        .case_insensitive(true)
        .build()
        .ok()
}

static SERVICE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    SERVICES
        .iter()
        .filter_map(|(id, aliases)| service_pattern(aliases).map(|re| (*id, re)))
        .collect()
});

static EMOJI: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"[\p{Extended_Pictographic}\p{Regional_Indicator}\u{FE0F}\u{200D}\u{20E3}]").ok()
});

static DURATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    RegexBuilder::new(
        r"(?:^|[\s\[\](),|/:-])(?:(?P<h>\d{1,2})h(?:[ :]?(?P<hm>\d{1,2})m(?:[ :]?(?P<hs>\d{1,2})s)?)?|(?P<m>\d{1,3})m(?:[ :]?(?P<ms>\d{1,2})s)?|(?P<s>\d{1,4})s)(?:$|[\s\[\](),|/-])",
    )
    .case_insensitive(true)
    .build()
    .ok()
});

static INFO_HASH_IN_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[/=:])([a-f0-9]{40})(?:[/?&.]|$)").ok());

/// Remove emoji and their joiners, then collapse whitespace
pub fn strip_emoji(text: &str) -> String {
    let stripped = match EMOJI.as_ref() {
        Some(re) => re.replace_all(text, "").to_string(),
        None => text.to_string(),
    };
    crate::parser::normalize_whitespace(&stripped)
}

/// First capture group of `regex` in `text`, trimmed
pub fn capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parse `<number> <unit>` with group 1 the number and group 2 the unit
pub fn parse_size(regex: &Regex, text: &str, base: u64) -> Option<u64> {
    let caps = regex.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let exponent = match caps.get(2)?.as_str().to_ascii_uppercase().as_str() {
        "B" => 0,
        "KB" | "KIB" => 1,
        "MB" | "MIB" => 2,
        "GB" | "GIB" => 3,
        "TB" | "TIB" => 4,
        _ => return None,
    };
    Some((value * (base as f64).powi(exponent)).round() as u64)
}

/// Detect the backing service from a display name and classify its cache state
pub fn detect_service(name: &str) -> Option<ServiceInfo> {
    let id = SERVICE_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(name))
        .map(|(id, _)| id.to_string())?;

    let lowered = name.to_lowercase();
    let cached = if UNCACHED_MARKERS.iter().any(|m| lowered.contains(m)) {
        false
    } else {
        CACHED_MARKERS.iter().any(|m| lowered.contains(m))
    };
    Some(ServiceInfo { id, cached })
}

/// Duration in milliseconds from `1h32m`, `1h`, `45m10s`, `45m` or `30s`
pub fn parse_duration(text: &str) -> u64 {
    let Some(caps) = DURATION.as_ref().and_then(|re| re.captures(text)) else {
        return 0;
    };
    let get = |name: &str| -> u64 {
        caps.name(name)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let seconds = get("h") * 3600
        + get("hm") * 60
        + get("hs")
        + get("m") * 60
        + get("ms")
        + get("s");
    seconds * 1000
}

/// Torrent hash embedded in a debrid resolver URL
pub fn info_hash_from_url(url: &str) -> Option<String> {
    INFO_HASH_IN_URL
        .as_ref()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

fn flag_language(code: &str) -> Option<&'static str> {
    Some(match code {
        "GB" | "US" | "AU" | "CA" | "NZ" | "IE" => "English",
        "JP" => "Japanese",
        "CN" | "TW" | "HK" => "Chinese",
        "RU" => "Russian",
        "SA" | "AE" | "EG" => "Arabic",
        "PT" | "BR" => "Portuguese",
        "ES" => "Spanish",
        "MX" | "AR" | "CO" | "CL" => "Latino",
        "FR" => "French",
        "DE" | "AT" => "German",
        "IT" => "Italian",
        "KR" => "Korean",
        "IN" => "Hindi",
        "BD" => "Bengali",
        "TH" => "Thai",
        "VN" => "Vietnamese",
        "ID" => "Indonesian",
        "TR" => "Turkish",
        "IL" => "Hebrew",
        "IR" => "Persian",
        "UA" => "Ukrainian",
        "GR" => "Greek",
        "LT" => "Lithuanian",
        "LV" => "Latvian",
        "EE" => "Estonian",
        "PL" => "Polish",
        "CZ" => "Czech",
        "SK" => "Slovak",
        "HU" => "Hungarian",
        "RO" => "Romanian",
        "BG" => "Bulgarian",
        "RS" => "Serbian",
        "HR" => "Croatian",
        "SI" => "Slovenian",
        "NL" | "BE" => "Dutch",
        "DK" => "Danish",
        "FI" => "Finnish",
        "SE" => "Swedish",
        "NO" => "Norwegian",
        "MY" => "Malay",
        _ => return None,
    })
}

/// Languages named by country-flag emoji, distinct and in order of appearance
pub fn flag_languages(text: &str) -> Vec<String> {
    const REGIONAL_A: u32 = 0x1F1E6;
    const REGIONAL_Z: u32 = 0x1F1FF;

    let letter = |c: char| -> Option<char> {
        let code = c as u32;
        (REGIONAL_A..=REGIONAL_Z)
            .contains(&code)
            .then(|| char::from(b'A' + (code - REGIONAL_A) as u8))
    };

    let mut languages: Vec<String> = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let Some(first) = letter(c) else {
            continue;
        };
        let Some(second) = chars.peek().copied().and_then(letter) else {
            continue;
        };
        chars.next();
        let code: String = [first, second].iter().collect();
        if let Some(language) = flag_language(&code) {
            if !languages.iter().any(|l| l == language) {
                languages.push(language.to_string());
            }
        }
    }
    languages
}
