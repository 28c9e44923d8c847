//! Display strings for outbound streams
//!
//! Presentation only: a formatter reads a finished record and produces the
//! `name` and `description` shown by the client.

use crate::models::{CanonicalStream, StreamKind};
use crate::utils::human_format::{format_bytes, format_duration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedStream {
    pub name: String,
    pub description: String,
}

pub trait StreamFormatter: Send + Sync {
    fn format(&self, record: &CanonicalStream) -> FormattedStream;
}

/// Compact two-part layout: service badge and resolution in the name,
/// tag and provenance lines in the description
#[derive(Debug, Clone)]
pub struct DefaultFormatter {
    addon_name: String,
}

impl DefaultFormatter {
    pub fn new(addon_name: impl Into<String>) -> Self {
        Self {
            addon_name: addon_name.into(),
        }
    }

    fn service_badge(record: &CanonicalStream) -> Option<String> {
        if let Some(service) = &record.service {
            let short = short_service_name(&service.id);
            let state = if service.cached { "⚡" } else { "⏳" };
            return Some(format!("[{short}{state}]"));
        }
        match record.kind {
            StreamKind::P2p => Some("[P2P]".to_string()),
            StreamKind::Live => Some("[LIVE]".to_string()),
            _ => None,
        }
    }

    fn joined(parts: &[Option<String>], separator: &str) -> Option<String> {
        let present: Vec<&str> = parts
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|part| !part.is_empty())
            .collect();
        (!present.is_empty()).then(|| present.join(separator))
    }

    fn list(values: &[String], separator: &str) -> Option<String> {
        (!values.is_empty()).then(|| values.join(separator))
    }
}

impl StreamFormatter for DefaultFormatter {
    fn format(&self, record: &CanonicalStream) -> FormattedStream {
        if let Some(error) = &record.error {
            return FormattedStream {
                name: format!("[❌] {}", self.addon_name),
                description: format!("{}\n{}", error.title, error.description),
            };
        }

        let tags = &record.tags;
        let mut name = String::new();
        if let Some(badge) = Self::service_badge(record) {
            name.push_str(&badge);
            name.push(' ');
        }
        name.push_str(&self.addon_name);
        if record.proxied {
            name.push_str(" 🕵");
        }
        if let Some(resolution) = &tags.resolution {
            name.push('\n');
            name.push_str(resolution);
        }

        let season_episode = tags.season_episode_labels().join(" ");
        let lines = [
            Self::joined(
                &[
                    tags.title.clone(),
                    tags.year.map(|year| format!("({year})")),
                    (!season_episode.is_empty()).then_some(season_episode),
                ],
                " ",
            ),
            Self::joined(
                &[
                    tags.quality.as_ref().map(|q| format!("🎥 {q}")),
                    tags.encode.clone(),
                    Self::list(&tags.visual_tags, " | ").map(|v| format!("📺 {v}")),
                ],
                " ",
            ),
            Self::joined(
                &[
                    Self::list(&tags.audio_tags, " | ").map(|a| format!("🎧 {a}")),
                    Self::list(&tags.audio_channels, " | ").map(|c| format!("🔊 {c}")),
                ],
                " ",
            ),
            Self::joined(
                &[
                    record.size.map(|size| format!("📦 {}", format_bytes(size))),
                    record.seeders.map(|seeders| format!("👥 {seeders}")),
                    (record.duration > 0)
                        .then(|| format!("⏱ {}", format_duration(record.duration))),
                    record.age.as_ref().map(|age| format!("📅 {age}")),
                    record.indexer.as_ref().map(|indexer| format!("🔍 {indexer}")),
                ],
                " ",
            ),
            Self::list(&tags.languages, " | ").map(|l| format!("🌎 {l}")),
            record.filename.as_ref().map(|f| format!("📄 {f}")),
        ];

        FormattedStream {
            name,
            description: lines.into_iter().flatten().collect::<Vec<_>>().join("\n"),
        }
    }
}

fn short_service_name(id: &str) -> &str {
    match id {
        "realdebrid" => "RD",
        "alldebrid" => "AD",
        "premiumize" => "PM",
        "debridlink" => "DL",
        "torbox" => "TB",
        "easydebrid" => "ED",
        "offcloud" => "OC",
        "putio" => "PO",
        "pikpak" => "PKP",
        "seedr" => "SR",
        "easynews" => "EN",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Locator, ServiceInfo};

    #[test]
    fn test_default_layout() {
        let mut record = CanonicalStream::new(
            "src",
            "Source",
            "generic",
            StreamKind::Debrid,
            Locator::Url("https://cdn.example/v.mkv".into()),
        );
        record.service = Some(ServiceInfo {
            id: "realdebrid".into(),
            cached: true,
        });
        record.size = Some(5 * 1024 * 1024 * 1024);
        record.filename = Some("Movie.2023.2160p.mkv".into());
        record.tags.resolution = Some("2160p".into());
        record.tags.languages = vec!["English".into()];

        let formatted = DefaultFormatter::new("Aggregator").format(&record);
        assert_eq!(formatted.name, "[RD⚡] Aggregator\n2160p");
        assert!(formatted.description.contains("📦 5.00 GB"));
        assert!(formatted.description.contains("🌎 English"));
        assert!(formatted.description.ends_with("📄 Movie.2023.2160p.mkv"));
    }

    #[test]
    fn test_error_layout() {
        let record = CanonicalStream::error("src", "Source", "generic", "Source failed", "timeout");
        let formatted = DefaultFormatter::new("Aggregator").format(&record);
        assert_eq!(formatted.name, "[❌] Aggregator");
        assert_eq!(formatted.description, "Source failed\ntimeout");
    }
}
