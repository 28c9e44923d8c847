//! Mapping canonical records to the outbound stream shape

use crate::formatter::StreamFormatter;
use crate::models::{CanonicalStream, Locator, WireBehaviorHints, WireStream};
use crate::sources::SourceFailure;

/// Error record standing in for a failed source
pub fn failure_record(failure: &SourceFailure) -> CanonicalStream {
    CanonicalStream::error(
        &failure.source_id,
        &failure.source_name,
        "error",
        format!("{} failed", failure.source_name),
        &failure.message,
    )
}

/// Grouping key for auto-continue playback. Proxied records carry the
/// backend marker so the client never switches between proxied and direct.
pub fn binge_group(record: &CanonicalStream, proxy_marker: Option<&str>) -> String {
    let tags = &record.tags;
    let parts = [
        tags.resolution.clone().unwrap_or_default(),
        tags.quality.clone().unwrap_or_default(),
        tags.encode.clone().unwrap_or_default(),
        tags.audio_tags.join(","),
        tags.visual_tags.join(","),
        tags.languages.join(","),
        tags.release_group.clone().unwrap_or_default(),
        record.indexer.clone().unwrap_or_default(),
    ];
    let group = parts.join("|");
    match proxy_marker {
        Some(marker) if record.proxied => format!("{marker}|{group}"),
        _ => group,
    }
}

pub struct WireMapper<'a> {
    formatter: &'a dyn StreamFormatter,
    proxy_marker: Option<&'a str>,
}

impl<'a> WireMapper<'a> {
    pub fn new(formatter: &'a dyn StreamFormatter, proxy_marker: Option<&'a str>) -> Self {
        Self {
            formatter,
            proxy_marker,
        }
    }

    /// One outbound stream per record, with exactly the locator its kind uses
    pub fn to_wire(&self, record: &CanonicalStream) -> WireStream {
        let formatted = self.formatter.format(record);
        let mut stream = WireStream {
            name: formatted.name,
            description: formatted.description,
            subtitles: record.subtitles.clone(),
            ..Default::default()
        };

        match &record.locator {
            Some(Locator::Url(url)) => stream.url = Some(url.clone()),
            Some(Locator::Torrent {
                info_hash,
                file_idx,
                sources,
            }) => {
                stream.info_hash = Some(info_hash.clone());
                stream.file_idx = *file_idx;
                stream.sources = (!sources.is_empty()).then(|| sources.clone());
            }
            Some(Locator::External(url)) => stream.external_url = Some(url.clone()),
            Some(Locator::YouTube(id)) => stream.yt_id = Some(id.clone()),
            None => {}
        }

        if !record.is_error() {
            stream.behavior_hints = WireBehaviorHints {
                video_size: record.size,
                filename: record.filename.clone(),
                binge_group: Some(binge_group(record, self.proxy_marker)),
                proxy_headers: record.proxy_headers.clone(),
                not_web_ready: record.not_web_ready.then_some(true),
                video_hash: record.video_hash.clone(),
            };
        }
        stream
    }

    pub fn map_all(&self, records: &[CanonicalStream]) -> Vec<WireStream> {
        records.iter().map(|record| self.to_wire(record)).collect()
    }
}
