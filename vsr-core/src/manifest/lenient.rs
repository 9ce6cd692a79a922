//! Line scanner for master playlists that `m3u8-rs` refuses, such as variants
//! without `BANDWIDTH` or documents missing the `#EXTM3U` header.

use super::{Manifest, audio_track, resolve, subtitle_track};
use crate::model::StreamVariant;
use regex::Regex;
use std::{collections::HashMap, sync::OnceLock};
use url::Url;

const STREAM_INF: &str = "#EXT-X-STREAM-INF:";
const MEDIA: &str = "#EXT-X-MEDIA:";

pub(super) fn scan(text: &str, base_url: &Url) -> Manifest {
    let mut manifest = Manifest::default();
    let mut pending: Option<StreamVariant> = None;

    for line in text.lines().map(|x| x.trim()).filter(|x| !x.is_empty()) {
        if let Some(attrs) = line.strip_prefix(STREAM_INF) {
            let attrs = attributes(attrs);

            pending = Some(StreamVariant {
                url: String::new(),
                resolution_height: attrs.get("RESOLUTION").and_then(|x| height(x)),
                bandwidth_bps: attrs.get("BANDWIDTH").and_then(|x| x.parse().ok()),
            });
        } else if let Some(attrs) = line.strip_prefix(MEDIA) {
            let attrs = attributes(attrs);
            let name = attrs.get("NAME").copied();
            let language = attrs.get("LANGUAGE").copied();

            match attrs.get("TYPE").copied() {
                Some("AUDIO") => manifest.audio_tracks.push(audio_track(language, name)),
                Some("SUBTITLES") => {
                    if let Some(track) = attrs
                        .get("URI")
                        .and_then(|x| subtitle_track(x, language, name, base_url))
                    {
                        manifest.subtitles.push(track);
                    }
                }
                _ => (),
            }

            pending = None;
        } else if line.starts_with("#EXT") {
            // Only blank lines and comments may sit between a declaration and its uri.
            pending = None;
        } else if !line.starts_with('#') {
            if let Some(mut variant) = pending.take() {
                match resolve(base_url, line) {
                    Some(url) => {
                        variant.url = url;
                        manifest.variants.push(variant);
                    }
                    None => log::debug!("skipping unresolvable variant uri {}", line),
                }
            }
        }
    }

    manifest
}

/// Split an attribute list, quoted values may contain commas.
pub(super) fn attributes(list: &str) -> HashMap<&str, &str> {
    static RE: OnceLock<Regex> = OnceLock::new();

    RE.get_or_init(|| Regex::new(r#"([A-Z0-9-]+)=("[^"]*"|[^,]*)"#).unwrap())
        .captures_iter(list)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str().trim();
            Some((key, value.trim_matches('"')))
        })
        .collect()
}

/// Height out of a `WIDTHxHEIGHT` resolution.
fn height(resolution: &str) -> Option<u32> {
    resolution
        .split_once(['x', 'X'])
        .and_then(|(_, x)| x.trim().parse().ok())
}
