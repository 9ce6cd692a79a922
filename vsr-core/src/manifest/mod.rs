//! HLS master playlists and direct play urls.

mod hls;
mod lenient;

use crate::{
    error::ParseError,
    model::{AudioTrack, StreamVariant, SubtitleFormat, SubtitleTrack},
};
use serde::Deserialize;
use url::Url;

const STREAM_INF: &str = "#EXT-X-STREAM-INF:";

/// Everything a manifest declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub variants: Vec<StreamVariant>,
    pub audio_tracks: Vec<AudioTrack>,
    pub subtitles: Vec<SubtitleTrack>,
    /// `false` when the text was a bare url rather than a playlist.
    pub is_playlist: bool,
}

/// Parse `text` fetched from `base_url`.
///
/// A master playlist yields its variants and renditions, a media playlist is
/// a single variant at `base_url` and anything else is read as a direct play
/// url.
pub fn parse(text: &str, base_url: &Url) -> Result<Manifest, ParseError> {
    let text = text.trim_start_matches('\u{feff}').trim();

    if text.contains(STREAM_INF) {
        let declared = text
            .lines()
            .filter(|x| x.trim_start().starts_with(STREAM_INF))
            .count();

        // m3u8-rs silently drops declarations it cannot read and pairs the
        // next uri with the previous attributes.
        let mut manifest = match m3u8_rs::parse_playlist_res(text.as_bytes()) {
            Ok(m3u8_rs::Playlist::MasterPlaylist(m3u8))
                if m3u8.variants.iter().filter(|x| !x.is_i_frame).count() == declared =>
            {
                hls::parse_as_master(&m3u8, base_url)
            }
            _ => {
                log::debug!("falling back to line scan for {}", base_url);
                lenient::scan(text, base_url)
            }
        };

        if manifest.variants.is_empty() {
            return Err(ParseError::MalformedManifest(
                "variant declarations without uri lines".to_owned(),
            ));
        }

        manifest.is_playlist = true;
        return Ok(manifest);
    }

    if text.starts_with("#EXTM3U") {
        return Ok(Manifest {
            variants: vec![StreamVariant {
                url: base_url.to_string(),
                resolution_height: None,
                bandwidth_bps: None,
            }],
            is_playlist: true,
            ..Default::default()
        });
    }

    direct(text, base_url)
}

pub fn parse_variants(text: &str, base_url: &Url) -> Vec<StreamVariant> {
    parse(text, base_url).map(|x| x.variants).unwrap_or_default()
}

pub fn parse_audio_tracks(text: &str) -> Vec<AudioTrack> {
    media_lines(text, "AUDIO")
        .map(|attrs| audio_track(attrs.get("LANGUAGE").copied(), attrs.get("NAME").copied()))
        .collect()
}

pub fn parse_subtitles(text: &str, base_url: &Url) -> Vec<SubtitleTrack> {
    media_lines(text, "SUBTITLES")
        .filter_map(|attrs| {
            subtitle_track(
                attrs.get("URI")?,
                attrs.get("LANGUAGE").copied(),
                attrs.get("NAME").copied(),
                base_url,
            )
        })
        .collect()
}

fn media_lines<'a>(
    text: &'a str,
    kind: &'a str,
) -> impl Iterator<Item = std::collections::HashMap<&'a str, &'a str>> + 'a {
    text.lines()
        .filter_map(|x| x.trim().strip_prefix("#EXT-X-MEDIA:"))
        .map(lenient::attributes)
        .filter(move |x| x.get("TYPE").copied() == Some(kind))
}

/// Whole payload is one url, its first non-empty line.
fn direct(text: &str, base_url: &Url) -> Result<Manifest, ParseError> {
    let line = text
        .lines()
        .map(|x| x.trim().trim_matches('"'))
        .find(|x| !x.is_empty())
        .ok_or(ParseError::NoStreams)?;

    let url = Some(line)
        .filter(|x| !x.contains(char::is_whitespace) && !x.starts_with(['<', '{', '[']))
        .and_then(|x| resolve(base_url, x))
        .filter(|x| x.starts_with("http://") || x.starts_with("https://"))
        .ok_or_else(|| {
            ParseError::MalformedManifest(format!("'{}' is neither a playlist nor a url", line))
        })?;

    Ok(Manifest {
        variants: vec![StreamVariant {
            url,
            resolution_height: None,
            bandwidth_bps: None,
        }],
        ..Default::default()
    })
}

/// How a profile's decoded payload is read when it is a manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestFormat {
    #[default]
    Hls,
    Direct,
}

impl ManifestFormat {
    pub fn extractor(&self) -> &'static dyn ManifestExtractor {
        match self {
            Self::Hls => &HlsExtractor,
            Self::Direct => &DirectExtractor,
        }
    }
}

/// Turns a text body into a [`Manifest`].
pub trait ManifestExtractor: Send + Sync {
    fn extract(&self, text: &str, base_url: &Url) -> Result<Manifest, ParseError>;
}

pub struct HlsExtractor;

impl ManifestExtractor for HlsExtractor {
    fn extract(&self, text: &str, base_url: &Url) -> Result<Manifest, ParseError> {
        parse(text, base_url)
    }
}

pub struct DirectExtractor;

impl ManifestExtractor for DirectExtractor {
    fn extract(&self, text: &str, base_url: &Url) -> Result<Manifest, ParseError> {
        direct(text.trim(), base_url)
    }
}

pub(crate) fn resolve(base_url: &Url, uri: &str) -> Option<String> {
    base_url.join(uri.trim()).ok().map(|x| x.to_string())
}

fn audio_track(language: Option<&str>, name: Option<&str>) -> AudioTrack {
    AudioTrack {
        language_code: language.unwrap_or("und").to_owned(),
        label: name.unwrap_or("Audio").to_owned(),
    }
}

fn subtitle_track(
    uri: &str,
    language: Option<&str>,
    name: Option<&str>,
    base_url: &Url,
) -> Option<SubtitleTrack> {
    let url = resolve(base_url, uri)?;

    Some(SubtitleTrack {
        format: SubtitleFormat::from_url(&url),
        label: name.or(language).unwrap_or("unknown").to_owned(),
        url,
    })
}
