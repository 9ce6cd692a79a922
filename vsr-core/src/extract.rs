//! Stream links out of decoded, non manifest payloads.
//!
//! Hosts answer with a handful of JSON or script layouts. Each site profile
//! names the one it uses, nothing here tries to guess.

use crate::{
    error::ParseError,
    model::{SubtitleFormat, SubtitleTrack},
    quality::Quality,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Declared layout of a decoded payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadShape {
    /// Payload is a manifest or a bare url, read by the profile's manifest format.
    #[default]
    Manifest,
    /// Unpacked jwplayer setup script.
    PackedPlayer,
    /// `{ "name": { "url": ..., "language": ..., "quality": ... }, ... }`.
    SourceMap {
        #[serde(default)]
        field: Option<String>,
    },
    /// Download listing with `downloads`, `captions` and `externalStreams`.
    Downloads,
    /// `[{ "file": ..., "title": ... }]`.
    FileList,
    /// Single url at a JSON pointer.
    UrlPointer { pointer: String },
    /// Array of links at `pointer`, each url under `field` next to optional
    /// `lang`, `name` and `quality`. Subtitles from `[{ "url": ..., "lang": ... }]`
    /// at `tracks`.
    LinkArray {
        pointer: String,
        #[serde(default = "default_link_field")]
        field: String,
        #[serde(default)]
        tracks: Option<String>,
    },
}

fn default_link_field() -> String {
    "link".to_owned()
}

/// One playable url found in a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    /// Quality declared next to the url.
    pub quality: Option<Quality>,
    pub language: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub links: Vec<Link>,
    pub subtitles: Vec<SubtitleTrack>,
}

impl PayloadShape {
    pub fn is_manifest(&self) -> bool {
        matches!(self, Self::Manifest)
    }

    /// Links and subtitles of `text`. Relative or non http urls are dropped.
    pub fn extract(&self, text: &str) -> Result<Extracted, ParseError> {
        let mut extracted = match self {
            Self::Manifest => {
                return Err(ParseError::UnexpectedShape(
                    "manifest payloads are read by the manifest parser".to_owned(),
                ));
            }
            Self::PackedPlayer => packed_player(text),
            Self::SourceMap { field } => source_map(&json(text)?, field.as_deref())?,
            Self::Downloads => downloads(&json(text)?),
            Self::FileList => file_list(&json(text)?)?,
            Self::LinkArray {
                pointer,
                field,
                tracks,
            } => link_array(&json(text)?, pointer, field, tracks.as_deref())?,
            Self::UrlPointer { pointer } => {
                let url = json(text)?
                    .pointer(pointer)
                    .and_then(|x| x.as_str())
                    .map(|x| x.to_owned())
                    .ok_or_else(|| {
                        ParseError::UnexpectedShape(format!("no string at json pointer {}", pointer))
                    })?;

                Extracted {
                    links: vec![Link {
                        url,
                        ..Default::default()
                    }],
                    ..Default::default()
                }
            }
        };

        extracted.links.retain(|x| is_http(&x.url));
        extracted.subtitles.retain(|x| is_http(&x.url));

        if extracted.links.is_empty() {
            return Err(ParseError::NoStreams);
        }

        Ok(extracted)
    }
}

fn json(text: &str) -> Result<Value, ParseError> {
    serde_json::from_str(text.trim()).map_err(|x| ParseError::UnexpectedShape(format!("json: {}", x)))
}

fn is_http(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn string<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|x| x.as_str()).filter(|x| !x.trim().is_empty())
}

fn packed_player(text: &str) -> Extracted {
    static LINKS: OnceLock<[Regex; 3]> = OnceLock::new();
    static SOURCES: OnceLock<Regex> = OnceLock::new();
    static TRACKS: OnceLock<Regex> = OnceLock::new();
    static OBJECT: OnceLock<Regex> = OnceLock::new();
    static FIELD: OnceLock<Regex> = OnceLock::new();

    let links = LINKS.get_or_init(|| {
        ["hls4", "hls2", "hls3"].map(|x| {
            Regex::new(&format!(r#"["']?{}["']?\s*:\s*["']([^"']+)["']"#, x)).unwrap()
        })
    });

    let captured = |re: &Regex| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|x| x.as_str().replace("\\/", "/"))
            .filter(|x| is_http(x))
    };

    let url = links.iter().find_map(captured).or_else(|| {
        captured(SOURCES.get_or_init(|| {
            Regex::new(r#"sources\s*:\s*\[\s*\{\s*["']?file["']?\s*:\s*["']([^"']+)["']"#).unwrap()
        }))
    });

    let field = FIELD.get_or_init(|| {
        Regex::new(r#"["']?(file|label|kind)["']?\s*:\s*["']([^"']*)["']"#).unwrap()
    });
    let mut subtitles = vec![];

    if let Some(tracks) = TRACKS
        .get_or_init(|| Regex::new(r"(?s)tracks\s*:\s*\[(.*?)\]").unwrap())
        .captures(text)
        .and_then(|caps| caps.get(1))
    {
        let objects = OBJECT.get_or_init(|| Regex::new(r"\{([^{}]*)\}").unwrap());

        for object in objects.captures_iter(tracks.as_str()) {
            let (mut file, mut label, mut kind) = (None, None, None);

            for caps in field.captures_iter(&object[1]) {
                let value = caps.get(2).map(|x| x.as_str().replace("\\/", "/"));

                match &caps[1] {
                    "file" => file = value,
                    "label" => label = value,
                    _ => kind = value,
                }
            }

            if let (Some(file), Some(kind)) = (file, kind) {
                if kind == "captions" || kind == "subtitles" {
                    subtitles.push(SubtitleTrack {
                        format: SubtitleFormat::from_url(&file),
                        label: label.unwrap_or(kind),
                        url: file,
                    });
                }
            }
        }
    }

    Extracted {
        links: url
            .map(|url| Link {
                url,
                ..Default::default()
            })
            .into_iter()
            .collect(),
        subtitles,
    }
}

fn source_map(root: &Value, field: Option<&str>) -> Result<Extracted, ParseError> {
    let map = match field {
        Some(field) => root.get(field),
        None => Some(root),
    }
    .and_then(|x| x.as_object())
    .ok_or_else(|| ParseError::UnexpectedShape("expected an object of sources".to_owned()))?;

    let links = map
        .values()
        .filter_map(|entry| {
            let url = string(entry, "url")?;
            let language = string(entry, "language");

            Some(Link {
                url: url.to_owned(),
                quality: string(entry, "quality").map(Quality::from_label),
                language: language.map(language_code),
                label: language.map(|x| x.to_owned()),
            })
        })
        .collect();

    Ok(Extracted {
        links,
        ..Default::default()
    })
}

fn downloads(root: &Value) -> Extracted {
    let listing = root.pointer("/data/downloadData/data").unwrap_or(root);
    let mut extracted = Extracted::default();

    let array = |value: &Value, key: &str| -> Vec<Value> {
        value
            .get(key)
            .and_then(|x| x.as_array())
            .cloned()
            .unwrap_or_default()
    };

    for download in array(listing, "downloads") {
        if let Some(url) = string(&download, "url") {
            extracted.links.push(Link {
                url: url.to_owned(),
                quality: download
                    .get("resolution")
                    .and_then(|x| x.as_u64().or_else(|| x.as_str()?.trim_end_matches('p').parse().ok()))
                    .and_then(|x| u32::try_from(x).ok())
                    .map(Quality::from_height),
                ..Default::default()
            });
        }
    }

    for stream in array(root, "externalStreams") {
        if let Some(url) = string(&stream, "url") {
            extracted.links.push(Link {
                url: url.to_owned(),
                quality: string(&stream, "quality").map(Quality::from_label),
                ..Default::default()
            });
        }
    }

    for caption in array(listing, "captions") {
        if let Some(url) = string(&caption, "url") {
            extracted.subtitles.push(SubtitleTrack {
                url: url.to_owned(),
                label: string(&caption, "lanName")
                    .or(string(&caption, "lan"))
                    .unwrap_or("unknown")
                    .to_owned(),
                format: SubtitleFormat::from_url(url),
            });
        }
    }

    extracted
}

fn file_list(root: &Value) -> Result<Extracted, ParseError> {
    let entries = root
        .as_array()
        .ok_or_else(|| ParseError::UnexpectedShape("expected an array of files".to_owned()))?;

    let links = entries
        .iter()
        .filter_map(|entry| {
            let url = string(entry, "file")?;
            let title = string(entry, "title");

            Some(Link {
                url: url.to_owned(),
                quality: None,
                language: title.map(language_code),
                label: title.map(|x| x.to_owned()),
            })
        })
        .collect();

    Ok(Extracted {
        links,
        ..Default::default()
    })
}

fn link_array(
    root: &Value,
    pointer: &str,
    field: &str,
    tracks: Option<&str>,
) -> Result<Extracted, ParseError> {
    let entries = root.pointer(pointer).and_then(|x| x.as_array()).ok_or_else(|| {
        ParseError::UnexpectedShape(format!("no array at json pointer {}", pointer))
    })?;

    let links = entries
        .iter()
        .filter_map(|entry| {
            let language = string(entry, "lang").or(string(entry, "language"));

            Some(Link {
                url: string(entry, field)?.trim().to_owned(),
                quality: string(entry, "quality").map(Quality::from_label),
                language: language.map(language_code),
                label: language.map(|x| x.to_owned()),
            })
        })
        .collect();

    let subtitles = tracks
        .and_then(|x| root.pointer(x))
        .and_then(|x| x.as_array())
        .into_iter()
        .flatten()
        .filter_map(|track| {
            let url = string(track, "url").or(string(track, "file"))?;
            // hosts number repeated languages, "English2"
            let label = string(track, "lang")
                .or(string(track, "label"))
                .map(|x| x.trim_end_matches(|c: char| c.is_ascii_digit()).trim())
                .filter(|x| !x.is_empty())
                .unwrap_or("unknown");

            Some(SubtitleTrack {
                url: url.to_owned(),
                label: label.to_owned(),
                format: SubtitleFormat::from_url(url),
            })
        })
        .collect();

    Ok(Extracted { links, subtitles })
}

/// ISO 639-2 code for a language name or code found in a payload.
pub fn language_code(name: &str) -> String {
    let name = name.trim().to_lowercase();

    let code = match name.as_str() {
        "english" | "en" => "eng",
        "italian" | "italiano" | "it" => "ita",
        "spanish" | "español" | "espanol" | "es" => "spa",
        "french" | "français" | "francais" | "fr" => "fra",
        "german" | "deutsch" | "de" => "deu",
        "portuguese" | "português" | "pt" => "por",
        "hindi" | "hi" => "hin",
        "japanese" | "ja" => "jpn",
        "korean" | "ko" => "kor",
        "vietnamese" | "vi" => "vie",
        x if x.len() == 3 && x.chars().all(|x| x.is_ascii_lowercase()) => x,
        _ => "und",
    };

    code.to_owned()
}
