use crate::{error::PipelineError, quality::Quality};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Episode,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Movie => "movie",
                Self::Episode => "tv",
            }
        )
    }
}

/// What to resolve. Built by the caller, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub kind: MediaKind,
    pub external_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl MediaReference {
    pub fn movie<T: Into<String>>(external_id: T) -> Self {
        Self {
            kind: MediaKind::Movie,
            external_id: external_id.into(),
            season: None,
            episode: None,
        }
    }

    pub fn episode<T: Into<String>>(external_id: T, season: u32, episode: u32) -> Self {
        Self {
            kind: MediaKind::Episode,
            external_id: external_id.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.external_id.trim().is_empty() {
            return Err(PipelineError::InvalidReference("external id is empty".to_owned()));
        }

        if self.external_id.chars().any(|x| x.is_whitespace()) {
            return Err(PipelineError::InvalidReference(format!(
                "external id '{}' contains whitespace",
                self.external_id
            )));
        }

        match (self.kind, self.season, self.episode) {
            (MediaKind::Movie, None, None) | (MediaKind::Episode, Some(_), Some(_)) => Ok(()),
            (MediaKind::Movie, _, _) => Err(PipelineError::InvalidReference(
                "a movie cannot carry season or episode numbers".to_owned(),
            )),
            (MediaKind::Episode, _, _) => Err(PipelineError::InvalidReference(
                "an episode needs both season and episode numbers".to_owned(),
            )),
        }
    }

    /// Identifier used for request tokens, `id` or `id_season_episode`.
    pub fn item_id(&self) -> String {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => format!("{}_{}_{}", self.external_id, s, e),
            _ => self.external_id.clone(),
        }
    }
}

/// One quality specific sub-stream of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamVariant {
    pub url: String,
    pub resolution_height: Option<u32>,
    pub bandwidth_bps: Option<u64>,
}

impl StreamVariant {
    /// Declared height wins, bandwidth and then the url are only hints.
    /// The flag is `true` when the label had to be guessed.
    pub fn quality(&self) -> (Quality, bool) {
        if let Some(height) = self.resolution_height {
            return (Quality::from_height(height), false);
        }

        if let Some(bandwidth) = self.bandwidth_bps {
            let quality = Quality::from_bandwidth(bandwidth);

            if !quality.is_unknown() {
                return (quality, true);
            }
        }

        (Quality::from_url(&self.url), true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    #[serde(rename = "language")]
    pub language_code: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Ass,
    Ssa,
    Ttml,
}

impl SubtitleFormat {
    pub fn from_url(url: &str) -> Self {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase();

        if path.ends_with(".srt") {
            Self::Srt
        } else if path.ends_with(".ass") {
            Self::Ass
        } else if path.ends_with(".ssa") {
            Self::Ssa
        } else if path.ends_with(".ttml") || path.ends_with(".dfxp") || path.ends_with(".xml") {
            Self::Ttml
        } else {
            Self::Vtt
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleTrack {
    pub url: String,
    pub label: String,
    pub format: SubtitleFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Hls,
    Mp4,
    Mkv,
}

impl MediaType {
    pub fn from_url(url: &str) -> Self {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase();

        if path.ends_with(".m3u8") || path.ends_with(".m3u") {
            Self::Hls
        } else if path.ends_with(".mkv") {
            Self::Mkv
        } else {
            Self::Mp4
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub quality: Quality,
    pub audio_tracks: Vec<AudioTrack>,
}

impl Source {
    /// Language of the first audio track.
    pub fn language(&self) -> Option<&str> {
        self.audio_tracks.first().map(|x| x.language_code.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    ProviderError,
    PartialScrape,
    QualityInferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn provider_error<T: Into<String>>(message: T) -> Self {
        Self {
            code: DiagnosticCode::ProviderError,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn partial_scrape<T: Into<String>>(message: T) -> Self {
        Self {
            code: DiagnosticCode::PartialScrape,
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn quality_inferred<T: Into<String>>(message: T) -> Self {
        Self {
            code: DiagnosticCode::QualityInferred,
            message: message.into(),
            severity: Severity::Info,
        }
    }
}

/// Final output of one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub sources: Vec<Source>,
    pub subtitles: Vec<SubtitleTrack>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionResult {
    pub(crate) fn failed(error: impl Display) -> Self {
        Self {
            diagnostics: vec![Diagnostic::provider_error(error.to_string())],
            ..Default::default()
        }
    }
}
