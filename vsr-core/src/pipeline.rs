//! Resolution of one [`MediaReference`] across every candidate host.

use crate::{
    aggregate::{aggregate, merge_subtitles},
    error::{CandidateError, ParseError, PipelineError, TransportError},
    extract::Link,
    model::{AudioTrack, Diagnostic, MediaReference, MediaType, ResolutionResult, Source, SubtitleTrack},
    profile::{ProfileRegistry, SiteProfile},
    quality::Quality,
    request::{CandidateRequest, CandidateTemplate, Transport},
};
use log::{debug, warn};
use serde::Serialize;
use std::{fmt::Display, sync::Arc, time::Duration};
use tokio::task::JoinSet;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// States of a resolution. `Decoding` and `Parsing` are entered by each
/// candidate task on its own, every other state by the resolution as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Requesting,
    Decoding,
    Parsing,
    Aggregating,
    Done,
    Failed,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Idle => "idle",
                Self::Requesting => "requesting",
                Self::Decoding => "decoding",
                Self::Parsing => "parsing",
                Self::Aggregating => "aggregating",
                Self::Done => "done",
                Self::Failed => "failed",
            }
        )
    }
}

/// Terminal state of a resolution. Both variants carry a well formed result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Requests were issued. Sources may still be empty, with a diagnostic.
    Done(ResolutionResult),
    /// Not a single request could be issued.
    Failed(ResolutionResult),
}

impl Outcome {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Done(_) => Stage::Done,
            Self::Failed(_) => Stage::Failed,
        }
    }

    pub fn result(&self) -> &ResolutionResult {
        match self {
            Self::Done(x) | Self::Failed(x) => x,
        }
    }

    pub fn into_result(self) -> ResolutionResult {
        match self {
            Self::Done(x) | Self::Failed(x) => x,
        }
    }
}

pub struct Pipeline<T> {
    transport: Arc<T>,
    profiles: Arc<ProfileRegistry>,
    timeout: Duration,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(transport: T, profiles: ProfileRegistry) -> Self {
        Self {
            transport: Arc::new(transport),
            profiles: Arc::new(profiles),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound on each candidate's network wait. Decoding is never timed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn resolve(&self, reference: &MediaReference, templates: &[CandidateTemplate]) -> Outcome {
        enter(Stage::Idle);

        if let Err(e) = reference.validate() {
            warn!("{}", e);
            enter(Stage::Failed);
            return Outcome::Failed(ResolutionResult::failed(e));
        }

        let requests = self.requests(reference, templates);

        if requests.is_empty() {
            warn!("{} for {} {}", PipelineError::NoCandidates, reference.kind, reference.external_id);
            enter(Stage::Failed);
            return Outcome::Failed(ResolutionResult::failed(PipelineError::NoCandidates));
        }

        enter(Stage::Requesting);
        let total = requests.len();
        let mut set = JoinSet::new();

        for (request, profile) in requests {
            let transport = self.transport.clone();
            let timeout = self.timeout;

            set.spawn(async move {
                let index = request.index;
                let name = profile.name.clone();
                let result = candidate(transport, profile, request, timeout).await;
                (index, name, result)
            });
        }

        let mut settled = vec![];
        let mut failures = vec![];

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, name, Ok(x))) => settled.push((index, name, x)),
                Ok((index, name, Err(e))) => {
                    warn!("candidate {} ({}) dropped while {}: {}", index, name, failed_at(&e), e);
                    failures.push((name, e));
                }
                Err(e) => {
                    warn!("candidate task dropped: {}", e);
                    failures.push(("unknown".to_owned(), CandidateError::Aborted(e.to_string())));
                }
            }
        }

        enter(Stage::Aggregating);
        settled.sort_by_key(|(index, _, _)| *index);

        let mut diagnostics = settled
            .iter()
            .filter(|(_, _, x)| x.inferred > 0)
            .map(|(index, name, x)| {
                Diagnostic::quality_inferred(format!(
                    "{}: quality of {} source(s) from candidate {} was inferred",
                    name, x.inferred, index
                ))
            })
            .collect::<Vec<_>>();

        let subtitles = merge_subtitles(settled.iter().map(|(_, _, x)| x.subtitles.clone()));
        let sources = aggregate(settled.into_iter().map(|(_, _, x)| x.sources));

        if sources.is_empty() {
            diagnostics.clear();
            diagnostics.push(empty_diagnostic(total, &failures));
        }

        debug!(
            "resolved {} sources and {} subtitles from {} candidates ({} dropped)",
            sources.len(),
            subtitles.len(),
            total,
            failures.len()
        );

        enter(Stage::Done);
        Outcome::Done(ResolutionResult {
            sources,
            subtitles,
            diagnostics,
        })
    }

    fn requests(
        &self,
        reference: &MediaReference,
        templates: &[CandidateTemplate],
    ) -> Vec<(CandidateRequest, Arc<SiteProfile>)> {
        let mut requests = vec![];

        for template in templates {
            let Some(profile) = self.profiles.get(&template.profile) else {
                warn!("skipping template for unknown profile '{}'", template.profile);
                continue;
            };

            match template.render(requests.len(), reference, &profile.key) {
                Ok(Some(request)) => {
                    debug!("candidate {} ({}): {}", request.index, profile.name, request.url);
                    requests.push((request, profile));
                }
                Ok(None) => debug!("profile '{}' has no {} template", profile.name, reference.kind),
                Err(e) => warn!("skipping template for '{}': {}", profile.name, e),
            }
        }

        requests
    }
}

fn enter(stage: Stage) {
    debug!("pipeline stage: {}", stage);
}

fn enter_candidate(request: &CandidateRequest, profile: &SiteProfile, stage: Stage) {
    debug!("candidate {} ({}) stage: {}", request.index, profile.name, stage);
}

/// Stage a dropped candidate was in.
fn failed_at(error: &CandidateError) -> Stage {
    match error {
        CandidateError::Transport(_) | CandidateError::Aborted(_) => Stage::Requesting,
        CandidateError::Decode(_) => Stage::Decoding,
        CandidateError::Parse(_) => Stage::Parsing,
        CandidateError::Template(_) => Stage::Idle,
    }
}

/// Sources of one candidate that survived every stage.
#[derive(Debug)]
struct Parsed {
    sources: Vec<Source>,
    subtitles: Vec<SubtitleTrack>,
    /// Sources whose quality was guessed.
    inferred: usize,
}

async fn candidate<T: Transport>(
    transport: Arc<T>,
    profile: Arc<SiteProfile>,
    request: CandidateRequest,
    timeout: Duration,
) -> Result<Parsed, CandidateError> {
    let response = tokio::time::timeout(timeout, transport.fetch(&request))
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;

    if !response.is_success() {
        return Err(TransportError::Status {
            status: response.status,
        }
        .into());
    }

    enter_candidate(&request, &profile, Stage::Decoding);
    let decoded = profile.decode(response.text()?)?;

    enter_candidate(&request, &profile, Stage::Parsing);
    let base_url = response.url.as_ref().unwrap_or(&request.url);
    let parsed = parse(&profile, &decoded, base_url)?;

    if parsed.sources.is_empty() {
        return Err(ParseError::NoStreams.into());
    }

    Ok(parsed)
}

fn parse(profile: &SiteProfile, decoded: &str, base_url: &Url) -> Result<Parsed, ParseError> {
    let mut inferred = 0;

    if profile.shape.is_manifest() {
        let manifest = profile.manifest_format.extractor().extract(decoded, base_url)?;
        let audio_tracks = audio_or_default(manifest.audio_tracks, profile);

        let sources = manifest
            .variants
            .into_iter()
            .map(|variant| {
                let (quality, guessed) = variant.quality();
                inferred += guessed as usize;

                Source {
                    media_type: if manifest.is_playlist {
                        MediaType::Hls
                    } else {
                        MediaType::from_url(&variant.url)
                    },
                    url: variant.url,
                    quality,
                    audio_tracks: audio_tracks.clone(),
                }
            })
            .collect();

        return Ok(Parsed {
            sources,
            subtitles: manifest.subtitles,
            inferred,
        });
    }

    let extracted = profile.shape.extract(decoded)?;

    let sources = extracted
        .links
        .into_iter()
        .map(|link| {
            let Link {
                url,
                quality,
                language,
                label,
            } = link;

            let quality = match quality.filter(|x| !x.is_unknown()) {
                Some(x) => x,
                None => {
                    inferred += 1;
                    Quality::from_url(&url)
                }
            };

            let audio_tracks = match language {
                Some(language_code) => vec![AudioTrack {
                    label: label.unwrap_or_else(|| language_code.clone()),
                    language_code,
                }],
                None => audio_or_default(vec![], profile),
            };

            Source {
                media_type: MediaType::from_url(&url),
                url,
                quality,
                audio_tracks,
            }
        })
        .collect();

    Ok(Parsed {
        sources,
        subtitles: extracted.subtitles,
        inferred,
    })
}

fn audio_or_default(tracks: Vec<AudioTrack>, profile: &SiteProfile) -> Vec<AudioTrack> {
    if tracks.is_empty() {
        profile.default_audio.iter().cloned().collect()
    } else {
        tracks
    }
}

/// The one diagnostic explaining an empty result.
fn empty_diagnostic(total: usize, failures: &[(String, CandidateError)]) -> Diagnostic {
    let summary = failures
        .iter()
        .map(|(name, e)| format!("{}: {}", name, e))
        .collect::<Vec<_>>()
        .join("; ");

    if failures.len() == total && failures.iter().all(|(_, e)| e.is_transport()) {
        Diagnostic::provider_error(format!("all {} candidates failed: {}", total, summary))
    } else {
        Diagnostic::partial_scrape(format!(
            "no sources decoded from {} candidates: {}",
            total, summary
        ))
    }
}
