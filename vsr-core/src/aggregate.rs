use crate::{
    model::{Source, SubtitleTrack},
    quality::Quality,
};
use std::{cmp::Ordering, collections::HashSet};

/// Merge per-candidate sources in submission order.
///
/// The first source seen for a `(language, quality)` pair is kept. Output is
/// ordered by language code (sources without one last), then by quality
/// priority, highest first.
pub fn aggregate<I>(candidates: I) -> Vec<Source>
where
    I: IntoIterator<Item = Vec<Source>>,
{
    let mut seen = HashSet::<(Option<String>, Quality)>::new();
    let mut sources = vec![];

    for source in candidates.into_iter().flatten() {
        if seen.insert((source.language().map(|x| x.to_owned()), source.quality)) {
            sources.push(source);
        } else {
            log::trace!("dropping duplicate {} source {}", source.quality, source.url);
        }
    }

    sources.sort_by(rank);
    sources
}

fn rank(a: &Source, b: &Source) -> Ordering {
    let language = match (a.language(), b.language()) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    language.then_with(|| b.quality.priority().cmp(&a.quality.priority()))
}

/// Drop subtitles whose url was already seen, keeping order.
pub fn merge_subtitles<I>(candidates: I) -> Vec<SubtitleTrack>
where
    I: IntoIterator<Item = Vec<SubtitleTrack>>,
{
    let mut seen = HashSet::new();

    candidates
        .into_iter()
        .flatten()
        .filter(|x| seen.insert(x.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioTrack, MediaType, SubtitleFormat};

    fn source(url: &str, quality: Quality, language: Option<&str>) -> Source {
        Source {
            url: url.to_owned(),
            media_type: MediaType::Hls,
            quality,
            audio_tracks: language
                .map(|x| {
                    vec![AudioTrack {
                        language_code: x.to_owned(),
                        label: x.to_owned(),
                    }]
                })
                .unwrap_or_default(),
        }
    }

    fn urls(sources: &[Source]) -> Vec<&str> {
        sources.iter().map(|x| x.url.as_str()).collect()
    }

    #[test]
    fn duplicates_collapse_first_seen() {
        let sources = aggregate(vec![
            vec![source("a", Quality::P1080, Some("eng"))],
            vec![source("b", Quality::P1080, Some("eng"))],
        ]);

        assert_eq!(urls(&sources), vec!["a"]);
    }

    #[test]
    fn ordering() {
        let sources = aggregate(vec![
            vec![
                source("none-720", Quality::P720, None),
                source("ita-480", Quality::P480, Some("ita")),
                source("eng-720", Quality::P720, Some("eng")),
            ],
            vec![],
            vec![
                source("eng-4k", Quality::Uhd, Some("eng")),
                source("eng-unknown", Quality::Unknown, Some("eng")),
                source("none-1080", Quality::P1080, None),
                source("eng-576", Quality::Height(576), Some("eng")),
            ],
        ]);

        assert_eq!(
            urls(&sources),
            vec![
                "eng-4k",
                "eng-720",
                "eng-unknown",
                "eng-576",
                "ita-480",
                "none-1080",
                "none-720"
            ]
        );
    }

    #[test]
    fn idempotent() {
        let once = aggregate(vec![
            vec![
                source("x", Quality::P360, Some("fra")),
                source("y", Quality::P1080, Some("eng")),
                source("z", Quality::P1080, Some("eng")),
            ],
            vec![source("w", Quality::Unknown, None)],
        ]);
        let twice = aggregate(vec![once.clone()]);

        assert_eq!(once, twice);
    }

    #[test]
    fn subtitles_dedupe_by_url() {
        let track = |url: &str, label: &str| SubtitleTrack {
            url: url.to_owned(),
            label: label.to_owned(),
            format: SubtitleFormat::Vtt,
        };

        let merged = merge_subtitles(vec![
            vec![track("u1", "English"), track("u2", "Italian")],
            vec![track("u1", "English (copy)"), track("u3", "French")],
        ]);

        assert_eq!(
            merged.iter().map(|x| x.label.as_str()).collect::<Vec<_>>(),
            vec!["English", "Italian", "French"]
        );
    }
}
