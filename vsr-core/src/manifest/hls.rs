use super::{Manifest, audio_track, resolve, subtitle_track};
use crate::model::StreamVariant;
use m3u8_rs::{AlternativeMediaType, MasterPlaylist, Resolution};
use url::Url;

pub(super) fn parse_as_master(m3u8: &MasterPlaylist, base_url: &Url) -> Manifest {
    let mut manifest = Manifest::default();

    for variant in &m3u8.variants {
        if variant.is_i_frame || variant.uri.trim().is_empty() {
            continue;
        }

        let Some(url) = resolve(base_url, &variant.uri) else {
            log::debug!("skipping unresolvable variant uri {}", variant.uri);
            continue;
        };

        manifest.variants.push(StreamVariant {
            url,
            resolution_height: if let Some(Resolution { height, .. }) = variant.resolution {
                u32::try_from(height).ok()
            } else {
                None
            },
            bandwidth_bps: Some(variant.bandwidth),
        });
    }

    for alternative in &m3u8.alternatives {
        let language = alternative
            .language
            .as_deref()
            .or(alternative.assoc_language.as_deref());
        let name = Some(alternative.name.as_str()).filter(|x| !x.is_empty());

        match alternative.media_type {
            AlternativeMediaType::Audio => manifest.audio_tracks.push(audio_track(language, name)),
            AlternativeMediaType::Subtitles => {
                if let Some(track) = alternative
                    .uri
                    .as_deref()
                    .and_then(|x| subtitle_track(x, language, name, base_url))
                {
                    manifest.subtitles.push(track);
                }
            }
            _ => (),
        }
    }

    manifest
}
