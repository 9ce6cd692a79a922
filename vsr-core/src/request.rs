//! Candidate requests and the transport seam.

use crate::{
    cipher::{self, KeyMaterial},
    error::{CandidateError, DecodeError, TransportError},
    model::{MediaKind, MediaReference},
};
use serde::Deserialize;
use std::{collections::BTreeMap, future::Future};
use url::Url;

/// One upstream call attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRequest {
    /// Submission order, used to break ties between duplicate sources.
    pub index: usize,
    pub profile: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

/// Site specific url templates, rendered once per [`MediaReference`].
///
/// Supported placeholders are `{id}`, `{season}`, `{episode}`, `{kind}` and
/// `{token}`, the item id encrypted with the profile key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CandidateTemplate {
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub movie: Option<String>,
    #[serde(default)]
    pub episode: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl CandidateTemplate {
    pub fn new<T: Into<String>>(profile: T) -> Self {
        Self {
            profile: profile.into(),
            ..Default::default()
        }
    }

    pub fn movie<T: Into<String>>(mut self, template: T) -> Self {
        self.movie = Some(template.into());
        self
    }

    pub fn episode<T: Into<String>>(mut self, template: T) -> Self {
        self.episode = Some(template.into());
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// `Ok(None)` when this template has no url for the reference kind.
    pub fn render(
        &self,
        index: usize,
        reference: &MediaReference,
        key: &KeyMaterial,
    ) -> Result<Option<CandidateRequest>, CandidateError> {
        let template = match reference.kind {
            MediaKind::Movie => self.movie.as_deref(),
            MediaKind::Episode => self.episode.as_deref(),
        };

        let Some(template) = template else {
            return Ok(None);
        };

        let mut url = template
            .replace("{id}", &reference.external_id)
            .replace("{kind}", &reference.kind.to_string());

        if let (Some(season), Some(episode)) = (reference.season, reference.episode) {
            url = url
                .replace("{season}", &season.to_string())
                .replace("{episode}", &episode.to_string());
        }

        if url.contains("{token}") {
            let token = cipher::encrypt_token(key, &reference.item_id()).map_err(|x| match x {
                DecodeError::MissingKey => {
                    CandidateError::Template("{token} needs key material".to_owned())
                }
                x => CandidateError::Decode(x),
            })?;
            url = url.replace("{token}", &token);
        }

        let url = Url::parse(&url).map_err(|x| CandidateError::Template(format!("{} ({})", x, url)))?;

        Ok(Some(CandidateRequest {
            index,
            profile: self.profile.clone(),
            url,
            headers: self
                .headers
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        }))
    }
}

/// Overlay `overrides` on `defaults`. Header names compare case-insensitively
/// and the override keeps its own spelling.
pub fn merge_headers(
    defaults: &[(String, String)],
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = defaults
        .iter()
        .filter(|(k, _)| !overrides.keys().any(|x| x.eq_ignore_ascii_case(k)))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect::<BTreeMap<_, _>>();

    merged.extend(overrides.iter().map(|(k, v)| (k.to_owned(), v.to_owned())));
    merged
}

/// Response of one candidate request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Final url after redirects, if the transport knows it.
    pub url: Option<Url>,
}

impl RawResponse {
    pub fn ok<T: Into<Vec<u8>>>(body: T) -> Self {
        Self {
            status: 200,
            body: body.into(),
            url: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> Result<&str, DecodeError> {
        std::str::from_utf8(&self.body).map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// Issues candidate requests. Implemented outside this crate over a real
/// http client, or in memory for tests.
pub trait Transport: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &CandidateRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_movie_and_episode() {
        let template = CandidateTemplate::new("site")
            .movie("https://api.test/{kind}/{id}")
            .episode("https://api.test/{kind}/{id}/{season}/{episode}")
            .header("Referer", "https://site.test/");

        let request = template
            .render(0, &MediaReference::movie("550"), &KeyMaterial::default())
            .unwrap()
            .unwrap();
        assert_eq!(request.url.as_str(), "https://api.test/movie/550");
        assert_eq!(
            request.headers,
            vec![("Referer".to_owned(), "https://site.test/".to_owned())]
        );

        let request = template
            .render(3, &MediaReference::episode("1399", 2, 7), &KeyMaterial::default())
            .unwrap()
            .unwrap();
        assert_eq!(request.url.as_str(), "https://api.test/tv/1399/2/7");
        assert_eq!(request.index, 3);
        assert_eq!(request.profile, "site");
    }

    #[test]
    fn missing_kind_is_skipped() {
        let template = CandidateTemplate::new("site").movie("https://api.test/{id}");
        assert_eq!(
            template.render(0, &MediaReference::episode("1", 1, 1), &KeyMaterial::default()),
            Ok(None)
        );
    }

    #[test]
    fn token_placeholder() {
        let template = CandidateTemplate::new("site").movie("https://api.test/m/{token}");
        let key = KeyMaterial::from_text("0123456789abcdef0123456789abcdef");

        let request = template
            .render(0, &MediaReference::movie("550"), &key)
            .unwrap()
            .unwrap();
        let token = request.url.path().trim_start_matches("/m/").to_owned();
        assert_eq!(token, cipher::encrypt_token(&key, "550").unwrap());

        assert!(matches!(
            template.render(0, &MediaReference::movie("550"), &KeyMaterial::default()),
            Err(CandidateError::Template(_))
        ));
    }

    #[test]
    fn invalid_url() {
        let template = CandidateTemplate::new("site").movie("not a url {id}");
        assert!(matches!(
            template.render(0, &MediaReference::movie("550"), &KeyMaterial::default()),
            Err(CandidateError::Template(_))
        ));
    }

    #[test]
    fn header_merging() {
        let defaults = vec![
            ("User-Agent".to_owned(), "vsr".to_owned()),
            ("referer".to_owned(), "https://default.test/".to_owned()),
        ];
        let mut overrides = BTreeMap::new();
        overrides.insert("Referer".to_owned(), "https://site.test/".to_owned());

        let merged = merge_headers(&defaults, &overrides);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["User-Agent"], "vsr");
        assert_eq!(merged["Referer"], "https://site.test/");
        assert!(!merged.contains_key("referer"));
    }

    #[test]
    fn response_status_and_text() {
        assert!(RawResponse::ok("x").is_success());
        assert!(
            !RawResponse {
                status: 404,
                ..Default::default()
            }
            .is_success()
        );
        assert_eq!(RawResponse::ok(vec![0xff]).text(), Err(DecodeError::InvalidUtf8));
    }
}
