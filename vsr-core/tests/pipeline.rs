use std::{collections::HashMap, future::Future, sync::LazyLock, time::Duration};
use vsr_core::{
    AudioTrack, CandidateRequest, CandidateTemplate, DiagnosticCode, MediaReference, MediaType,
    Outcome, Pipeline, ProfileRegistry, Quality, RawResponse, Severity, SiteProfile, Stage,
    SubtitleFormat, Transport, TransportError, Url,
    cipher::{CipherProfile, KeyMaterial},
    extract::PayloadShape,
};

const KEY: &str = "0123456789abcdef0123456789abcdef";

const MASTER_1080: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080/index.m3u8
";

const MASTER_LADDER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=1280x720
720/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=20000000,RESOLUTION=3840x2160
2160/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080/index.m3u8
";

/// `jwplayer("vplayer").setup({sources:[{file:".../master.m3u8?t=xyz"}],tracks:[...]})`, packed with radix 36.
const PACKED_PLAYER: &str = r#"<script>eval(function(p,a,c,k,e,d){e=function(c){return c.toString(36)};if(!''.replace(/^/,String)){while(c--){d[c.toString(a)]=k[c]||c.toString(a)}k=[function(e){return d[e]}];e=function(){return'\\w+'};c=1};while(c--){if(k[c]){p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c])}}return p}('0("1").2({3:[{4:"5://6.7/8/9/a/b.c?d=e"}],f:[{4:"5://6.7/g.h",i:"j",k:"l"},{4:"/m?n=o",k:"p"}],q:"r"});',36,28,'jwplayer|vplayer|setup|sources|file|https|edge|test|hls2|01|abc|master|m3u8|t|xyz|tracks|abc_eng|vtt|label|English|kind|captions|dl|op|get_slides|thumbnails|androidhls|true'.split('|')))</script>"#;

/// Wrapped `base64(iv):base64(ciphertext)` of a source map, AES-256-CBC under [`KEY`].
const CBC_SOURCE_MAP: &str = "QUFFQ0F3UUZCZ2NJQ1FvTERBME9Edz09OmJGeXh3L1crT3RlSm94RnY3MUlZbnpxVG1tZ3BjMGVFSi9XWnFpc0dYQk1LUm9oT3FVcUh2OC9vNXdMU2s4T0ZiM3k0NEdBd2NUU0M5SXJVTmo1NzdaNEhpTWJGZU5ON280WGdZT0NDNWFVMjUxWDlaU0VtUkppQWdFZTBrQld5VXJhYUErY3FGSVF3NlR0N0MwbEtoVlZDbFQzMEg4Uk1IdmhiL0huZGYyTmhpRWNoV3YrOWs1SnRTM3NNR01Fa2wvcStJQ2xJdUxncUJjMFdDMlR6RnBwS2hwOHd2R3E3Slk3bWQxTWVNMzdWVGtKbTFqMFdWcEVOelBiTXNYTDM=";

/// Plain JSON whose `url[].link` entries are each a wrapped colon envelope under [`KEY`].
const CBC_LINK_ARRAY: &str = r#"{"provider":"zee","url":[{"lang":"English","name":"Server 1","type":"hls","link":"QUFFQ0F3UUZCZ2NJQ1FvTERBME9Edz09OlcvQmpMek5qZStMREJ2WUM3aVFmeWJjbWp2aTkzRno3cDlPaXQxWnZtZnJEWkFaUklBWE12WTNGcG9HOE1xTGw="},{"lang":"Hindi","name":"Server 2","type":"hls","link":"RUJFU0V4UVZGaGNZR1JvYkhCMGVIdz09OlhGbVNKRnFEYVZzcGUyMTVXa1JXMVNoNU1SRWlDREwyNWFVSW1HRVA3K3o1M01tMWsxeU9EeHNVVEFENmQ5Tmc="}],"tracks":[{"url":"https://subs.test/en.vtt","lang":"English2"},{"url":"https://subs.test/es.vtt","lang":"Spanish"}]}"#;

/// AES-256-GCM sealed master playlist, key from PBKDF2 of `hunter2` over 10 rounds.
const GCM_MANIFEST: &str = r#"{"encrypted":"2c00fa58f922fd01d5646dc660e32faa0cf06cc995c384c1e43d90f756a7b2cae7286d5c07adaa009d325b7e1e302bffcc9f17a4750da0cfb1d88a62f4a1c2d851d29b06b930d8d05184a6ef4cd8490f06dd29af00a0dcfea0f656901a3e1c60b40406a6c4c05d302633f8af0b10cc9255597239e8da45b190e0635a3b7fff5986403640","cin":"000102030405060708090a0b","mao":"c6b5e9e2133f218140912fa20934b7e2","salt":"a1b2c3d4e5f60718"}"#;

static ENGLISH: LazyLock<AudioTrack> = LazyLock::new(|| AudioTrack {
    language_code: "eng".to_owned(),
    label: "English".to_owned(),
});

#[derive(Clone)]
enum Reply {
    Body(u16, String),
    Delayed(Duration, String),
    Redirected(String, String),
    Fail(String),
    Stall,
    Panic,
}

#[derive(Default)]
struct MockTransport {
    replies: HashMap<String, Reply>,
}

impl MockTransport {
    fn reply(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_owned(), reply);
        self
    }

    fn ok(self, url: &str, body: &str) -> Self {
        self.reply(url, Reply::Body(200, body.to_owned()))
    }
}

impl Transport for MockTransport {
    fn fetch(
        &self,
        request: &CandidateRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send {
        let reply = self.replies.get(request.url.as_str()).cloned();

        async move {
            match reply {
                Some(Reply::Body(status, body)) => Ok(RawResponse {
                    status,
                    body: body.into_bytes(),
                    url: None,
                }),
                Some(Reply::Delayed(delay, body)) => {
                    tokio::time::sleep(delay).await;
                    Ok(RawResponse::ok(body))
                }
                Some(Reply::Redirected(url, body)) => Ok(RawResponse {
                    url: Some(Url::parse(&url).unwrap()),
                    ..RawResponse::ok(body)
                }),
                Some(Reply::Fail(e)) => Err(TransportError::Request(e)),
                Some(Reply::Stall) => std::future::pending().await,
                Some(Reply::Panic) => panic!("transport blew up"),
                None => Err(TransportError::Status { status: 404 }),
            }
        }
    }
}

fn manifest_profile(name: &str) -> SiteProfile {
    SiteProfile {
        default_audio: Some(ENGLISH.clone()),
        ..SiteProfile::new(name)
    }
}

fn template(profile: &str, url: &str) -> CandidateTemplate {
    CandidateTemplate::new(profile).movie(url)
}

fn pipeline(transport: MockTransport, profiles: Vec<SiteProfile>) -> Pipeline<MockTransport> {
    Pipeline::new(transport, profiles.into_iter().collect::<ProfileRegistry>())
}

fn done(outcome: Outcome) -> vsr_core::ResolutionResult {
    assert_eq!(outcome.stage(), Stage::Done);
    outcome.into_result()
}

#[tokio::test]
async fn every_candidate_fails_transport() {
    let transport = MockTransport::default()
        .reply("https://a.test/550", Reply::Body(503, String::new()))
        .reply("https://b.test/550", Reply::Fail("connection reset".to_owned()));

    let result = done(
        pipeline(transport, vec![manifest_profile("a"), manifest_profile("b")])
            .resolve(
                &MediaReference::movie("550"),
                &[
                    template("a", "https://a.test/{id}"),
                    template("b", "https://b.test/{id}"),
                ],
            )
            .await,
    );

    assert!(result.sources.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::ProviderError);
    assert_eq!(result.diagnostics[0].severity, Severity::Error);
    assert!(result.diagnostics[0].message.contains("HTTP 503"));
    assert!(result.diagnostics[0].message.contains("connection reset"));
}

#[tokio::test]
async fn fetched_but_nothing_decodes() {
    let packed = SiteProfile {
        script_packed: true,
        shape: PayloadShape::PackedPlayer,
        ..SiteProfile::new("packed")
    };
    let transport = MockTransport::default()
        .ok("https://a.test/550", "<html>video removed</html>")
        .reply("https://b.test/550", Reply::Body(500, String::new()));

    let result = done(
        pipeline(transport, vec![packed, manifest_profile("b")])
            .resolve(
                &MediaReference::movie("550"),
                &[
                    template("packed", "https://a.test/{id}"),
                    template("b", "https://b.test/{id}"),
                ],
            )
            .await,
    );

    assert!(result.sources.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::PartialScrape);
    assert!(result.diagnostics[0].message.contains("signature"));
}

#[tokio::test(start_paused = true)]
async fn duplicate_sources_keep_submission_order() {
    // The first candidate settles last and still wins the tie.
    let transport = MockTransport::default()
        .reply(
            "https://a.test/550",
            Reply::Delayed(Duration::from_secs(3), MASTER_1080.to_owned()),
        )
        .ok("https://b.test/550", MASTER_1080);

    let result = done(
        pipeline(transport, vec![manifest_profile("a"), manifest_profile("b")])
            .resolve(
                &MediaReference::movie("550"),
                &[
                    template("a", "https://a.test/{id}"),
                    template("b", "https://b.test/{id}"),
                ],
            )
            .await,
    );

    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].url, "https://a.test/1080/index.m3u8");
    assert_eq!(result.sources[0].quality, Quality::P1080);
    assert_eq!(result.sources[0].language(), Some("eng"));
    assert!(result.diagnostics.is_empty());
}

#[tokio::test]
async fn sources_ranked_by_quality() {
    let transport = MockTransport::default().ok("https://a.test/550", MASTER_LADDER);

    let result = done(
        pipeline(transport, vec![manifest_profile("a")])
            .resolve(&MediaReference::movie("550"), &[template("a", "https://a.test/{id}")])
            .await,
    );

    assert_eq!(
        result
            .sources
            .iter()
            .map(|x| x.quality.to_string())
            .collect::<Vec<_>>(),
        vec!["4K", "1080p", "720p"]
    );
    assert!(result.sources.iter().all(|x| x.media_type == MediaType::Hls));
}

#[tokio::test]
async fn invalid_reference_fails_without_requests() {
    let outcome = pipeline(MockTransport::default(), vec![manifest_profile("a")])
        .resolve(&MediaReference::movie(" "), &[template("a", "https://a.test/{id}")])
        .await;

    assert_eq!(outcome.stage(), Stage::Failed);
    let result = outcome.into_result();
    assert!(result.sources.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.diagnostics[0].message.contains("invalid media reference"));
}

#[tokio::test]
async fn no_usable_templates() {
    let outcome = pipeline(MockTransport::default(), vec![manifest_profile("a")])
        .resolve(
            &MediaReference::episode("1399", 1, 1),
            &[
                template("a", "https://a.test/{id}"),
                template("missing", "https://b.test/{id}"),
            ],
        )
        .await;

    assert_eq!(outcome.stage(), Stage::Failed);
    assert!(outcome.result().diagnostics[0].message.contains("no candidate"));
}

#[tokio::test(start_paused = true)]
async fn stalled_candidate_times_out() {
    let transport = MockTransport::default()
        .reply("https://a.test/550", Reply::Stall)
        .ok("https://b.test/550", MASTER_1080);

    let pipeline = pipeline(transport, vec![manifest_profile("a"), manifest_profile("b")])
        .with_timeout(Duration::from_secs(2));
    let result = done(
        pipeline
            .resolve(
                &MediaReference::movie("550"),
                &[
                    template("a", "https://a.test/{id}"),
                    template("b", "https://b.test/{id}"),
                ],
            )
            .await,
    );

    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].url, "https://b.test/1080/index.m3u8");
}

#[tokio::test(start_paused = true)]
async fn all_candidates_stall() {
    let transport = MockTransport::default().reply("https://a.test/550", Reply::Stall);

    let result = done(
        pipeline(transport, vec![manifest_profile("a")])
            .with_timeout(Duration::from_secs(2))
            .resolve(&MediaReference::movie("550"), &[template("a", "https://a.test/{id}")])
            .await,
    );

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::ProviderError);
    assert!(result.diagnostics[0].message.contains("no response within 2s"));
}

#[tokio::test]
async fn panicking_candidate_is_dropped() {
    let transport = MockTransport::default()
        .reply("https://a.test/550", Reply::Panic)
        .ok("https://b.test/550", MASTER_1080);

    let result = done(
        pipeline(transport, vec![manifest_profile("a"), manifest_profile("b")])
            .resolve(
                &MediaReference::movie("550"),
                &[
                    template("a", "https://a.test/{id}"),
                    template("b", "https://b.test/{id}"),
                ],
            )
            .await,
    );

    assert_eq!(result.sources.len(), 1);
    assert!(result.diagnostics.is_empty());
}

#[tokio::test]
async fn packed_player_with_captions() {
    let profile = SiteProfile {
        script_packed: true,
        shape: PayloadShape::PackedPlayer,
        default_audio: Some(ENGLISH.clone()),
        ..SiteProfile::new("packed")
    };
    let transport = MockTransport::default().ok("https://embed.test/e/550", PACKED_PLAYER);

    let result = done(
        pipeline(transport, vec![profile])
            .resolve(
                &MediaReference::movie("550"),
                &[template("packed", "https://embed.test/e/{id}")],
            )
            .await,
    );

    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].url, "https://edge.test/hls2/01/abc/master.m3u8?t=xyz");
    assert_eq!(result.sources[0].media_type, MediaType::Hls);
    assert_eq!(result.sources[0].quality, Quality::Unknown);

    assert_eq!(result.subtitles.len(), 1);
    assert_eq!(result.subtitles[0].url, "https://edge.test/abc_eng.vtt");
    assert_eq!(result.subtitles[0].label, "English");
    assert_eq!(result.subtitles[0].format, SubtitleFormat::Vtt);

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::QualityInferred);
    assert_eq!(result.diagnostics[0].severity, Severity::Info);
}

#[tokio::test]
async fn encrypted_source_map() {
    let profile = SiteProfile {
        cipher: serde_json::from_str(
            r#"{"profile":"static_cbc","envelope":{"format":"colon_base64","wrapped":true}}"#,
        )
        .unwrap(),
        key: KeyMaterial::from_text(KEY),
        shape: PayloadShape::SourceMap { field: None },
        ..SiteProfile::new("cbc")
    };
    let transport = MockTransport::default().ok("https://api.test/sources/550", CBC_SOURCE_MAP);

    let result = done(
        pipeline(transport, vec![profile])
            .resolve(
                &MediaReference::movie("550"),
                &[template("cbc", "https://api.test/sources/{id}")],
            )
            .await,
    );

    assert_eq!(result.sources.len(), 2);
    assert_eq!(result.sources[0].url, "https://cdn.test/alpha/index.m3u8");
    assert_eq!(result.sources[0].quality, Quality::P1080);
    assert_eq!(result.sources[0].audio_tracks, vec![ENGLISH.clone()]);
    assert_eq!(result.sources[1].language(), Some("ita"));
    assert_eq!(result.sources[1].quality, Quality::P720);
    assert!(result.diagnostics.is_empty());
}

#[tokio::test]
async fn encrypted_link_entries() {
    let profile = SiteProfile {
        cipher: serde_json::from_str(
            r#"{"profile":"static_cbc","envelope":{"format":"colon_base64","wrapped":true},"each":{"pointer":"/url","field":"link"}}"#,
        )
        .unwrap(),
        key: KeyMaterial::from_text(KEY),
        shape: serde_json::from_str(r#"{"kind":"link_array","pointer":"/url","tracks":"/tracks"}"#).unwrap(),
        ..SiteProfile::new("zee")
    };
    let transport = MockTransport::default().ok("https://api.test/server?id=550", CBC_LINK_ARRAY);

    let result = done(
        pipeline(transport, vec![profile])
            .resolve(
                &MediaReference::movie("550"),
                &[template("zee", "https://api.test/server?id={id}")],
            )
            .await,
    );

    assert_eq!(result.sources.len(), 2);
    assert_eq!(result.sources[0].url, "https://cdn.test/zee/master_1080p.m3u8");
    assert_eq!(result.sources[0].quality, Quality::P1080);
    assert_eq!(result.sources[0].media_type, MediaType::Hls);
    assert_eq!(result.sources[0].language(), Some("eng"));
    assert_eq!(result.sources[1].url, "https://cdn.test/zee/master_720p.m3u8");
    assert_eq!(result.sources[1].language(), Some("hin"));

    let subtitles = result
        .subtitles
        .iter()
        .map(|x| (x.url.as_str(), x.label.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        subtitles,
        vec![
            ("https://subs.test/en.vtt", "English"),
            ("https://subs.test/es.vtt", "Spanish"),
        ]
    );

    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::QualityInferred);
}

#[tokio::test]
async fn rotated_key_is_a_decode_failure() {
    let profile = SiteProfile {
        cipher: serde_json::from_str(
            r#"{"profile":"static_cbc","envelope":{"format":"colon_base64","wrapped":true}}"#,
        )
        .unwrap(),
        key: KeyMaterial::from_text("fedcba9876543210fedcba9876543210"),
        shape: PayloadShape::SourceMap { field: None },
        ..SiteProfile::new("cbc")
    };
    let transport = MockTransport::default().ok("https://api.test/sources/550", CBC_SOURCE_MAP);

    let result = done(
        pipeline(transport, vec![profile])
            .resolve(
                &MediaReference::movie("550"),
                &[template("cbc", "https://api.test/sources/{id}")],
            )
            .await,
    );

    assert!(result.sources.is_empty());
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::PartialScrape);
    assert!(result.diagnostics[0].message.contains("decode"));
}

#[tokio::test]
async fn password_sealed_manifest() {
    let profile = SiteProfile {
        cipher: serde_json::from_str(r#"{"profile":"password_gcm","rounds":10}"#).unwrap(),
        key: KeyMaterial::from_text("hunter2"),
        ..SiteProfile::new("gcm")
    };
    let transport = MockTransport::default().ok("https://api.test/gcm/550", GCM_MANIFEST);

    let result = done(
        pipeline(transport, vec![profile])
            .resolve(
                &MediaReference::movie("550"),
                &[template("gcm", "https://api.test/gcm/{id}")],
            )
            .await,
    );

    assert!(matches!(
        serde_json::from_str::<CipherProfile>(r#"{"profile":"password_gcm"}"#),
        Ok(CipherProfile::PasswordGcm(_))
    ));

    assert_eq!(
        result.sources.iter().map(|x| x.url.as_str()).collect::<Vec<_>>(),
        vec!["https://api.test/gcm/1080/index.m3u8", "https://api.test/gcm/low/index.m3u8"]
    );
    assert_eq!(result.sources[1].quality, Quality::Unknown);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::QualityInferred);
    assert!(result.diagnostics[0].message.contains("1 source(s)"));
}

#[tokio::test]
async fn token_url_and_redirect_base() {
    let transport = MockTransport::default().reply(
        "https://api.test/t/gFaVqU3BsotYnytY5FPj8A",
        Reply::Redirected("https://cdn.test/v/master.m3u8".to_owned(), MASTER_1080.to_owned()),
    );
    let profile = SiteProfile {
        key: KeyMaterial::from_text(KEY),
        ..manifest_profile("token")
    };

    let result = done(
        pipeline(transport, vec![profile])
            .resolve(
                &MediaReference::movie("550"),
                &[template("token", "https://api.test/t/{token}")],
            )
            .await,
    );

    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].url, "https://cdn.test/v/1080/index.m3u8");
}

#[tokio::test]
async fn episode_templates() {
    let transport = MockTransport::default().ok("https://a.test/tv/1399/2/5", MASTER_1080);

    let result = done(
        pipeline(transport, vec![manifest_profile("a")])
            .resolve(
                &MediaReference::episode("1399", 2, 5),
                &[CandidateTemplate::new("a")
                    .movie("https://a.test/movie/{id}")
                    .episode("https://a.test/{kind}/{id}/{season}/{episode}")],
            )
            .await,
    );

    assert_eq!(result.sources[0].url, "https://a.test/tv/1399/2/1080/index.m3u8");
}
