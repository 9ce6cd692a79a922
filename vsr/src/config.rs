use anyhow::{Context, Result, anyhow};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path};
use vsr_core::{
    AudioTrack, CandidateTemplate, ProfileRegistry, SiteProfile,
    cipher::{CipherProfile, KeyMaterial, SecretStore},
    extract::PayloadShape,
    manifest::ManifestFormat,
    merge_headers,
};

/// Site profiles and their candidate urls, read from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub sites: Vec<Site>,
}

fn default_timeout() -> u64 {
    vsr_core::DEFAULT_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Site {
    pub name: String,
    #[serde(default)]
    pub cipher: CipherProfile,
    #[serde(default)]
    pub key: Option<KeySource>,
    #[serde(default)]
    pub script_packed: bool,
    #[serde(default)]
    pub manifest_format: ManifestFormat,
    #[serde(default)]
    pub shape: PayloadShape,
    #[serde(default)]
    pub audio: Option<AudioTrack>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub movie: Option<String>,
    #[serde(default)]
    pub episode: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Where a site's key material comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    Env(String),
    Secret(String),
    Text(String),
    Hex(String),
    Base64(String),
}

impl KeySource {
    pub fn resolve(&self, store: &dyn SecretStore) -> Result<KeyMaterial> {
        Ok(match self {
            Self::Env(var) => KeyMaterial::from_text(
                &std::env::var(var).with_context(|| format!("environment variable {} is not set", var))?,
            ),
            Self::Secret(name) => store
                .secret(name)
                .ok_or_else(|| anyhow!("secret '{}' is not available", name))?,
            Self::Text(x) => KeyMaterial::from_text(x),
            Self::Hex(x) => KeyMaterial::from_hex(x).context("key is not valid hex")?,
            Self::Base64(x) => KeyMaterial::new(STANDARD.decode(x.trim()).context("key is not valid base64")?),
        })
    }
}

/// Secrets from `VSR_SECRET_<NAME>` environment variables.
pub struct EnvSecrets;

impl EnvSecrets {
    pub fn variable(name: &str) -> String {
        format!("VSR_SECRET_{}", name.to_uppercase().replace('-', "_"))
    }
}

impl SecretStore for EnvSecrets {
    fn secret(&self, name: &str) -> Option<KeyMaterial> {
        std::env::var(Self::variable(name))
            .ok()
            .filter(|x| !x.is_empty())
            .map(|x| KeyMaterial::from_text(&x))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the profile registry and templates, keeping only `filter` sites
    /// when it is non empty. `defaults` go under every template's own headers.
    pub fn build(
        self,
        store: &dyn SecretStore,
        filter: &[String],
        defaults: &[(String, String)],
    ) -> Result<(ProfileRegistry, Vec<CandidateTemplate>)> {
        let mut registry = ProfileRegistry::new();
        let mut templates = vec![];

        for site in self.sites {
            if !filter.is_empty() && !filter.iter().any(|x| x == &site.name) {
                continue;
            }

            let key = match &site.key {
                Some(source) => match source.resolve(store) {
                    Ok(x) => x,
                    Err(e) => {
                        // The candidates still run and report the missing key.
                        log::warn!("site '{}' has no key material: {}", site.name, e);
                        KeyMaterial::default()
                    }
                },
                None => KeyMaterial::default(),
            };

            if site.cipher.needs_key() && key.is_empty() {
                log::warn!("site '{}' decrypts payloads but no key is configured", site.name);
            }

            for candidate in site.candidates {
                templates.push(CandidateTemplate {
                    profile: site.name.clone(),
                    movie: candidate.movie,
                    episode: candidate.episode,
                    headers: merge_headers(defaults, &candidate.headers),
                });
            }

            registry.insert(SiteProfile {
                name: site.name,
                cipher: site.cipher,
                key,
                script_packed: site.script_packed,
                manifest_format: site.manifest_format,
                shape: site.shape,
                default_audio: site.audio,
            });
        }

        if registry.is_empty() {
            anyhow::bail!("no site profiles selected");
        }

        Ok((registry, templates))
    }
}
