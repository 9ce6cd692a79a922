use crate::{
    cipher::{CipherProfile, KeyMaterial},
    error::DecodeError,
    extract::PayloadShape,
    manifest::ManifestFormat,
    model::AudioTrack,
    unpack,
};
use std::{collections::HashMap, sync::Arc};

/// Everything needed to turn one host's responses into sources.
#[derive(Debug, Clone, Default)]
pub struct SiteProfile {
    pub name: String,
    pub cipher: CipherProfile,
    pub key: KeyMaterial,
    pub script_packed: bool,
    pub manifest_format: ManifestFormat,
    pub shape: PayloadShape,
    /// Attached to sources of candidates that declare no audio tracks.
    pub default_audio: Option<AudioTrack>,
}

impl SiteProfile {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Unpack and/or decrypt a raw body as configured.
    pub fn decode(&self, body: &str) -> Result<String, DecodeError> {
        let text = if self.script_packed {
            if !unpack::detect(body) {
                return Err(DecodeError::BadSignature);
            }

            unpack::unpack(body).ok_or(DecodeError::BadSignature)?
        } else {
            body.to_owned()
        };

        self.cipher.decrypt(&text, &self.key)
    }
}

/// Site profiles by name.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<SiteProfile>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any profile registered under the same name.
    pub fn insert(&mut self, profile: SiteProfile) {
        self.profiles.insert(profile.name.clone(), Arc::new(profile));
    }

    pub fn get(&self, name: &str) -> Option<Arc<SiteProfile>> {
        self.profiles.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl FromIterator<SiteProfile> for ProfileRegistry {
    fn from_iter<I: IntoIterator<Item = SiteProfile>>(iter: I) -> Self {
        let mut registry = Self::new();

        for profile in iter {
            registry.insert(profile);
        }

        registry
    }
}
