//! Per-site payload decryption.
//!
//! Hosts either send AES-CBC ciphertext under a static key, or AES-256-GCM
//! ciphertext under a key derived from a password and a per-response salt.
//! Which one applies is declared by the site profile, payloads are never probed.

mod cbc;
mod envelope;
mod gcm;
mod key;

pub use envelope::{EachEntry, EncryptedEnvelope, EnvelopeCodec, EnvelopeFormat};
pub use gcm::PBKDF2_ROUNDS;
pub use key::{IvSource, KeyDerivation, KeyMaterial, SecretStore};

use crate::error::DecodeError;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;

const IV_LEN: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum CipherProfile {
    /// Payload is plaintext.
    #[default]
    None,
    StaticCbc(StaticCbc),
    PasswordGcm(PasswordGcm),
}

impl CipherProfile {
    pub fn needs_key(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Open `payload` and return the plaintext. Never returns partial output.
    pub fn decrypt(&self, payload: &str, key: &KeyMaterial) -> Result<String, DecodeError> {
        let plaintext = match self {
            Self::None => return Ok(payload.to_owned()),
            Self::StaticCbc(x) => match &x.each {
                Some(each) => {
                    return each.open_each(payload, |text| {
                        let plaintext = x.decrypt(&x.envelope.open(text)?, key)?;
                        let plaintext = String::from_utf8(plaintext).map_err(|_| DecodeError::InvalidUtf8)?;
                        Ok(plaintext.trim().to_owned())
                    });
                }
                None => x.decrypt(&x.envelope.open(payload)?, key)?,
            },
            Self::PasswordGcm(x) => x.decrypt(&x.envelope.open(payload)?, key)?,
        };

        log::trace!("decrypted {} bytes of plaintext", plaintext.len());
        String::from_utf8(plaintext).map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// Static passphrase, AES-CBC with PKCS7 padding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticCbc {
    #[serde(default)]
    pub derivation: KeyDerivation,
    #[serde(default)]
    pub iv: IvSource,
    pub envelope: EnvelopeFormat,
    /// Envelopes sit inside the entries of a JSON array instead of forming
    /// the payload.
    #[serde(default)]
    pub each: Option<EachEntry>,
}

impl StaticCbc {
    pub fn decrypt(&self, envelope: &EncryptedEnvelope, key: &KeyMaterial) -> Result<Vec<u8>, DecodeError> {
        if key.is_empty() {
            return Err(DecodeError::MissingKey);
        }

        let iv = match self.iv {
            IvSource::Transmitted => envelope
                .iv
                .as_deref()
                .ok_or_else(|| DecodeError::BadEnvelope("envelope carries no iv".to_owned()))?,
            IvSource::KeyPrefix => key_prefix(key)?,
        };

        cbc::decrypt(&self.derivation.derive(key), iv, envelope.ciphertext.clone())
    }
}

/// Password plus transmitted salt, PBKDF2-HMAC-SHA256 into AES-256-GCM.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PasswordGcm {
    #[serde(default = "PasswordGcm::default_rounds")]
    pub rounds: u32,
    #[serde(default = "EnvelopeFormat::hex_fields")]
    pub envelope: EnvelopeFormat,
}

impl Default for PasswordGcm {
    fn default() -> Self {
        Self {
            rounds: PBKDF2_ROUNDS,
            envelope: EnvelopeFormat::hex_fields(),
        }
    }
}

impl PasswordGcm {
    fn default_rounds() -> u32 {
        PBKDF2_ROUNDS
    }

    pub fn decrypt(&self, envelope: &EncryptedEnvelope, key: &KeyMaterial) -> Result<Vec<u8>, DecodeError> {
        if key.is_empty() {
            return Err(DecodeError::MissingKey);
        }

        let missing = |x: &str| DecodeError::BadEnvelope(format!("envelope carries no {}", x));
        let salt = envelope.salt.as_deref().ok_or_else(|| missing("salt"))?;
        let iv = envelope.iv.as_deref().ok_or_else(|| missing("iv"))?;
        let tag = envelope.auth_tag.as_deref().ok_or_else(|| missing("auth tag"))?;

        let derived = gcm::derive_key(key.as_bytes(), salt, self.rounds);
        gcm::decrypt(&derived, iv, &envelope.ciphertext, tag)
    }
}

/// Encrypt a request token the way hosts expect it in their urls: AES-CBC
/// under the raw key material with its first 16 bytes as iv, url-safe base64
/// without padding.
pub fn encrypt_token(key: &KeyMaterial, plaintext: &str) -> Result<String, DecodeError> {
    if key.is_empty() {
        return Err(DecodeError::MissingKey);
    }

    let ciphertext = cbc::encrypt(key.as_bytes(), key_prefix(key)?, plaintext.as_bytes())?;
    Ok(URL_SAFE_NO_PAD.encode(ciphertext))
}

fn key_prefix(key: &KeyMaterial) -> Result<&[u8], DecodeError> {
    key.as_bytes().get(..IV_LEN).ok_or_else(|| {
        DecodeError::CipherFailure(format!(
            "key material of {} bytes cannot supply a {} byte iv",
            key.as_bytes().len(),
            IV_LEN
        ))
    })
}
