use crate::error::DecodeError;
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD},
};
use serde::Deserialize;
use serde_json::Value;

/// Encrypted bytes plus the parameters needed to open them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub iv: Option<Vec<u8>>,
    pub ciphertext: Vec<u8>,
    pub auth_tag: Option<Vec<u8>>,
    pub salt: Option<Vec<u8>>,
}

/// Splits a raw payload into an [`EncryptedEnvelope`].
pub trait EnvelopeCodec {
    fn open(&self, payload: &str) -> Result<EncryptedEnvelope, DecodeError>;
}

/// Known wire shapes. `pointer` is a JSON pointer to the envelope inside a
/// JSON payload, the whole payload is used when it is absent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum EnvelopeFormat {
    /// `base64(iv):base64(ciphertext)`, optionally base64 encoded as a whole.
    ColonBase64 {
        #[serde(default)]
        wrapped: bool,
        #[serde(default)]
        pointer: Option<String>,
    },
    /// Bare base64 ciphertext, the iv is never transmitted.
    Base64 {
        #[serde(default)]
        pointer: Option<String>,
    },
    /// JSON object with hex encoded fields.
    HexFields {
        #[serde(default = "default_ciphertext_field")]
        ciphertext: String,
        #[serde(default = "default_iv_field")]
        iv: String,
        #[serde(default = "default_tag_field")]
        tag: String,
        #[serde(default = "default_salt_field")]
        salt: String,
        #[serde(default)]
        pointer: Option<String>,
    },
}

fn default_ciphertext_field() -> String {
    "encrypted".to_owned()
}

fn default_iv_field() -> String {
    "cin".to_owned()
}

fn default_tag_field() -> String {
    "mao".to_owned()
}

fn default_salt_field() -> String {
    "salt".to_owned()
}

impl EnvelopeFormat {
    pub fn hex_fields() -> Self {
        Self::HexFields {
            ciphertext: default_ciphertext_field(),
            iv: default_iv_field(),
            tag: default_tag_field(),
            salt: default_salt_field(),
            pointer: None,
        }
    }
}

impl EnvelopeCodec for EnvelopeFormat {
    fn open(&self, payload: &str) -> Result<EncryptedEnvelope, DecodeError> {
        match self {
            Self::ColonBase64 { wrapped, pointer } => {
                let text = locate_text(payload, pointer.as_deref())?;
                let text = if *wrapped {
                    String::from_utf8(decode_base64(&text)?)
                        .map_err(|_| DecodeError::BadEnvelope("wrapped envelope is not text".to_owned()))?
                } else {
                    text
                };

                let segments = text.trim().split(':').collect::<Vec<_>>();

                if segments.len() != 2 || segments.iter().any(|x| x.is_empty()) {
                    return Err(DecodeError::BadEnvelope(format!(
                        "expected 2 non-empty segments, found {}",
                        segments.len()
                    )));
                }

                Ok(EncryptedEnvelope {
                    iv: Some(decode_base64(segments[0])?),
                    ciphertext: decode_base64(segments[1])?,
                    ..Default::default()
                })
            }
            Self::Base64 { pointer } => {
                let text = locate_text(payload, pointer.as_deref())?;

                Ok(EncryptedEnvelope {
                    ciphertext: decode_base64(&text)?,
                    ..Default::default()
                })
            }
            Self::HexFields {
                ciphertext,
                iv,
                tag,
                salt,
                pointer,
            } => {
                let root = serde_json::from_str::<Value>(payload)
                    .map_err(|x| DecodeError::BadEnvelope(x.to_string()))?;
                let object = match pointer {
                    Some(pointer) => root.pointer(pointer).ok_or_else(|| {
                        DecodeError::BadEnvelope(format!("nothing at json pointer {}", pointer))
                    })?,
                    None => &root,
                };

                let field = |name: &str| -> Result<Vec<u8>, DecodeError> {
                    let value = object.get(name).and_then(|x| x.as_str()).ok_or_else(|| {
                        DecodeError::BadEnvelope(format!("missing hex field '{}'", name))
                    })?;

                    hex::decode(value.trim())
                        .map_err(|x| DecodeError::BadEnvelope(format!("field '{}': {}", name, x)))
                };

                Ok(EncryptedEnvelope {
                    iv: Some(field(iv)?),
                    ciphertext: field(ciphertext)?,
                    auth_tag: Some(field(tag)?),
                    salt: Some(field(salt)?),
                })
            }
        }
    }
}

/// Payload that is plain JSON with an envelope in every element of one array:
/// the string under `field` of each element at `pointer` is opened on its own
/// and replaced by its plaintext. Elements without that string are left alone.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EachEntry {
    pub pointer: String,
    pub field: String,
}

impl EachEntry {
    /// Re-serialized payload with every envelope opened. Any failure fails the
    /// whole payload.
    pub fn open_each<F>(&self, payload: &str, mut open: F) -> Result<String, DecodeError>
    where
        F: FnMut(&str) -> Result<String, DecodeError>,
    {
        let mut root = serde_json::from_str::<Value>(payload.trim())
            .map_err(|x| DecodeError::BadEnvelope(x.to_string()))?;

        let entries = root
            .pointer_mut(&self.pointer)
            .and_then(|x| x.as_array_mut())
            .ok_or_else(|| {
                DecodeError::BadEnvelope(format!("no array at json pointer {}", self.pointer))
            })?;

        let mut opened = 0;

        for entry in entries.iter_mut() {
            let Some(value) = entry.get_mut(self.field.as_str()) else {
                continue;
            };

            let Some(text) = value.as_str() else {
                continue;
            };

            let plaintext = open(text)?;
            *value = Value::String(plaintext);
            opened += 1;
        }

        if opened == 0 {
            return Err(DecodeError::BadEnvelope(format!(
                "no '{}' strings under {}",
                self.field, self.pointer
            )));
        }

        Ok(root.to_string())
    }
}

/// The envelope string, either the payload itself (a JSON string literal is
/// unquoted) or the string found at `pointer`.
fn locate_text(payload: &str, pointer: Option<&str>) -> Result<String, DecodeError> {
    let payload = payload.trim();

    match pointer {
        Some(pointer) => {
            let root = serde_json::from_str::<Value>(payload)
                .map_err(|x| DecodeError::BadEnvelope(x.to_string()))?;

            root.pointer(pointer)
                .and_then(|x| x.as_str())
                .map(|x| x.to_owned())
                .ok_or_else(|| {
                    DecodeError::BadEnvelope(format!("no string at json pointer {}", pointer))
                })
        }
        None if payload.starts_with('"') => serde_json::from_str::<String>(payload)
            .map_err(|x| DecodeError::BadEnvelope(x.to_string())),
        None => Ok(payload.to_owned()),
    }
}

/// Standard or url-safe alphabet, padding optional.
pub(crate) fn decode_base64(text: &str) -> Result<Vec<u8>, DecodeError> {
    let text = text.trim();

    let decoded = if text.contains(['-', '_']) {
        URL_SAFE_NO_PAD.decode(text.trim_end_matches('='))
    } else if text.ends_with('=') {
        STANDARD.decode(text)
    } else {
        STANDARD_NO_PAD.decode(text)
    };

    decoded.map_err(|x| DecodeError::BadEnvelope(format!("base64: {}", x)))
}
