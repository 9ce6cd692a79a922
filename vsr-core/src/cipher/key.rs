use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::{collections::HashMap, fmt};

/// Secret bytes for one site. Never printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    pub fn new<T: Into<Vec<u8>>>(bytes: T) -> Self {
        Self(bytes.into())
    }

    pub fn from_text(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }

    pub fn from_hex(text: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(text.trim())?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial({} bytes)", self.0.len())
    }
}

/// How the block cipher key is obtained from the configured material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDerivation {
    /// Material bytes are the key.
    #[default]
    Raw,
    /// SHA-256 digest of the material, always a 32 byte key.
    Sha256,
}

impl KeyDerivation {
    pub fn derive(&self, material: &KeyMaterial) -> Vec<u8> {
        match self {
            Self::Raw => material.as_bytes().to_vec(),
            Self::Sha256 => Sha256::digest(material.as_bytes()).to_vec(),
        }
    }
}

/// Where the CBC initialisation vector comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IvSource {
    /// Sent next to the ciphertext inside the envelope.
    #[default]
    Transmitted,
    /// First 16 bytes of the key material.
    KeyPrefix,
}

/// Lookup of named secrets, so key material stays out of configuration files.
pub trait SecretStore {
    fn secret(&self, name: &str) -> Option<KeyMaterial>;
}

impl SecretStore for HashMap<String, KeyMaterial> {
    fn secret(&self, name: &str) -> Option<KeyMaterial> {
        self.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_bytes() {
        let key = KeyMaterial::from_text("hunter2");
        assert_eq!(format!("{:?}", key), "KeyMaterial(7 bytes)");
    }

    #[test]
    fn derivations() {
        let key = KeyMaterial::from_text("abc");
        assert_eq!(KeyDerivation::Raw.derive(&key), b"abc");
        assert_eq!(
            hex::encode(KeyDerivation::Sha256.derive(&key)),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn map_store() {
        let mut store = HashMap::new();
        store.insert("site".to_owned(), KeyMaterial::from_hex("00ff").unwrap());
        assert_eq!(store.secret("site").unwrap().as_bytes(), &[0, 255]);
        assert!(store.secret("other").is_none());
    }
}
