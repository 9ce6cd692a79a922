use crate::error::DecodeError;
use aes_gcm::{
    Aes256Gcm, AesGcm,
    aead::{Aead, KeyInit, consts::U16, generic_array::GenericArray},
    aes::Aes256,
};
use sha2::Sha256;

pub const PBKDF2_ROUNDS: u32 = 100_000;

const TAG_LEN: usize = 16;

/// AES-256-GCM with a 16 byte nonce, used by hosts that reuse a CBC sized iv.
type Aes256GcmWide = AesGcm<Aes256, U16>;

pub fn derive_key(password: &[u8], salt: &[u8], rounds: u32) -> [u8; 32] {
    let mut key = [0; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, rounds, &mut key);
    key
}

/// Verify and open `ciphertext` with its detached `tag`.
pub fn decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if tag.len() != TAG_LEN {
        return Err(DecodeError::BadEnvelope(format!(
            "auth tag must be {} bytes, found {}",
            TAG_LEN,
            tag.len()
        )));
    }

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    match iv.len() {
        12 => open_with::<Aes256Gcm>(key, iv, &sealed),
        16 => open_with::<Aes256GcmWide>(key, iv, &sealed),
        x => Err(DecodeError::BadEnvelope(format!(
            "gcm iv must be 12 or 16 bytes, found {}",
            x
        ))),
    }
}

fn open_with<C: Aead + KeyInit>(key: &[u8], iv: &[u8], sealed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    C::new_from_slice(key)
        .map_err(|x| DecodeError::CipherFailure(x.to_string()))?
        .decrypt(GenericArray::from_slice(iv), sealed)
        .map_err(|_| DecodeError::AuthTagMismatch)
}

#[cfg(test)]
pub(super) fn seal(key: &[u8], iv: &[u8], plaintext: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut sealed = match iv.len() {
        12 => Aes256Gcm::new_from_slice(key)
            .unwrap()
            .encrypt(GenericArray::from_slice(iv), plaintext)
            .unwrap(),
        _ => Aes256GcmWide::new_from_slice(key)
            .unwrap()
            .encrypt(GenericArray::from_slice(iv), plaintext)
            .unwrap(),
    };

    let tag = sealed.split_off(sealed.len() - TAG_LEN);
    (sealed, tag)
}
