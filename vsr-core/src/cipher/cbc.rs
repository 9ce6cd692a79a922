use crate::error::DecodeError;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// AES-CBC with PKCS7 padding, key size picked from the key length.
pub fn decrypt(key: &[u8], iv: &[u8], data: Vec<u8>) -> Result<Vec<u8>, DecodeError> {
    match key.len() {
        16 => decrypt_with::<Aes128CbcDec>(key, iv, data),
        24 => decrypt_with::<Aes192CbcDec>(key, iv, data),
        32 => decrypt_with::<Aes256CbcDec>(key, iv, data),
        x => Err(DecodeError::CipherFailure(format!(
            "unsupported aes key length {}",
            x
        ))),
    }
}

pub fn encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    match key.len() {
        16 => encrypt_with::<Aes128CbcEnc>(key, iv, data),
        24 => encrypt_with::<Aes192CbcEnc>(key, iv, data),
        32 => encrypt_with::<Aes256CbcEnc>(key, iv, data),
        x => Err(DecodeError::CipherFailure(format!(
            "unsupported aes key length {}",
            x
        ))),
    }
}

fn decrypt_with<C: KeyIvInit + BlockDecryptMut>(
    key: &[u8],
    iv: &[u8],
    mut data: Vec<u8>,
) -> Result<Vec<u8>, DecodeError> {
    let len = C::new_from_slices(key, iv)
        .map_err(|x| DecodeError::CipherFailure(x.to_string()))?
        .decrypt_padded_mut::<Pkcs7>(&mut data)
        .map_err(|x| DecodeError::CipherFailure(x.to_string()))?
        .len();

    data.truncate(len);
    Ok(data)
}

fn encrypt_with<C: KeyIvInit + BlockEncryptMut>(
    key: &[u8],
    iv: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    let mut buf = vec![0; data.len() + 16];
    buf[..data.len()].copy_from_slice(data);

    let len = C::new_from_slices(key, iv)
        .map_err(|x| DecodeError::CipherFailure(x.to_string()))?
        .encrypt_padded_mut::<Pkcs7>(&mut buf, data.len())
        .map_err(|x| DecodeError::CipherFailure(x.to_string()))?
        .len();

    buf.truncate(len);
    Ok(buf)
}
