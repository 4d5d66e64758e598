//! AES-256-CBC decryption of command files.
//!
//! Layout: a 16-byte IV followed by the ciphertext. The key is the first
//! 32 bytes of the task token.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::NoPadding};
use thiserror::Error;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;
/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Decryption error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptError {
    #[error("Token too short for a 32-byte key ({0} bytes)")]
    KeyTooShort(usize),
    #[error("Ciphertext too short ({0} bytes)")]
    TooShort(usize),
    #[error("Cipher rejected input: {0}")]
    Cipher(String),
}

/// Decrypt `data` with a key derived from `token`.
///
/// A trailing partial block is dropped before decrypting. PKCS#7 padding is
/// stripped when it is well formed; otherwise trailing NUL and whitespace
/// bytes are trimmed.
///
/// # Errors
/// Returns error if the token or ciphertext is too short.
pub fn decrypt_command_file(token: &str, data: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let key = token
        .as_bytes()
        .get(..KEY_LEN)
        .ok_or(DecryptError::KeyTooShort(token.len()))?;

    let usable = data.len() - data.len() % BLOCK_SIZE;
    if usable < 2 * BLOCK_SIZE {
        return Err(DecryptError::TooShort(data.len()));
    }
    let (iv, body) = data[..usable].split_at(BLOCK_SIZE);

    let mut buf = body.to_vec();
    let plain_len = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| DecryptError::Cipher(e.to_string()))?
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|e| DecryptError::Cipher(e.to_string()))?
        .len();
    buf.truncate(plain_len);

    let len = strip_pkcs7(&buf).unwrap_or_else(|| trim_trailing_filler(&buf));
    buf.truncate(len);
    Ok(buf)
}

fn strip_pkcs7(buf: &[u8]) -> Option<usize> {
    let pad = usize::from(*buf.last()?);
    if pad == 0 || pad > BLOCK_SIZE || pad > buf.len() {
        return None;
    }
    let (rest, tail) = buf.split_at(buf.len() - pad);
    tail.iter()
        .all(|&b| usize::from(b) == pad)
        .then_some(rest.len())
}

fn trim_trailing_filler(buf: &[u8]) -> usize {
    buf.iter()
        .rposition(|&b| b != 0 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cbc::cipher::{BlockEncryptMut, block_padding::Pkcs7};

    pub(crate) const TOKEN: &str = "0123456789abcdef0123456789abcdef-and-the-rest";
    const IV: [u8; BLOCK_SIZE] = *b"fedcba9876543210";

    pub(crate) fn encrypt(token: &str, plain: &[u8]) -> Vec<u8> {
        let key = &token.as_bytes()[..KEY_LEN];
        let mut buf = plain.to_vec();
        buf.resize(plain.len() + BLOCK_SIZE, 0);
        let ct = cbc::Encryptor::<Aes256>::new_from_slices(key, &IV)
            .unwrap()
            .encrypt_padded_mut::<Pkcs7>(&mut buf, plain.len())
            .unwrap()
            .to_vec();
        let mut out = IV.to_vec();
        out.extend(ct);
        out
    }

    #[test]
    fn test_decrypt_strips_pkcs7() {
        let plain = br#"{"command_set": []}"#;
        let data = encrypt(TOKEN, plain);
        assert_eq!(decrypt_command_file(TOKEN, &data).unwrap(), plain);
    }

    #[test]
    fn test_decrypt_ignores_trailing_partial_block() {
        let plain = b"exactly sixteen!";
        let mut data = encrypt(TOKEN, plain);
        data.extend_from_slice(b"junk");
        assert_eq!(decrypt_command_file(TOKEN, &data).unwrap(), plain);
    }

    #[test]
    fn test_short_token_rejected() {
        assert_eq!(
            decrypt_command_file("short", &[0; 32]),
            Err(DecryptError::KeyTooShort(5))
        );
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        assert_eq!(
            decrypt_command_file(TOKEN, &[0; 20]),
            Err(DecryptError::TooShort(20))
        );
    }

    #[test]
    fn test_trim_filler_when_padding_malformed() {
        assert_eq!(trim_trailing_filler(b"{}\0\0  \n"), 2);
        assert_eq!(strip_pkcs7(b"abc\x02\x03"), None);
    }
}
