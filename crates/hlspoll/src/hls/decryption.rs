// Segment decryption and the key cache feeding it.

use aes::Aes128;
use bytes::Bytes;
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use reqwest::header::HeaderMap;
use tracing::{debug, trace};
use url::Url;

use crate::HlsError;
use crate::hls::cache::{BoundedCache, CACHE_CAPACITY};
use crate::hls::fetcher::ByteFetcher;
use crate::hls::playlist::{KeyRef, resolve_uri};

type Aes128CbcDec = cbc::Decryptor<Aes128>;

const BLOCK_SIZE: usize = 16;

/// Concrete cipher transform selected from a protocol-level method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherMethod {
    /// 128-bit key AES in CBC mode with PKCS#7 padding
    Aes128Cbc,
    /// Anything else; decrypting with it fails immediately
    Unsupported(String),
}

impl CipherMethod {
    /// `AES-128` is the HLS name for AES-128-CBC. Concrete transform names
    /// are accepted as-is.
    pub fn from_name(name: &str) -> Self {
        if name == "AES-128" || name.eq_ignore_ascii_case("aes-128-cbc") {
            Self::Aes128Cbc
        } else {
            Self::Unsupported(name.to_string())
        }
    }
}

/// Decrypts one segment body.
///
/// After unpadding, the first plaintext byte is dropped, and when the
/// plaintext length is not block aligned its trailing `len % 16` bytes are
/// dropped too. Output must match this framing byte for byte.
pub fn decrypt(
    ciphertext: &[u8],
    method: &CipherMethod,
    key: &[u8],
    iv: &[u8],
) -> Result<Bytes, HlsError> {
    let plaintext = match method {
        CipherMethod::Aes128Cbc => aes128_cbc_decrypt(ciphertext, key, iv)?,
        CipherMethod::Unsupported(name) => {
            return Err(HlsError::UnsupportedCipher {
                method: name.clone(),
            });
        }
    };
    Ok(trim_plaintext(Bytes::from(plaintext)))
}

fn aes128_cbc_decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, HlsError> {
    let cipher = Aes128CbcDec::new_from_slices(key, iv).map_err(|e| {
        HlsError::decryption(format!(
            "Failed to initialize AES decryptor (key {} bytes, iv {} bytes): {e}",
            key.len(),
            iv.len()
        ))
    })?;

    let mut buffer = ciphertext.to_vec();
    let decrypted_len = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|e| HlsError::decryption(format!("Decryption failed: {e}")))?
        .len();
    buffer.truncate(decrypted_len);
    Ok(buffer)
}

fn trim_plaintext(plaintext: Bytes) -> Bytes {
    let len = plaintext.len();
    let end = len - len % BLOCK_SIZE;
    if end <= 1 {
        return Bytes::new();
    }
    plaintext.slice(1..end)
}

/// IV used when a key carries no explicit one: the decimal digits of the
/// sequence number, left-padded with zero bytes to 16. Sequence numbers of
/// 16 digits or more are used unpadded.
pub fn make_iv(sequence: u64) -> Vec<u8> {
    let digits = sequence.to_string().into_bytes();
    if digits.len() >= BLOCK_SIZE {
        return digits;
    }
    let mut iv = vec![0u8; BLOCK_SIZE - digits.len()];
    iv.extend_from_slice(&digits);
    iv
}

/// Decrypts on the blocking pool when `offload` is set, inline otherwise.
pub async fn decrypt_segment(
    data: Bytes,
    method: CipherMethod,
    key: Bytes,
    iv: Vec<u8>,
    offload: bool,
) -> Result<Bytes, HlsError> {
    if !offload {
        return decrypt(&data, &method, &key, &iv);
    }
    tokio::task::spawn_blocking(move || decrypt(&data, &method, &key, &iv))
        .await
        .map_err(|e| HlsError::Internal {
            reason: format!("Decryption offload task failed: {e}"),
        })?
}

/// A fetched key together with the reference it was fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedKey {
    pub method: String,
    pub uri: String,
    pub iv: Option<Vec<u8>>,
    /// Raw key bytes
    pub key: Bytes,
}

impl CachedKey {
    pub fn matches(&self, key_ref: &KeyRef) -> bool {
        self.method == key_ref.method && self.uri == key_ref.uri && self.iv == key_ref.iv
    }

    pub fn cipher(&self) -> CipherMethod {
        CipherMethod::from_name(&self.method)
    }
}

/// Recently fetched keys, at most [`CACHE_CAPACITY`] of them.
#[derive(Debug, Default)]
pub struct KeyCache {
    entries: BoundedCache<CachedKey>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self {
            entries: BoundedCache::new(CACHE_CAPACITY),
        }
    }

    pub fn get_key(&self, key_ref: &KeyRef) -> Option<&CachedKey> {
        self.entries.find(|cached| cached.matches(key_ref))
    }

    /// Fetches the key bytes for `key_ref` and caches them.
    pub async fn grab_key(
        &mut self,
        fetcher: &dyn ByteFetcher,
        headers: &HeaderMap,
        base_url: &Url,
        key_ref: &KeyRef,
    ) -> Result<CachedKey, HlsError> {
        let key_url = resolve_uri(base_url, &key_ref.uri)?;
        debug!(url = %key_url, method = %key_ref.method, "Fetching decryption key");
        let key = fetcher.fetch(&key_url, headers).await?;

        let cached = CachedKey {
            method: key_ref.method.clone(),
            uri: key_ref.uri.clone(),
            iv: key_ref.iv.clone(),
            key,
        };
        self.entries.push(cached.clone());
        self.entries.trim();
        Ok(cached)
    }

    /// Cached key for `key_ref`, fetching it on a miss.
    pub async fn obtain(
        &mut self,
        fetcher: &dyn ByteFetcher,
        headers: &HeaderMap,
        base_url: &Url,
        key_ref: &KeyRef,
    ) -> Result<CachedKey, HlsError> {
        if let Some(cached) = self.get_key(key_ref) {
            trace!(uri = %key_ref.uri, "Key cache hit");
            return Ok(cached.clone());
        }
        self.grab_key(fetcher, headers, base_url, key_ref).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
