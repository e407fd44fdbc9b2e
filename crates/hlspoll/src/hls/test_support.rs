// In-memory collaborators for engine tests.

use aes::Aes128;
use async_trait::async_trait;
use bytes::Bytes;
use cbc::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::HlsError;
use crate::hls::fetcher::ByteFetcher;
use crate::hls::sink::SegmentSink;

#[derive(Clone)]
enum Response {
    Body(Bytes, Duration),
    NotFound,
}

#[derive(Default)]
struct MockState {
    /// Per-URL queue; the last response stays once the rest are consumed
    responses: HashMap<String, VecDeque<Response>>,
    requests: Vec<(String, Instant)>,
    completions: Vec<String>,
    headers: Vec<HeaderMap>,
}

/// Scripted [`ByteFetcher`] keyed by absolute URL.
#[derive(Default)]
pub struct MockFetcher {
    state: Mutex<MockState>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, body: impl Into<Bytes>) {
        self.push(url, Response::Body(body.into(), Duration::ZERO));
    }

    pub fn respond_after(&self, url: &str, body: impl Into<Bytes>, delay: Duration) {
        self.push(url, Response::Body(body.into(), delay));
    }

    pub fn fail(&self, url: &str) {
        self.push(url, Response::NotFound);
    }

    fn push(&self, url: &str, response: Response) {
        self.state
            .lock()
            .responses
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(requested, _)| requested == url)
            .count()
    }

    /// Instants at which `url` was requested.
    pub fn request_times(&self, url: &str) -> Vec<Instant> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(requested, _)| requested == url)
            .map(|(_, at)| *at)
            .collect()
    }

    /// URLs in the order their responses were delivered.
    pub fn completion_order(&self) -> Vec<String> {
        self.state.lock().completions.clone()
    }

    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.state.lock().headers.last().cloned()
    }
}

#[async_trait]
impl ByteFetcher for MockFetcher {
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<Bytes, HlsError> {
        let response = {
            let mut state = self.state.lock();
            state.requests.push((url.to_string(), Instant::now()));
            state.headers.push(headers.clone());
            match state.responses.get_mut(url.as_str()) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(Response::Body(body, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                self.state.lock().completions.push(url.to_string());
                Ok(body)
            }
            Some(Response::NotFound) | None => {
                Err(HlsError::http_status(StatusCode::NOT_FOUND, url.as_str()))
            }
        }
    }
}

/// Sink whose appended chunks stay observable through its clones.
#[derive(Clone, Default)]
pub struct SharedSink {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.lock().clone()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.chunks.lock().concat()
    }
}

impl SegmentSink for SharedSink {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.chunks.lock().push(data.to_vec());
        Ok(())
    }
}

pub fn encrypt_aes128_cbc(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Vec<u8> {
    let encryptor =
        cbc::Encryptor::<Aes128>::new_from_slices(key, iv).expect("valid key and iv lengths");
    let mut buffer = vec![0u8; plaintext.len() + 16];
    buffer[..plaintext.len()].copy_from_slice(plaintext);
    let len = encryptor
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, plaintext.len())
        .expect("buffer has room for padding")
        .len();
    buffer.truncate(len);
    buffer
}
