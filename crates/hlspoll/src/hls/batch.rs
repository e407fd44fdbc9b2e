// Segment batch orchestration: dedup, key lookup, concurrent fetch+decrypt, ordered append.

use bytes::Bytes;
use futures::future::try_join_all;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

use crate::HlsError;
use crate::hls::cache::SegmentCache;
use crate::hls::decryption::{CipherMethod, KeyCache, decrypt_segment, make_iv};
use crate::hls::fetcher::ByteFetcher;
use crate::hls::playlist::{Segment, resolve_uri};
use crate::hls::sink::SegmentSink;

/// Totals for one batch that reached the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub segments: usize,
    pub bytes: u64,
}

struct SegmentDecryption {
    method: CipherMethod,
    key: Bytes,
    iv: Vec<u8>,
}

struct SegmentJob {
    url: Url,
    sequence: u64,
    decryption: Option<SegmentDecryption>,
}

/// Downloads the unseen part of each manifest refresh.
///
/// Owns the key cache and the segment dedup cache; both are only touched
/// from the task driving [`download_segments`](Self::download_segments).
pub struct BatchDownloader {
    fetcher: Arc<dyn ByteFetcher>,
    headers: HeaderMap,
    keys: KeyCache,
    seen: SegmentCache,
    offload_decryption: bool,
}

impl BatchDownloader {
    pub fn new(
        fetcher: Arc<dyn ByteFetcher>,
        headers: HeaderMap,
        offload_decryption: bool,
    ) -> Self {
        Self {
            fetcher,
            headers,
            keys: KeyCache::new(),
            seen: SegmentCache::default(),
            offload_decryption,
        }
    }

    pub fn key_cache(&self) -> &KeyCache {
        &self.keys
    }

    pub fn segment_cache(&self) -> &SegmentCache {
        &self.seen
    }

    /// Fetches every segment of `segments` not seen before, decrypting where a
    /// key applies, and appends the results to `sink` in manifest order.
    ///
    /// Segment `i` of the batch has sequence number `media_sequence + i`.
    /// Any single failure fails the whole batch and nothing is appended.
    pub async fn download_segments(
        &mut self,
        base_url: &Url,
        segments: &[Segment],
        media_sequence: u64,
        sink: &mut dyn SegmentSink,
    ) -> Result<BatchOutcome, HlsError> {
        let mut jobs = Vec::new();

        for (index, segment) in segments.iter().enumerate() {
            let url = resolve_uri(base_url, &segment.uri)?;
            if self.seen.find(|seen| seen == url.as_str()).is_some() {
                continue;
            }
            // EXT-X-MEDIA-SEQUENCE may sit at u64::MAX; the IV sequence wraps
            let sequence = media_sequence.wrapping_add(index as u64);

            let decryption = match &segment.key {
                Some(key_ref) => {
                    let cached = self
                        .keys
                        .obtain(self.fetcher.as_ref(), &self.headers, base_url, key_ref)
                        .await?;
                    Some(SegmentDecryption {
                        method: cached.cipher(),
                        iv: cached.iv.clone().unwrap_or_else(|| make_iv(sequence)),
                        key: cached.key,
                    })
                }
                None => None,
            };

            self.seen.push(url.as_str().to_string());
            jobs.push(SegmentJob {
                url,
                sequence,
                decryption,
            });
        }

        debug!(
            total = segments.len(),
            new = jobs.len(),
            media_sequence,
            "Dispatching segment batch"
        );

        let fetcher = self.fetcher.as_ref();
        let headers = &self.headers;
        let offload = self.offload_decryption;
        let downloads = jobs
            .into_iter()
            .map(|job| fetch_segment(fetcher, headers, job, offload));
        let bodies = try_join_all(downloads).await?;

        let mut outcome = BatchOutcome::default();
        for body in &bodies {
            sink.append(body)?;
            outcome.segments += 1;
            outcome.bytes += body.len() as u64;
        }
        sink.flush()?;
        self.seen.trim();

        Ok(outcome)
    }
}

async fn fetch_segment(
    fetcher: &dyn ByteFetcher,
    headers: &HeaderMap,
    job: SegmentJob,
    offload: bool,
) -> Result<Bytes, HlsError> {
    trace!(url = %job.url, sequence = job.sequence, "Fetching segment");
    let data = fetcher.fetch(&job.url, headers).await?;

    match job.decryption {
        None => Ok(data),
        Some(SegmentDecryption { method, key, iv }) => {
            decrypt_segment(data, method, key, iv, offload).await
        }
    }
}
