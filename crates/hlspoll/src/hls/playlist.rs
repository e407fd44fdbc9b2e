// Manifest model consumed by the poll loop, and its m3u8-rs backed parser.

use m3u8_rs::{
    ExtTag, Key, KeyMethod, MasterPlaylist, MediaPlaylist, Playlist, parse_playlist_res,
};
use std::time::Duration;
use tracing::trace;
use url::Url;

use crate::HlsError;

/// Interval used when a media playlist omits `#EXT-X-TARGETDURATION`.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Encryption parameters attached to a segment.
///
/// Equality over (method, uri, iv) is the key cache identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRef {
    /// Protocol-level cipher name, e.g. `AES-128`
    pub method: String,
    /// Key URI exactly as written in the manifest
    pub uri: String,
    /// Explicit IV bytes from the `IV` attribute
    pub iv: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub uri: String,
    pub key: Option<KeyRef>,
}

impl Segment {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: KeyRef) -> Self {
        self.key = Some(key);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Declared height in pixels; `None` when the entry carries no RESOLUTION
    pub height: Option<u64>,
    pub uri: String,
}

/// Segment list of one media playlist fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaManifest {
    pub segments: Vec<Segment>,
    /// Sequence number of `segments[0]`
    pub media_sequence: u64,
    /// Declared target duration in seconds
    pub target_duration: Option<u64>,
}

impl MediaManifest {
    /// Sleep between refreshes of this playlist.
    pub fn refresh_interval(&self) -> Duration {
        match self.target_duration {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Parsed result of one manifest fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestView {
    /// Non-empty segment list
    Segments(MediaManifest),
    /// Non-empty variant list
    Variants(Vec<Variant>),
    /// Neither segments nor variants
    Unresolved,
}

impl ManifestView {
    pub fn media(
        segments: Vec<Segment>,
        media_sequence: u64,
        target_duration: Option<u64>,
    ) -> Self {
        if segments.is_empty() {
            return Self::Unresolved;
        }
        Self::Segments(MediaManifest {
            segments,
            media_sequence,
            target_duration,
        })
    }

    pub fn master(variants: Vec<Variant>) -> Self {
        if variants.is_empty() {
            return Self::Unresolved;
        }
        Self::Variants(variants)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Segments(_) => "media",
            Self::Variants(_) => "master",
            Self::Unresolved => "unresolved",
        }
    }
}

/// Turns a fetched manifest document into a [`ManifestView`].
pub trait ManifestParser: Send + Sync {
    fn parse(&self, content: &[u8]) -> Result<ManifestView, HlsError>;
}

/// [`ManifestParser`] backed by `m3u8-rs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct M3u8Parser;

impl ManifestParser for M3u8Parser {
    fn parse(&self, content: &[u8]) -> Result<ManifestView, HlsError> {
        match parse_playlist_res(content) {
            Ok(Playlist::MasterPlaylist(master)) => Ok(master_view(&master)),
            Ok(Playlist::MediaPlaylist(media)) => media_view(&media),
            Err(e) => Err(HlsError::playlist(format!("Failed to parse playlist: {e}"))),
        }
    }
}

fn master_view(master: &MasterPlaylist) -> ManifestView {
    let variants = master
        .variants
        .iter()
        .filter(|v| !v.is_i_frame)
        .map(|v| Variant {
            height: v.resolution.map(|r| r.height),
            uri: v.uri.clone(),
        })
        .collect();
    ManifestView::master(variants)
}

fn media_view(media: &MediaPlaylist) -> Result<ManifestView, HlsError> {
    // m3u8-rs attaches EXT-X-KEY only to the segment right after the tag;
    // a key stays in effect until the next key tag.
    let mut active_key: Option<KeyRef> = None;
    let mut segments = Vec::with_capacity(media.segments.len());

    for segment in &media.segments {
        if let Some(key) = &segment.key {
            active_key = key_ref(key)?;
        } else if segment.unknown_tags.iter().any(clears_key) {
            active_key = None;
        }
        segments.push(Segment {
            uri: segment.uri.clone(),
            key: active_key.clone(),
        });
    }

    let target_duration = (media.target_duration > 0).then_some(media.target_duration);
    trace!(
        segments = segments.len(),
        media_sequence = media.media_sequence,
        ?target_duration,
        "Parsed media playlist"
    );
    Ok(ManifestView::media(
        segments,
        media.media_sequence,
        target_duration,
    ))
}

/// m3u8-rs rejects `METHOD=NONE` without an IV and keeps the tag as unknown.
fn clears_key(tag: &ExtTag) -> bool {
    tag.tag == "X-KEY"
        && tag
            .rest
            .as_deref()
            .is_some_and(|attrs| attrs.split(',').any(|attr| attr.trim() == "METHOD=NONE"))
}

fn key_ref(key: &Key) -> Result<Option<KeyRef>, HlsError> {
    let method = match &key.method {
        KeyMethod::None => return Ok(None),
        KeyMethod::AES128 => "AES-128".to_string(),
        KeyMethod::SampleAES => "SAMPLE-AES".to_string(),
        KeyMethod::Other(name) => name.clone(),
    };
    let uri = key
        .uri
        .clone()
        .ok_or_else(|| HlsError::playlist(format!("{method} key without URI")))?;
    let iv = key.iv.as_deref().map(parse_iv).transpose()?;

    Ok(Some(KeyRef { method, uri, iv }))
}

/// Decodes an `IV=0x...` attribute value.
pub fn parse_iv(iv_hex: &str) -> Result<Vec<u8>, HlsError> {
    let digits = iv_hex
        .strip_prefix("0x")
        .or_else(|| iv_hex.strip_prefix("0X"))
        .unwrap_or(iv_hex);
    hex::decode(digits)
        .map_err(|e| HlsError::playlist(format!("Failed to parse IV '{iv_hex}': {e}")))
}

/// Directory of a manifest URL, against which its relative URIs resolve.
pub fn base_url(manifest_url: &Url) -> Result<Url, HlsError> {
    manifest_url
        .join(".")
        .map_err(|e| HlsError::invalid_url(manifest_url.as_str(), e.to_string()))
}

/// Absolute URIs pass through; anything else is joined onto `base`.
pub fn resolve_uri(base: &Url, uri: &str) -> Result<Url, HlsError> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        Url::parse(uri).map_err(|e| HlsError::invalid_url(uri, e.to_string()))
    } else {
        base.join(uri)
            .map_err(|e| HlsError::invalid_url(uri, e.to_string()))
    }
}
