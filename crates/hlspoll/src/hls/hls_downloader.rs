use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};
use url::Url;

use crate::HlsError;
use crate::downloader::DownloaderConfig;
use crate::hls::batch::{BatchDownloader, BatchOutcome};
use crate::hls::config::HlsConfig;
use crate::hls::events::{DownloadEvent, EventCallback};
use crate::hls::fetcher::{ByteFetcher, HttpFetcher};
use crate::hls::playlist::{M3u8Parser, ManifestParser, ManifestView, base_url};
use crate::hls::selector::select_variant;
use crate::hls::sink::SegmentSink;

/// Phase of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No variant chosen yet; the root manifest is polled
    Resolving,
    /// A variant (or a root media playlist) is being polled
    Streaming,
    Stopped,
}

/// Mutable loop state, written only by the task driving [`HlsDownloader::run`].
#[derive(Debug, Clone)]
pub struct RunState {
    /// Active manifest URL; `None` means the root URL
    pub current_playlist_url: Option<Url>,
    /// Consecutive unresolved manifests since the last variant selection
    pub retry_count: u32,
    pub phase: PollState,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            current_playlist_url: None,
            retry_count: 0,
            phase: PollState::Resolving,
        }
    }
}

/// Cloneable handle to the downloader's running flag.
///
/// The flag is checked only at the top of each poll iteration, so a stop
/// never interrupts an in-flight batch or sleep.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }
}

/// Totals of one [`HlsDownloader::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Batches that wrote at least one segment
    pub batches: u64,
    pub segments: u64,
    pub bytes: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: BatchOutcome) {
        if outcome.segments > 0 {
            self.batches += 1;
        }
        self.segments += outcome.segments as u64;
        self.bytes += outcome.bytes;
    }
}

/// Continuous HLS poller writing every new segment to a sink.
pub struct HlsDownloader {
    config: HlsConfig,
    fetcher: Arc<dyn ByteFetcher>,
    parser: Box<dyn ManifestParser>,
    sink: Box<dyn SegmentSink>,
    batches: BatchDownloader,
    state: RunState,
    stop: StopHandle,
    on_event: Option<EventCallback>,
}

impl HlsDownloader {
    pub fn new(
        config: HlsConfig,
        fetcher: Arc<dyn ByteFetcher>,
        parser: Box<dyn ManifestParser>,
        sink: Box<dyn SegmentSink>,
    ) -> Self {
        let batches = BatchDownloader::new(
            fetcher.clone(),
            config.headers.clone(),
            config.offload_decryption,
        );
        Self {
            config,
            fetcher,
            parser,
            sink,
            batches,
            state: RunState::default(),
            stop: StopHandle::default(),
            on_event: None,
        }
    }

    /// Downloader over a reqwest client built from `http`, parsing with `m3u8-rs`.
    pub fn with_http(
        config: HlsConfig,
        http: &DownloaderConfig,
        sink: Box<dyn SegmentSink>,
    ) -> Result<Self, HlsError> {
        let fetcher = Arc::new(HttpFetcher::with_config(http)?);
        Ok(Self::new(config, fetcher, Box::new(M3u8Parser), sink))
    }

    pub fn with_event_callback(
        mut self,
        callback: impl Fn(DownloadEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &HlsConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Requests a stop before the next poll iteration.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Polls until stopped, retries run out, or an error occurs.
    ///
    /// Unresolved manifests past the retry budget end the run with `Ok`.
    /// Any transport, decryption, parse or selection failure ends it with
    /// that error; nothing is retried here.
    pub async fn run(&mut self) -> Result<RunSummary, HlsError> {
        self.stop.start();
        info!(url = %self.config.url, "Starting HLS poll loop");

        let result = self.poll().await;

        self.state.phase = PollState::Stopped;
        self.stop.stop();

        if let Ok(summary) = &result {
            info!(
                batches = summary.batches,
                segments = summary.segments,
                bytes = summary.bytes,
                "HLS poll loop stopped"
            );
            self.emit(DownloadEvent::Stopped);
        }
        result
    }

    async fn poll(&mut self) -> Result<RunSummary, HlsError> {
        let mut summary = RunSummary::default();

        while self.stop.is_running() {
            let manifest_url = self
                .state
                .current_playlist_url
                .clone()
                .unwrap_or_else(|| self.config.url.clone());
            let content = self
                .fetcher
                .fetch(&manifest_url, &self.config.headers)
                .await?;
            let view = self.parser.parse(&content)?;
            let base = base_url(&manifest_url)?;
            debug!(url = %manifest_url, kind = view.kind(), "Fetched manifest");

            match view {
                ManifestView::Segments(manifest) => {
                    self.state.phase = PollState::Streaming;
                    let outcome = self
                        .batches
                        .download_segments(
                            &base,
                            &manifest.segments,
                            manifest.media_sequence,
                            self.sink.as_mut(),
                        )
                        .await?;
                    summary.record(outcome);
                    if outcome.segments > 0 {
                        self.emit(DownloadEvent::BatchWritten {
                            media_sequence: manifest.media_sequence,
                            segments: outcome.segments,
                            bytes: outcome.bytes,
                        });
                    }

                    let interval = manifest.refresh_interval();
                    debug!(
                        written = outcome.segments,
                        listed = manifest.segments.len(),
                        ?interval,
                        "Waiting for next playlist refresh"
                    );
                    tokio::time::sleep(interval).await;
                }
                ManifestView::Variants(variants) => {
                    let (url, height) = select_variant(
                        &base,
                        &variants,
                        self.config.min_res,
                        self.config.max_res,
                        self.config.sorting,
                    )?;
                    info!(url = %url, ?height, "Selected variant");
                    self.emit(DownloadEvent::VariantSelected {
                        url: url.to_string(),
                        height,
                    });
                    self.state.current_playlist_url = Some(url);
                    self.state.retry_count = 0;
                    self.state.phase = PollState::Streaming;
                }
                ManifestView::Unresolved => {
                    self.state.current_playlist_url = None;
                    self.state.phase = PollState::Resolving;

                    if self.state.retry_count >= self.config.retries {
                        warn!(
                            url = %manifest_url,
                            retries = self.config.retries,
                            "Manifest has no segments or variants, giving up"
                        );
                        self.emit(DownloadEvent::ManifestUnresolved {
                            attempt: self.state.retry_count + 1,
                            max_retries: self.config.retries,
                            retry_in: None,
                        });
                        return Ok(summary);
                    }

                    self.state.retry_count += 1;
                    warn!(
                        url = %manifest_url,
                        attempt = self.state.retry_count,
                        max_retries = self.config.retries,
                        delay = ?self.config.retry_delay,
                        "Manifest has no segments or variants, retrying from root"
                    );
                    self.emit(DownloadEvent::ManifestUnresolved {
                        attempt: self.state.retry_count,
                        max_retries: self.config.retries,
                        retry_in: Some(self.config.retry_delay),
                    });
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }

        debug!("Stop requested");
        Ok(summary)
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(callback) = &self.on_event {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::config::{DEFAULT_USER_AGENT, Sorting};
    use crate::hls::decryption::make_iv;
    use crate::hls::test_support::{MockFetcher, SharedSink, encrypt_aes128_cbc};
    use parking_lot::Mutex;
    use reqwest::header::USER_AGENT;
    use std::time::Duration;

    const ROOT: &str = "https://cdn.test/live/master.m3u8";
    const EMPTY_MEDIA: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXT-X-ENDLIST\n";

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=854x480
480/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1920x1080
1080/index.m3u8
";

    fn media(sequence: u64, names: &[&str]) -> String {
        let mut out = format!(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n#EXT-X-MEDIA-SEQUENCE:{sequence}\n"
        );
        for name in names {
            out.push_str(&format!("#EXTINF:4.0,\n{name}\n"));
        }
        out
    }

    fn downloader(
        config: HlsConfig,
        fetcher: &Arc<MockFetcher>,
        sink: &SharedSink,
    ) -> (HlsDownloader, Arc<Mutex<Vec<DownloadEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = events.clone();
        let downloader = HlsDownloader::new(
            config,
            fetcher.clone(),
            Box::new(M3u8Parser),
            Box::new(sink.clone()),
        )
        .with_event_callback(move |event| recorded.lock().push(event));
        (downloader, events)
    }

    fn config() -> HlsConfig {
        HlsConfig::builder(ROOT)
            .offload_decryption(false)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn selects_variant_downloads_batch_and_paces_by_target_duration() {
        let fetcher = Arc::new(MockFetcher::new());
        let variant = "https://cdn.test/live/1080/index.m3u8";
        fetcher.respond(ROOT, MASTER);
        fetcher.respond(variant, media(10, &["s10.ts", "s11.ts", "s12.ts"]));
        fetcher.respond(variant, EMPTY_MEDIA);
        for n in 10..13 {
            fetcher.respond(
                &format!("https://cdn.test/live/1080/s{n}.ts"),
                format!("seg{n}").into_bytes(),
            );
        }
        let sink = SharedSink::new();
        let (mut downloader, events) = downloader(config(), &fetcher, &sink);

        let summary = downloader.run().await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                batches: 1,
                segments: 3,
                bytes: 15
            }
        );
        assert_eq!(sink.bytes(), b"seg10seg11seg12");
        assert_eq!(fetcher.calls(ROOT), 1);
        let sent = fetcher.last_headers().unwrap();
        assert_eq!(sent.get(USER_AGENT).unwrap(), DEFAULT_USER_AGENT);

        let times = fetcher.request_times(variant);
        assert_eq!(times.len(), 2);
        assert_eq!(times[1] - times[0], Duration::from_secs(4));

        let events = events.lock().clone();
        assert_eq!(
            events,
            vec![
                DownloadEvent::VariantSelected {
                    url: variant.to_string(),
                    height: Some(1080),
                },
                DownloadEvent::BatchWritten {
                    media_sequence: 10,
                    segments: 3,
                    bytes: 15,
                },
                DownloadEvent::ManifestUnresolved {
                    attempt: 1,
                    max_retries: 0,
                    retry_in: None,
                },
                DownloadEvent::Stopped,
            ]
        );
        assert_eq!(downloader.state().phase, PollState::Stopped);
        assert!(!downloader.stop_handle().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_manifests_stop_cleanly_after_retry_budget() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond(ROOT, EMPTY_MEDIA);
        let sink = SharedSink::new();
        let config = HlsConfig::builder(ROOT)
            .retries(2)
            .retry_delay(Duration::from_millis(250))
            .build()
            .unwrap();
        let (mut downloader, _) = downloader(config, &fetcher, &sink);

        let summary = downloader.run().await.unwrap();

        assert_eq!(summary, RunSummary::default());
        let times = fetcher.request_times(ROOT);
        assert_eq!(times.len(), 3);
        assert_eq!(times[1] - times[0], Duration::from_millis(250));
        assert_eq!(times[2] - times[1], Duration::from_millis(250));
        assert_eq!(downloader.state().retry_count, 2);
        assert!(downloader.state().current_playlist_url.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_variant_falls_back_to_root_and_resets_retries() {
        let fetcher = Arc::new(MockFetcher::new());
        let variant = "https://cdn.test/live/1080/index.m3u8";
        fetcher.respond(ROOT, MASTER);
        fetcher.respond(ROOT, MASTER);
        fetcher.respond(ROOT, EMPTY_MEDIA);
        fetcher.respond(variant, EMPTY_MEDIA);
        let sink = SharedSink::new();
        let config = HlsConfig::builder(ROOT).retries(1).build().unwrap();
        let (mut downloader, events) = downloader(config, &fetcher, &sink);

        downloader.run().await.unwrap();

        // master, empty variant (retry 1), master (budget reset), empty variant (retry 1),
        // empty root (exhausted)
        assert_eq!(fetcher.calls(ROOT), 3);
        assert_eq!(fetcher.calls(variant), 2);
        let selections = events
            .lock()
            .iter()
            .filter(|e| matches!(e, DownloadEvent::VariantSelected { .. }))
            .count();
        assert_eq!(selections, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_fetched_once_across_refreshes() {
        let fetcher = Arc::new(MockFetcher::new());
        let key = [0x33u8; 16];
        let playlist = "https://cdn.test/live/media.m3u8";
        let header = "#EXTM3U\n#EXT-X-TARGETDURATION:2\n";
        let key_tag = "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n";
        fetcher.respond(
            playlist,
            format!(
                "{header}#EXT-X-MEDIA-SEQUENCE:5\n{key_tag}#EXTINF:2,\na.ts\n#EXTINF:2,\nb.ts\n"
            ),
        );
        fetcher.respond(
            playlist,
            format!(
                "{header}#EXT-X-MEDIA-SEQUENCE:6\n{key_tag}#EXTINF:2,\nb.ts\n#EXTINF:2,\nc.ts\n"
            ),
        );
        fetcher.respond(playlist, EMPTY_MEDIA);
        fetcher.respond("https://cdn.test/live/key.bin", key.to_vec());
        for (name, sequence) in [("a", 5u64), ("b", 6), ("c", 7)] {
            let plaintext = format!("#{}", name.repeat(15));
            fetcher.respond(
                &format!("https://cdn.test/live/{name}.ts"),
                encrypt_aes128_cbc(plaintext.as_bytes(), &key, &make_iv(sequence)),
            );
        }
        let sink = SharedSink::new();
        let config = HlsConfig::builder(playlist).build().unwrap();
        let (mut downloader, _) = downloader(config, &fetcher, &sink);

        let summary = downloader.run().await.unwrap();

        assert_eq!(fetcher.calls("https://cdn.test/live/key.bin"), 1);
        assert_eq!(fetcher.calls("https://cdn.test/live/b.ts"), 1);
        assert_eq!(summary.segments, 3);
        assert_eq!(summary.batches, 2);
        assert_eq!(
            sink.chunks(),
            vec![
                b"aaaaaaaaaaaaaaa".to_vec(),
                b"bbbbbbbbbbbbbbb".to_vec(),
                b"ccccccccccccccc".to_vec(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_window_miss_is_fatal() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.respond(ROOT, MASTER);
        let sink = SharedSink::new();
        let config = HlsConfig::builder(ROOT)
            .min_res(1200)
            .max_res(2160)
            .sorting(Sorting::Worst)
            .build()
            .unwrap();
        let (mut downloader, events) = downloader(config, &fetcher, &sink);

        let err = downloader.run().await.unwrap_err();

        assert!(matches!(err, HlsError::ResolutionExhausted { candidates: 2, .. }));
        assert_eq!(downloader.state().phase, PollState::Stopped);
        assert!(events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn segment_failure_aborts_the_run() {
        let fetcher = Arc::new(MockFetcher::new());
        let playlist = "https://cdn.test/live/media.m3u8";
        fetcher.respond(playlist, media(0, &["a.ts", "b.ts"]));
        fetcher.respond("https://cdn.test/live/a.ts", b"a".to_vec());
        fetcher.fail("https://cdn.test/live/b.ts");
        let sink = SharedSink::new();
        let config = HlsConfig::builder(playlist).build().unwrap();
        let (mut downloader, _) = downloader(config, &fetcher, &sink);

        let err = downloader.run().await.unwrap_err();

        assert!(err.is_transport());
        assert!(sink.chunks().is_empty());
        assert_eq!(fetcher.calls(playlist), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_takes_effect_at_the_next_iteration() {
        let fetcher = Arc::new(MockFetcher::new());
        let playlist = "https://cdn.test/live/media.m3u8";
        fetcher.respond(playlist, media(0, &["a.ts"]));
        fetcher.respond(playlist, media(1, &["a.ts", "b.ts"]));
        fetcher.respond("https://cdn.test/live/a.ts", b"a".to_vec());
        fetcher.respond("https://cdn.test/live/b.ts", b"b".to_vec());
        let sink = SharedSink::new();
        let config = HlsConfig::builder(playlist).build().unwrap();
        let downloader = HlsDownloader::new(
            config,
            fetcher.clone(),
            Box::new(M3u8Parser),
            Box::new(sink.clone()),
        );
        let handle = downloader.stop_handle();
        let stopper = handle.clone();
        let mut downloader = downloader.with_event_callback(move |event| {
            if matches!(event, DownloadEvent::BatchWritten { .. }) {
                stopper.stop();
            }
        });

        let summary = downloader.run().await.unwrap();

        // The batch and its refresh sleep still complete; no second fetch follows.
        assert_eq!(summary.segments, 1);
        assert_eq!(fetcher.calls(playlist), 1);
        assert!(!handle.is_running());
    }

    #[test]
    fn starts_resolving_from_root() {
        let fetcher: Arc<dyn ByteFetcher> = Arc::new(MockFetcher::new());
        let downloader = HlsDownloader::new(
            config(),
            fetcher,
            Box::new(M3u8Parser),
            Box::new(Vec::<u8>::new()),
        );

        assert_eq!(downloader.state().phase, PollState::Resolving);
        assert!(downloader.state().current_playlist_url.is_none());
        assert_eq!(downloader.state().retry_count, 0);
        assert!(!downloader.stop_handle().is_running());
    }
}
