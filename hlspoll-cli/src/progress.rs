use hlspoll_engine::DownloadEvent;
use indicatif::HumanBytes;

/// Progress line shown on the spinner after `event`.
pub fn describe(event: &DownloadEvent, total_bytes: u64) -> String {
    match event {
        DownloadEvent::VariantSelected { url, height } => match height {
            Some(height) => format!("{height}p selected: {url}"),
            None => format!("variant selected: {url}"),
        },
        DownloadEvent::BatchWritten {
            media_sequence,
            segments,
            ..
        } => format!(
            "{} written, {segments} new segment(s) at #{media_sequence}",
            HumanBytes(total_bytes)
        ),
        DownloadEvent::ManifestUnresolved {
            attempt,
            max_retries,
            retry_in: Some(delay),
        } => format!(
            "empty manifest, retry {attempt}/{max_retries} in {}ms",
            delay.as_millis()
        ),
        DownloadEvent::ManifestUnresolved { retry_in: None, .. } => {
            "empty manifest, stream ended".to_string()
        }
        DownloadEvent::Stopped => format!("stopped, {} written", HumanBytes(total_bytes)),
    }
}
