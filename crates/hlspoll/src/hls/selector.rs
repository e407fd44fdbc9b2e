// Variant selection over a master playlist.

use tracing::debug;
use url::Url;

use crate::HlsError;
use crate::hls::config::Sorting;
use crate::hls::playlist::{Variant, resolve_uri};

/// Picks the variant whose height falls within `[min_res, max_res]` and ranks
/// first under `sorting`, returning its absolute URL and height.
///
/// Variants without a declared resolution never qualify. Ties keep manifest
/// order.
pub fn select_variant(
    base_url: &Url,
    variants: &[Variant],
    min_res: u64,
    max_res: u64,
    sorting: Sorting,
) -> Result<(Url, Option<u64>), HlsError> {
    let mut candidates: Vec<(u64, &Variant)> = variants
        .iter()
        .filter_map(|v| v.height.map(|h| (h, v)))
        .filter(|(height, _)| (min_res..=max_res).contains(height))
        .collect();

    match sorting {
        Sorting::Best => candidates.sort_by(|a, b| b.0.cmp(&a.0)),
        Sorting::Worst => candidates.sort_by(|a, b| a.0.cmp(&b.0)),
    }

    let Some((height, chosen)) = candidates.first() else {
        return Err(HlsError::ResolutionExhausted {
            min_res,
            max_res,
            candidates: variants.len(),
        });
    };

    let url = resolve_uri(base_url, &chosen.uri)?;
    debug!(
        %url,
        height,
        %sorting,
        eligible = candidates.len(),
        "Selected variant"
    );
    Ok((url, Some(*height)))
}
