//! Maps a bucket to a variant name under a stable growth invariant.
//!
//! Say we have an experiment with two new things we're trying out for
//! 2% of users each (A and B), a control group with 5% (C), and a pool
//! of excluded users (x). Buckets are laid out like:
//!
//!     A B C A B C x x C x x C x x C x x x x x x x x x...
//!
//! This scheme lets us later grow A and B to 7% while keeping the
//! experience consistent for every user outside the newly-added slice:
//!
//!     A B C A B C A B C A B C A B C A B x A B x x x x...
//!
//! Rather than building the layout out in memory we compute one
//! bucket's answer directly with the arithmetic below.

use std::collections::BTreeMap;

use crate::hasher::NUM_BUCKETS;

/// Deterministically choose a percentage-based variant.
///
/// `variants` maps variant name to percentage in `[0, 100]`. A
/// `BTreeMap` is required rather than a plain hash map so the
/// lexical ordering the algorithm depends on comes for free.
///
/// Returns `None` if `bucket` falls outside every variant's slice, or
/// if `variants` is empty.
pub fn choose(bucket: u32, variants: &BTreeMap<String, f64>) -> Option<String> {
    let n = variants.len();
    if n == 0 {
        return None;
    }

    let candidate = variants.keys().nth(bucket as usize % n)?;
    let pct = variants[candidate];

    let cap = 100.0 / n as f64;
    if pct > cap {
        tracing::warn!(
            variant = %candidate,
            requested_pct = pct,
            cap_pct = cap,
            "variant exceeds allowable percentage; capping silently"
        );
    }

    let bucket_multiplier = NUM_BUCKETS as f64 / 100.0;
    let limit = pct * n as f64 * bucket_multiplier;

    if (bucket as f64) < limit {
        Some(candidate.clone())
    } else {
        None
    }
}
