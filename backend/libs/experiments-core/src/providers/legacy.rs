//! User/page legacy experiment: URL-flag short-circuit, content-type
//! gating, and an optional inner feature-flag gate.

use crate::hasher;
use crate::model::{LegacyKind, LegacyPayload};
use crate::providers::basic_feature_flag;
use crate::subject::Subject;
use crate::variant_chooser;

pub(crate) fn variant(experiment_name: &str, payload: &LegacyPayload, subject: &Subject) -> Option<String> {
    if !payload.url_variants.is_empty() {
        for flag in subject.values("url_flags") {
            if let Some(flag) = flag.as_lower_str() {
                if let Some(variant) = payload.url_variants.get(&flag) {
                    return Some(variant.clone());
                }
            }
        }
    }

    if let Some(gate) = &payload.feature_flag_gate {
        if !basic_feature_flag::enabled(experiment_name, gate, subject) {
            return None;
        }
    }

    // Content-type gating only applies to page experiments — mirrors
    // `_get_thing_bucket`, reachable solely from `_get_page_experiment_variant`
    // in the original; user experiments never consult `content_flags`.
    if payload.kind == LegacyKind::Page {
        let content_type = subject.get_str("content_type");

        if payload.content_flags.subreddit_only && content_type.as_deref() != Some("subreddit") {
            return None;
        }

        if payload.content_flags.link_only
            && content_type.as_deref() != Some("link")
            && content_type.as_deref() != Some("comment")
        {
            return None;
        }
    }

    let bucket_key = match payload.kind {
        LegacyKind::User => subject.get_str("user_id"),
        LegacyKind::Page => subject.get_str("content_id"),
    }?;

    let seed = payload.seed.as_deref().unwrap_or(experiment_name);
    let bucket = hasher::bucket(seed, &bucket_key);
    variant_chooser::choose(bucket, &payload.variants)
}
