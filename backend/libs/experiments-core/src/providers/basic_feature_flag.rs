//! Targeting-OR-percentage boolean evaluator for feature-flag semantics.

use crate::hasher;
use crate::model::{FeatureFlagPayload, UserFlag};
use crate::subject::Subject;

pub(crate) fn enabled(name: &str, payload: &FeatureFlagPayload, subject: &Subject) -> bool {
    is_targeting_enabled(payload, subject) || is_percent_enabled(name, payload, subject)
}

fn is_targeting_enabled(payload: &FeatureFlagPayload, subject: &Subject) -> bool {
    let targeting = &payload.targeting;

    if let Some(url_flag) = &targeting.url_flag {
        for feature in subject.values("url_features") {
            if let Some(lower) = feature.as_lower_str() {
                if lower == url_flag.to_lowercase() {
                    return true;
                }
            }
        }
    }

    if !targeting.user_flags.is_empty() {
        for flag in subject.values("user_groups") {
            if let Some(lower) = flag.as_lower_str() {
                if let Ok(parsed) = UserFlag::parse(&lower) {
                    if targeting.user_flags.contains(&parsed) {
                        return true;
                    }
                }
            }
        }
    }

    // `newer_than` fires when the account is OLDER than the cutoff —
    // the opposite polarity from R2's `newer_than`, preserved exactly
    // as the original `FeatureFlag._is_targeting_enabled` implements it.
    if let Some(newer_than) = targeting.newer_than {
        if let Some(user_created) = subject.get_int("user_created") {
            if user_created < newer_than {
                return true;
            }
        }
    }

    if !targeting.users.is_empty()
        && subject.get_bool("logged_in") == Some(true)
    {
        if let Some(user_name) = subject.get_str("user_name") {
            if targeting.users.contains(&user_name.to_lowercase()) {
                return true;
            }
        }
    }

    if !targeting.subreddits.is_empty() {
        if let Some(subreddit) = subject.get_str("subreddit") {
            if targeting.subreddits.contains(&subreddit.to_lowercase()) {
                return true;
            }
        }
    }

    if !targeting.subdomains.is_empty() {
        if let Some(subdomain) = subject.get_str("subdomain") {
            if targeting.subdomains.contains(&subdomain.to_lowercase()) {
                return true;
            }
        }
    }

    if !targeting.oauth_clients.is_empty() {
        if let Some(client) = subject.get_str("oauth_client") {
            if targeting.oauth_clients.contains(&client.to_lowercase()) {
                return true;
            }
        }
    }

    false
}

fn is_percent_enabled(name: &str, payload: &FeatureFlagPayload, subject: &Subject) -> bool {
    let Some(user_id) = subject.get_str("user_id") else {
        return false;
    };

    let logged_in = subject.get_bool("logged_in").unwrap_or(false);
    let percentage = if logged_in {
        payload.percent_logged_in
    } else {
        payload.percent_logged_out
    };

    if percentage <= 0 {
        return false;
    }
    if percentage >= 100 {
        return true;
    }

    let seed = payload.seed.as_deref().unwrap_or(name);
    let bucket = hasher::bucket(seed, &user_id);
    let scaled_percent = bucket as f64 / (hasher::NUM_BUCKETS as f64 / 100.0);
    scaled_percent < percentage as f64
}
