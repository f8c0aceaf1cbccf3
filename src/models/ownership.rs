use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

use super::job::JobInfo;
use super::source::Source;

pub const META_KEY_OPS: &str = "nomadops";
pub const META_KEY_SRC_ID: &str = "nomadopssrcid";
pub const META_KEY_SRC_URL: &str = "nomadopssrcurl";
pub const META_KEY_SRC_COMMIT: &str = "nomadopssrccommit";
pub const META_KEY_FORCE_RESTART: &str = "nomadopsforcerestart";

const OWNED: &str = "true";

/// Metadata that claims a namespace for this controller.
pub fn namespace_meta() -> HashMap<String, String> {
    let mut meta = HashMap::new();
    meta.insert(META_KEY_OPS.to_string(), OWNED.to_string());
    meta
}

/// Returns the job's metadata with the ownership keys of `source` set.
///
/// The restart nonce is only written when a restart was requested; it exists
/// purely so that Nomad sees a diff and rolls the job.
pub fn claim(
    source: &Source,
    job: &JobInfo,
    restart: bool,
    now: DateTime<Utc>,
) -> HashMap<String, String> {
    let mut meta = job.job.meta.clone().unwrap_or_default();

    meta.insert(META_KEY_OPS.to_string(), OWNED.to_string());
    meta.insert(META_KEY_SRC_URL.to_string(), source.url.clone());
    meta.insert(META_KEY_SRC_ID.to_string(), source.id.clone());
    meta.insert(
        META_KEY_SRC_COMMIT.to_string(),
        job.git_info.git_commit.clone(),
    );

    if restart {
        meta.insert(
            META_KEY_FORCE_RESTART.to_string(),
            now.to_rfc3339_opts(SecondsFormat::Nanos, true),
        );
    }

    meta
}

/// A job belongs to a source only if it carries the marker and that source's id.
pub fn is_owned_by(meta: Option<&HashMap<String, String>>, source_id: &str) -> bool {
    match meta {
        Some(meta) if !meta.is_empty() => {
            meta.get(META_KEY_OPS).map(String::as_str) == Some(OWNED)
                && meta.get(META_KEY_SRC_ID).map(String::as_str) == Some(source_id)
        }
        _ => false,
    }
}

/// Name of a metadata key as it shows up in a Nomad job diff.
pub fn meta_field_name(key: &str) -> String {
    format!("Meta[{}]", key)
}
