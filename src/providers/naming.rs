//! Stable names for external resources.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::controller::error::{Error, Result};

/// Maximum length of a generated snapshot name.
pub const MAX_SNAPSHOT_NAME_LEN: usize = 40;

/// Length of the `-YYYYMMDDHHMMSS` suffix.
const TIMESTAMP_SUFFIX_LEN: usize = 15;

/// Derive the external snapshot name for a snapshot request.
///
/// The name is `<name>-<namespace>-<YYYYMMDDHHMMSS>` of the object's creation
/// time in UTC. Only metadata that never changes over the object's lifetime
/// is used, so every reconciliation derives the same name.
pub fn snapshot_name(meta: &ObjectMeta) -> Result<String> {
    let name = meta
        .name
        .as_deref()
        .ok_or_else(|| Error::MissingField("metadata.name".to_string()))?;
    let namespace = meta.namespace.as_deref().unwrap_or("default");
    let created = meta
        .creation_timestamp
        .as_ref()
        .ok_or_else(|| Error::Validation("snapshot has no creation timestamp".to_string()))?;

    let timestamp = created.0.format("%Y%m%d%H%M%S").to_string();
    let mut prefix = sanitize(&format!("{}-{}", name, namespace));
    prefix.truncate(MAX_SNAPSHOT_NAME_LEN - TIMESTAMP_SUFFIX_LEN);
    let prefix = prefix.trim_end_matches('-');

    if prefix.is_empty() {
        return Err(Error::Validation(format!(
            "cannot derive a snapshot name from {}/{}",
            namespace, name
        )));
    }

    Ok(format!("{}-{}", prefix, timestamp))
}

/// Lowercase, map anything but ASCII alphanumerics to `-` and collapse runs.
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    out
}
