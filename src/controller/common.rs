//! Shared controller helpers.
//!
//! Finalizer bookkeeping on object metadata, used by the provisioner and the
//! RedisCluster controller.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Finalizer guarding deletion of RedisCluster resources.
pub const FINALIZER: &str = "cloudcache.smoketurner.com/finalizer";

/// Check if the finalizer is present.
pub fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Add a finalizer to the metadata. Returns true if it was not present.
pub fn add_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    let finalizers = meta.finalizers.get_or_insert_with(Vec::new);

    // Only add if not already present
    if finalizers.iter().any(|f| f == finalizer) {
        return false;
    }
    finalizers.push(finalizer.to_string());
    true
}

/// Remove a finalizer from the metadata. Returns true if it was present.
pub fn remove_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };

    match finalizers.iter().position(|f| f == finalizer) {
        Some(pos) => {
            finalizers.remove(pos);
            true
        }
        None => false,
    }
}

/// Namespace of an object, defaulting to "default".
pub fn namespace_of(meta: &ObjectMeta) -> String {
    meta.namespace
        .clone()
        .unwrap_or_else(|| "default".to_string())
}
