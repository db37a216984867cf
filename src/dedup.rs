use std::collections::HashSet;

use crate::models::{IdentityKey, NormalizedJob};

/// Identity keys already held by the tracker.
pub type KnownKeys = HashSet<IdentityKey>;

/// Split a batch into the records not yet tracked.
///
/// Order is preserved; when several records in the batch share a key only the
/// first survives. The returned set is `known_keys` plus every key that was
/// let through, so feeding it back into the next call filters those too.
pub fn filter_new(jobs: Vec<NormalizedJob>, mut known_keys: KnownKeys) -> (Vec<NormalizedJob>, KnownKeys) {
    let fresh = jobs
        .into_iter()
        .filter(|job| known_keys.insert(job.identity_key()))
        .collect();
    (fresh, known_keys)
}
