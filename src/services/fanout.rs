use uuid::Uuid;

use crate::cache::{CacheStore, QueryKey};
use crate::cache::embedded;
use crate::models::CompanyPatch;

/// Merge `patch` over every embedded copy of the company, in every entry
/// that holds one. Entries whose copies already match are left alone, so
/// applying the same patch twice writes nothing the second time.
///
/// Returns the keys of the entries that were rewritten.
pub fn apply_to_all_referencing_entries(
    store: &CacheStore,
    company_id: Uuid,
    patch: &CompanyPatch,
) -> Vec<QueryKey> {
    let changed = store.update_entries(|entry| {
        if !entry.embeds(company_id) {
            return None;
        }

        let mut payload = (*entry.payload).clone();
        let mut changed = false;
        for reference in entry.refs_to(company_id) {
            changed |= embedded::merge_at(&mut payload, &reference.pointer, patch.fields());
        }
        changed.then_some(payload)
    });

    tracing::debug!(
        company_id = %company_id,
        entries = changed.len(),
        "company patch fanned out"
    );
    changed
}
