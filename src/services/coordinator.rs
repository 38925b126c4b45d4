//! Optimistic rating mutations.
//!
//! A mutation moves `Idle -> Pending -> Reconciled | RolledBack`. While it is
//! pending every cached copy of the company shows a provisional aggregate.
//! The backend's answer replaces it on success; on failure the copies taken
//! at `begin` are put back. Only the rated company's copies are touched, so
//! mutations of different companies never interfere, even inside one list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::{embedded, CacheStore, QueryKey};
use crate::connectors::{ConnectorError, DataGateway};
use crate::forms::RatingForm;
use crate::models::{
    CompanyAggregate, CompanyPatch, Rating, RatingValidationError, UserRating,
};
use crate::services::aggregator::{provisional_aggregate, submission_score};
use crate::services::fanout::apply_to_all_referencing_entries;
use crate::services::notifier::Notifier;

pub const SUCCESS_MESSAGE: &str = "Rating submitted successfully!";
pub const FAILURE_MESSAGE: &str = "Failed to submit rating. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub struct RatingSubmission {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub rating: Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Pending,
    Reconciled,
    RolledBack,
}

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("rating was not saved: {0}")]
    Connector(#[from] ConnectorError),
    #[error("invalid rating: {0}")]
    Validation(#[from] RatingValidationError),
}

/// Copies of one company, per entry and pointer, as they were before a mutation.
#[derive(Debug, Default)]
struct CompanySnapshot {
    company_id: Uuid,
    entries: HashMap<QueryKey, Vec<(String, Value)>>,
}

impl CompanySnapshot {
    fn capture(store: &CacheStore, company_id: Uuid) -> Self {
        let entries = store
            .entries_embedding(company_id)
            .into_iter()
            .map(|entry| {
                let copies = entry
                    .refs_to(company_id)
                    .filter_map(|r| {
                        entry
                            .payload
                            .pointer(&r.pointer)
                            .map(|copy| (r.pointer.clone(), copy.clone()))
                    })
                    .collect();
                (entry.key, copies)
            })
            .collect();

        Self {
            company_id,
            entries,
        }
    }

    /// Aggregate as the cache currently shows it, from any copy.
    fn aggregate(&self) -> Option<CompanyAggregate> {
        self.entries
            .values()
            .flatten()
            .find_map(|(_, copy)| serde_json::from_value(copy.clone()).ok())
    }

    /// Put every snapshotted copy back. Entries removed in the meantime stay
    /// removed. When an entry was reshaped by a refresh the copies are matched
    /// by pointer first, then by company id.
    fn restore(&self, store: &CacheStore) -> Vec<QueryKey> {
        store.update_entries(|entry| {
            let copies = self.entries.get(&entry.key)?;
            let fallback = &copies.first()?.1;

            let mut payload = (*entry.payload).clone();
            let mut changed = false;
            for reference in entry.refs_to(self.company_id) {
                let original = copies
                    .iter()
                    .find(|(pointer, _)| *pointer == reference.pointer)
                    .map(|(_, copy)| copy)
                    .unwrap_or(fallback);
                changed |= embedded::replace_at(&mut payload, &reference.pointer, original);
            }
            changed.then_some(payload)
        })
    }
}

type Slots = Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>;

/// Holds a company's slot. Releasing the last holder drops the slot from the map.
struct SlotGuard {
    slots: Slots,
    company_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        drop(guard);
        // waiters hold their own clone of the slot
        if slots
            .get(&self.company_id)
            .map_or(false, |slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.company_id);
        }
    }
}

/// Runs rating mutations against the cache and the backend.
pub struct RatingCoordinator {
    store: Arc<CacheStore>,
    gateway: Arc<dyn DataGateway>,
    notifier: Arc<dyn Notifier>,
    slots: Slots,
}

impl RatingCoordinator {
    pub fn new(
        store: Arc<CacheStore>,
        gateway: Arc<dyn DataGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn acquire(&self, company_id: Uuid) -> SlotGuard {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(company_id)
            .or_default()
            .clone();

        SlotGuard {
            slots: self.slots.clone(),
            company_id,
            guard: Some(slot.lock_owned().await),
        }
    }

    /// `Pending` while a mutation for the company holds its slot.
    pub fn state_of(&self, company_id: Uuid) -> MutationState {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(&company_id) {
            Some(slot) if slot.try_lock().is_err() => MutationState::Pending,
            _ => MutationState::Idle,
        }
    }

    /// Apply the provisional aggregate and hand back the pending mutation.
    ///
    /// Waits for any earlier mutation of the same company to finish first.
    /// The user's current rating is read from the cache while that entry is
    /// live and from the backend otherwise. A failed lookup ends the mutation
    /// before the cache is touched. No write has been sent when this returns.
    ///
    /// Re-rating keeps the review count: the provisional mean swaps the old
    /// score for the new one instead of counting a second review.
    pub async fn begin(
        &self,
        submission: RatingSubmission,
    ) -> Result<RatingMutation, MutationError> {
        let slot = self.acquire(submission.company_id).await;

        let existing = match self
            .existing_rating(submission.user_id, submission.company_id)
            .await
        {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!(
                    company_id = %submission.company_id,
                    user_id = %submission.user_id,
                    error = %err,
                    "could not resolve existing rating"
                );
                self.notifier.error(FAILURE_MESSAGE);
                return Err(err.into());
            }
        };
        let snapshot = CompanySnapshot::capture(&self.store, submission.company_id);

        let provisional = snapshot.aggregate().map(|current| {
            let previous = existing.as_ref().map(|r| submission_score(&r.rating));
            provisional_aggregate(current, submission_score(&submission.rating), previous)
        });

        if let Some(aggregate) = provisional {
            apply_to_all_referencing_entries(
                &self.store,
                submission.company_id,
                &CompanyPatch::from(aggregate),
            );
        }

        tracing::info!(
            company_id = %submission.company_id,
            user_id = %submission.user_id,
            entries = snapshot.entries.len(),
            update = existing.is_some(),
            provisional = ?provisional,
            "rating mutation pending"
        );

        Ok(RatingMutation {
            store: self.store.clone(),
            gateway: self.gateway.clone(),
            notifier: self.notifier.clone(),
            existing_rating_id: existing.map(|r| r.id),
            submission,
            snapshot,
            provisional,
            state: MutationState::Pending,
            _slot: slot,
        })
    }

    pub async fn submit(
        &self,
        submission: RatingSubmission,
    ) -> Result<CompanyAggregate, MutationError> {
        self.begin(submission).await?.commit().await
    }

    /// Validate a form, then submit it. Invalid forms never reach the cache.
    pub async fn submit_form(
        &self,
        user_id: Uuid,
        company_id: Uuid,
        form: RatingForm,
    ) -> Result<CompanyAggregate, MutationError> {
        let rating = Rating::try_from(form)?;
        self.submit(RatingSubmission {
            user_id,
            company_id,
            rating,
        })
        .await
    }

    async fn existing_rating(
        &self,
        user_id: Uuid,
        company_id: Uuid,
    ) -> Result<Option<UserRating>, ConnectorError> {
        let cached = self
            .store
            .get(&QueryKey::user_rating(user_id, company_id))
            .filter(|entry| !entry.invalidated)
            .and_then(|entry| {
                serde_json::from_value::<Option<UserRating>>((*entry.payload).clone()).ok()
            });
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let span = tracing::info_span!(
            "fetch_user_rating",
            company_id = %company_id,
            user_id = %user_id
        );
        self.gateway
            .fetch_user_rating(user_id, company_id)
            .instrument(span)
            .await
    }
}

/// A rating mutation whose provisional update is already in the cache.
///
/// Dropping it uncommitted restores the snapshot, then frees the company's slot.
pub struct RatingMutation {
    store: Arc<CacheStore>,
    gateway: Arc<dyn DataGateway>,
    notifier: Arc<dyn Notifier>,
    submission: RatingSubmission,
    existing_rating_id: Option<Uuid>,
    snapshot: CompanySnapshot,
    provisional: Option<CompanyAggregate>,
    state: MutationState,
    _slot: SlotGuard,
}

impl RatingMutation {
    pub fn state(&self) -> MutationState {
        self.state
    }

    /// `None` when no cached entry held the company.
    pub fn provisional(&self) -> Option<CompanyAggregate> {
        self.provisional
    }

    pub fn existing_rating_id(&self) -> Option<Uuid> {
        self.existing_rating_id
    }

    /// Send the rating and settle the cache on the backend's answer.
    pub async fn commit(mut self) -> Result<CompanyAggregate, MutationError> {
        let user_id = self.submission.user_id;
        let company_id = self.submission.company_id;

        let span = tracing::info_span!(
            "submit_rating",
            company_id = %company_id,
            user_id = %user_id,
            update = self.existing_rating_id.is_some()
        );
        let result = self
            .gateway
            .submit_rating(user_id, company_id, &self.submission.rating, self.existing_rating_id)
            .instrument(span)
            .await;

        match result {
            Ok(aggregate) => {
                apply_to_all_referencing_entries(
                    &self.store,
                    company_id,
                    &CompanyPatch::from(aggregate),
                );
                self.store.invalidate(&QueryKey::user_rating(user_id, company_id));
                self.state = MutationState::Reconciled;
                tracing::info!(
                    company_id = %company_id,
                    overall_rating = aggregate.overall_rating,
                    total_reviews = aggregate.total_reviews,
                    "rating mutation reconciled"
                );
                self.notifier.success(SUCCESS_MESSAGE);
                Ok(aggregate)
            }
            Err(err) => {
                self.rollback();
                tracing::warn!(company_id = %company_id, error = %err, "rating mutation rolled back");
                self.notifier.error(FAILURE_MESSAGE);
                Err(err.into())
            }
        }
    }

    fn rollback(&mut self) {
        let restored = self.snapshot.restore(&self.store);
        self.state = MutationState::RolledBack;
        tracing::debug!(
            company_id = %self.submission.company_id,
            entries = restored.len(),
            "company copies restored"
        );
    }
}

impl Drop for RatingMutation {
    fn drop(&mut self) {
        if self.state == MutationState::Pending {
            tracing::warn!(
                company_id = %self.submission.company_id,
                "rating mutation dropped before commit"
            );
            self.rollback();
        }
    }
}
