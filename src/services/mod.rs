pub mod aggregator;
pub mod auth;
pub mod catalog;
pub mod clicks;
pub mod coordinator;
pub mod fanout;
pub mod notifier;

pub use auth::{classify_auth_error, register, AuthError, AuthErrorKind};
pub use catalog::{DealQuery, DealSort, DealsPage};
pub use clicks::{BrowserOpener, ClickOutcome, ClickTracker, LinkOpener, OpenLinkError};
pub use coordinator::{
    MutationError, MutationState, RatingCoordinator, RatingMutation, RatingSubmission,
};
pub use fanout::apply_to_all_referencing_entries;
pub use notifier::{Notification, Notifier, RecordingNotifier, TracingNotifier};
