mod client;
mod connector;
mod join;
pub mod mock;
mod types;


pub use client::BackendClient;
pub use connector::DataGateway;
pub use join::join_deals;
pub use mock::MockBackend;
pub use types::{CategoryColumns, SignUpResponse, SubmitRatingRequest, UserRatingRow};
