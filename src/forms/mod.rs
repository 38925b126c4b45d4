mod rating;
mod registration;

pub use rating::*;
pub use registration::*;
