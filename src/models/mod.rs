mod company;
mod deal;
mod ratecategory;
pub mod rating;

pub use company::*;
pub use deal::*;
pub use rating::*;
pub use ratecategory::*;
