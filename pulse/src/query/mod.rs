//! Query descriptors and the builder that turns them into wire queries.

pub mod builder;
pub mod descriptor;

pub use builder::QueryBuilder;
pub use descriptor::{HttpMethod, QueryDescriptor};
