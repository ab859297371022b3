pub mod flatten;
pub mod lookup;
pub mod query;

pub use flatten::run_flatten;
pub use lookup::run_get;
pub use query::{run_batch, run_query, run_render, QueryMode};
