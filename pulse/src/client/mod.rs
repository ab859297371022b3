//! Clients for the document search engine

pub mod connection;
pub mod lookup;
pub mod search;

pub use connection::Connection;
pub use lookup::{get_by_id, get_from_any, search_by_id, DocumentStore, LookupClient};
pub use search::SearchClient;
