//! Query templates
//!
//! Templates are JSON (document query) or SQL text with a small embedded
//! language:
//!
//! ```text
//! {
//!   "size": 0,
//!   "query": { "bool": { "filter": [
//!     { "term": { "appId": {{appId}} } }
//!     {{#os}}, { "term": { "os": {{os}} } }{{/os}}
//!   ] } },
//!   "aggs": { "groupby": { "composite": {
//!     {{#afterKey}}"after": {{afterKey}},{{/afterKey}}
//!     "sources": {{rawSources}}
//!   } } }
//! }
//! ```
//!
//! Compilation runs in two passes: [`resolve_blocks`] evaluates the
//! `{{#flag}}...{{/flag}}` blocks, then [`substitute`] replaces `{{name}}`
//! placeholders using a lookup table.

pub mod blocks;
pub mod params;
pub mod store;

pub use blocks::resolve_blocks;
pub use params::{is_raw_param, render_value, substitute, QuoteStyle};
pub use store::{FileTemplateStore, InMemoryTemplates, TemplateSource};
