//! Query builder: template store + dynamic blocks + substitution

use crate::query::QueryDescriptor;
use crate::template::{resolve_blocks, substitute, TemplateSource};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::trace;

/// Compiles a [`QueryDescriptor`] into the query string sent on the wire.
#[derive(Clone)]
pub struct QueryBuilder {
    templates: Arc<dyn TemplateSource>,
}

impl QueryBuilder {
    pub fn new(templates: Arc<dyn TemplateSource>) -> Self {
        Self { templates }
    }

    pub fn build(&self, descriptor: &QueryDescriptor) -> Result<String> {
        if descriptor.template_file.trim().is_empty() {
            return Err(Error::Validation {
                field: "templateFile",
            });
        }

        let template = self.templates.load(&descriptor.template_file)?;
        let (params, flags) = descriptor.template_inputs();

        // Line breaks are compacted in template text only; values keep theirs
        let resolved = compact(&resolve_blocks(&template, &flags)?);
        let query = substitute(&resolved, &params);

        trace!("Built {} -> {}", descriptor.template_file, query);
        Ok(query)
    }
}

/// Join template lines into a single line, dropping indentation.
fn compact(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
