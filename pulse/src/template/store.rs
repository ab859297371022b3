//! Template sources: file-backed with a read-through cache, or in-memory.

use crate::config::TemplateConfig;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Resolves a template file name to its raw text.
pub trait TemplateSource: Send + Sync {
    fn load(&self, name: &str) -> Result<Arc<str>>;
}

/// Loads templates from a root directory, caching contents by name.
pub struct FileTemplateStore {
    root: PathBuf,
    cache_enabled: bool,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl FileTemplateStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cache_enabled: true,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &TemplateConfig) -> Self {
        Self::new(&config.root).with_cache(config.cache)
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drop one cached template so the next load rereads the file.
    pub fn invalidate(&self, name: &str) -> bool {
        self.cache.write().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    fn resolve_path(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(Error::TemplateNotFound(name.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn read(&self, name: &str) -> Result<Arc<str>> {
        let path = self.resolve_path(name)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!("Loaded template {} from {:?}", name, path);
                Ok(Arc::from(content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::TemplateNotFound(name.to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl TemplateSource for FileTemplateStore {
    fn load(&self, name: &str) -> Result<Arc<str>> {
        if !self.cache_enabled {
            return self.read(name);
        }

        if let Some(content) = self.cache.read().get(name) {
            metrics::counter!("pulse_template_cache_hits_total").increment(1);
            return Ok(Arc::clone(content));
        }

        metrics::counter!("pulse_template_cache_misses_total").increment(1);
        let content = self.read(name)?;
        self.cache
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::clone(&content));
        Ok(content)
    }
}

/// Map-backed templates, for templates compiled into the binary and tests.
#[derive(Default)]
pub struct InMemoryTemplates {
    templates: RwLock<HashMap<String, Arc<str>>>,
}

impl InMemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: &str, content: &str) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&self, name: &str, content: &str) {
        self.templates
            .write()
            .insert(name.to_string(), Arc::from(content));
    }
}

impl TemplateSource for InMemoryTemplates {
    fn load(&self, name: &str) -> Result<Arc<str>> {
        self.templates
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_caches_contents() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("count.json"), r#"{"size":0}"#).unwrap();

        let store = FileTemplateStore::new(temp.path());
        assert_eq!(&*store.load("count.json").unwrap(), r#"{"size":0}"#);
        assert_eq!(store.cached_count(), 1);

        // Cached copy survives a change on disk until invalidated
        std::fs::write(temp.path().join("count.json"), r#"{"size":1}"#).unwrap();
        assert_eq!(&*store.load("count.json").unwrap(), r#"{"size":0}"#);
        assert!(store.invalidate("count.json"));
        assert_eq!(&*store.load("count.json").unwrap(), r#"{"size":1}"#);
    }

    #[test]
    fn test_file_store_without_cache() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.json"), "{}").unwrap();

        let store = FileTemplateStore::new(temp.path()).with_cache(false);
        store.load("a.json").unwrap();
        assert_eq!(store.cached_count(), 0);
    }

    #[test]
    fn test_missing_template() {
        let temp = tempdir().unwrap();
        let store = FileTemplateStore::new(temp.path());
        assert!(matches!(
            store.load("nope.json"),
            Err(Error::TemplateNotFound(name)) if name == "nope.json"
        ));
    }

    #[test]
    fn test_rejects_paths_outside_root() {
        let temp = tempdir().unwrap();
        let store = FileTemplateStore::new(temp.path().join("templates"));
        assert!(store.load("../secret.json").is_err());
        assert!(store.load("/etc/passwd").is_err());
        assert!(store.load("").is_err());
    }

    #[test]
    fn test_nested_template_names() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("crash")).unwrap();
        std::fs::write(temp.path().join("crash/top.json"), "{}").unwrap();

        let store = FileTemplateStore::new(temp.path());
        assert_eq!(&*store.load("crash/top.json").unwrap(), "{}");
    }

    #[test]
    fn test_in_memory_templates() {
        let templates = InMemoryTemplates::new().with("q.json", "{}");
        assert_eq!(&*templates.load("q.json").unwrap(), "{}");
        assert!(templates.load("other.json").is_err());
    }
}
