//! Logger cache keyed by name

use super::config::ROOT_LOGGER_NAME;
use super::log_manager::Backend;
use super::logger::Logger;
use dashmap::DashMap;
use std::sync::Arc;

/// Hands out one shared [`Logger`] per name.
///
/// Concurrent lookups of a new name race through the map's entry API, so
/// every caller receives the same instance. The root logger is held outside
/// the map and survives [`reset`](Self::reset).
pub struct LoggerRegistry {
    backend: Arc<Backend>,
    root: Arc<Logger>,
    loggers: DashMap<Arc<str>, Arc<Logger>>,
}

impl LoggerRegistry {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        let root = Arc::new(Logger::new(Arc::from(ROOT_LOGGER_NAME), Arc::clone(&backend)));
        Self {
            backend,
            root,
            loggers: DashMap::new(),
        }
    }

    /// The logger called `name`, created on first use.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn get_logger(&self, name: &str) -> Arc<Logger> {
        assert!(!name.is_empty(), "logger name must not be empty");

        if name == ROOT_LOGGER_NAME {
            return Arc::clone(&self.root);
        }
        if let Some(logger) = self.loggers.get(name) {
            return Arc::clone(logger.value());
        }

        let logger = self
            .loggers
            .entry(Arc::from(name))
            .or_insert_with(|| Arc::new(Logger::new(Arc::from(name), Arc::clone(&self.backend))));
        Arc::clone(logger.value())
    }

    pub fn root_logger(&self) -> Arc<Logger> {
        Arc::clone(&self.root)
    }

    pub fn exists(&self, name: &str) -> bool {
        name == ROOT_LOGGER_NAME || self.loggers.contains_key(name)
    }

    /// Cached loggers, not counting the root.
    pub fn count(&self) -> usize {
        self.loggers.len()
    }

    /// Forget every cached logger. Handles already given out keep working.
    pub fn reset(&self) {
        self.loggers.clear();
    }

    pub fn loggers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .loggers
            .iter()
            .map(|entry| entry.key().to_string())
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("count", &self.count())
            .finish()
    }
}
