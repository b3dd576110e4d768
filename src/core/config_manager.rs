//! Atomically swappable configuration
//!
//! Readers take a snapshot with one atomic load and never block. Writers are
//! serialized by a mutex, build the next [`Configuration`] from a copy of the
//! current one, stamp it with a new generation and swap it in.

use super::config::{Configuration, ConsoleConfig, FileConfig, PipelineConfig, ROOT_LOGGER_NAME};
use super::diagnostics::{DiagnosticKind, Diagnostics};
use super::log_level::LogLevel;
use super::properties::{self, ConfigReport, ConfigStatus};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub struct ConfigurationManager {
    current: ArcSwap<Configuration>,
    generation: AtomicU32,
    write_lock: Mutex<()>,
    diagnostics: Arc<Diagnostics>,
}

impl ConfigurationManager {
    pub fn new(mut initial: Configuration, diagnostics: Arc<Diagnostics>) -> Self {
        initial.generation = 0;
        Self {
            current: ArcSwap::from_pointee(initial),
            generation: AtomicU32::new(0),
            write_lock: Mutex::new(()),
            diagnostics,
        }
    }

    /// The published configuration.
    pub fn snapshot(&self) -> Arc<Configuration> {
        self.current.load_full()
    }

    /// Generation of the published configuration.
    ///
    /// A snapshot taken after reading a generation is at least that new.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn level_for(&self, name: &str) -> LogLevel {
        self.current.load().level_for(name)
    }

    /// Apply `change` to a copy of the current configuration and publish it.
    ///
    /// Returns the new generation.
    pub fn update<F>(&self, change: F) -> u32
    where
        F: FnOnce(&mut Configuration),
    {
        let _guard = self.write_lock.lock();
        let mut next = Configuration::clone(&self.current.load());
        change(&mut next);
        self.publish(next)
    }

    /// Publish `configuration` as a whole.
    pub fn replace(&self, configuration: Configuration) -> u32 {
        let _guard = self.write_lock.lock();
        self.publish(configuration)
    }

    pub fn set_root_level(&self, level: LogLevel) -> u32 {
        self.update(|config| config.root_level = level)
    }

    /// Set the threshold of one logger; `"ROOT"` sets the root level.
    pub fn set_logger_level(&self, name: &str, level: LogLevel) -> u32 {
        if name == ROOT_LOGGER_NAME {
            return self.set_root_level(level);
        }
        self.update(|config| {
            config.logger_levels.insert(name.to_string(), level);
        })
    }

    /// Remove a logger override so it follows the root level again.
    pub fn clear_logger_level(&self, name: &str) -> u32 {
        self.update(|config| {
            config.logger_levels.remove(name);
        })
    }

    pub fn set_console_config(&self, console: ConsoleConfig) -> u32 {
        self.update(|config| config.console = console)
    }

    pub fn set_file_config(&self, file: FileConfig) -> u32 {
        self.update(|config| config.file = file)
    }

    pub fn set_pipeline_config(&self, pipeline: PipelineConfig) -> u32 {
        self.update(|config| config.pipeline = pipeline)
    }

    /// Translate flat properties into a new snapshot.
    ///
    /// Skipped and failed entries are reported to diagnostics. Nothing is
    /// published when no entry applied.
    pub fn apply_properties<I, K, V>(&self, props: I) -> ConfigReport
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let _guard = self.write_lock.lock();
        let mut next = Configuration::clone(&self.current.load());
        let report = properties::apply_properties(&mut next, props);
        report_problems(&report, &self.diagnostics);

        if report.applied_count() > 0 {
            self.publish(next);
        }
        report
    }

    /// Caller holds `write_lock`.
    fn publish(&self, mut next: Configuration) -> u32 {
        let generation = self.generation.load(Ordering::Relaxed).wrapping_add(1);
        next.generation = generation;
        self.current.store(Arc::new(next));
        self.generation.store(generation, Ordering::Release);
        generation
    }
}

/// Send one configuration diagnostic per skipped or failed entry.
pub(crate) fn report_problems(report: &ConfigReport, diagnostics: &Diagnostics) {
    for outcome in report.problems() {
        let message = match &outcome.status {
            ConfigStatus::Failed { reason } => {
                format!("'{}' failed: {}", outcome.key, reason)
            }
            ConfigStatus::Skipped { reason } => {
                format!("'{}' = '{}' skipped: {}", outcome.key, outcome.value, reason)
            }
            _ => continue,
        };
        diagnostics.report(DiagnosticKind::Configuration, message);
    }
}

impl std::fmt::Debug for ConfigurationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationManager")
            .field("generation", &self.generation())
            .field("current", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::Diagnostic;
    use std::sync::atomic::AtomicU64;

    fn manager() -> ConfigurationManager {
        ConfigurationManager::new(Configuration::default(), Arc::new(Diagnostics::new()))
    }

    #[test]
    fn test_updates_bump_generation() {
        let manager = manager();
        assert_eq!(manager.generation(), 0);

        let g1 = manager.set_root_level(LogLevel::Debug);
        let g2 = manager.set_logger_level("net", LogLevel::Trace);
        assert!(g2 > g1);
        assert_eq!(manager.generation(), g2);

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.generation, g2);
        assert_eq!(snapshot.root_level, LogLevel::Debug);
        assert_eq!(manager.level_for("net"), LogLevel::Trace);
    }

    #[test]
    fn test_old_snapshot_is_unchanged() {
        let manager = manager();
        let before = manager.snapshot();
        manager.set_root_level(LogLevel::Error);
        assert_eq!(before.root_level, LogLevel::Info);
        assert_eq!(manager.snapshot().root_level, LogLevel::Error);
    }

    #[test]
    fn test_root_name_sets_root_level() {
        let manager = manager();
        manager.set_logger_level(ROOT_LOGGER_NAME, LogLevel::Warn);
        assert_eq!(manager.snapshot().root_level, LogLevel::Warn);
        assert!(manager.snapshot().logger_levels.is_empty());
    }

    #[test]
    fn test_clear_logger_level() {
        let manager = manager();
        manager.set_logger_level("db", LogLevel::Trace);
        manager.clear_logger_level("db");
        assert_eq!(manager.level_for("db"), LogLevel::Info);
    }

    #[test]
    fn test_apply_properties_reports_skipped_entries() {
        let reported = Arc::new(AtomicU64::new(0));
        let reported_clone = Arc::clone(&reported);
        let diagnostics = Arc::new(Diagnostics::with_sink(Arc::new(move |d: &Diagnostic| {
            assert_eq!(d.kind, DiagnosticKind::Configuration);
            reported_clone.fetch_add(1, Ordering::Relaxed);
        })));
        let manager = ConfigurationManager::new(Configuration::default(), diagnostics);

        let report = manager.apply_properties([
            ("richlog.rootLevel", "ERROR"),
            ("richlog.batch.size", "lots"),
        ]);

        assert_eq!(report.applied_count(), 1);
        assert_eq!(reported.load(Ordering::Relaxed), 1);
        assert_eq!(manager.snapshot().root_level, LogLevel::Error);
        assert_eq!(manager.generation(), 1);
    }

    #[test]
    fn test_apply_properties_without_changes_keeps_generation() {
        let manager = manager();
        manager.apply_properties([("unrelated", "1")]);
        assert_eq!(manager.generation(), 0);
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let manager = Arc::new(manager());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        manager.set_logger_level(&format!("t{}.{}", i, j), LogLevel::Debug);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(manager.generation(), 400);
        assert_eq!(manager.snapshot().logger_levels.len(), 400);
    }
}
