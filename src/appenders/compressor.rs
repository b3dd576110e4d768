//! Background gzip compression of rotated log files
//!
//! Rotation only renames files; the expensive compression runs on a separate
//! thread so the drain worker keeps delivering events. A rotated file
//! `app.log.1` becomes `app.log.1.gz`, and the original is removed only after
//! the compressed copy is complete.

use crate::core::diagnostics::{DiagnosticKind, Diagnostics};
use crate::core::error::{LoggerError, Result};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const COMPRESS_THREAD_NAME: &str = "richlog-compress";
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

pub struct Compressor {
    jobs: Option<Sender<PathBuf>>,
    pending: Arc<Pending>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Compressor {
    /// Start the compression thread. Failures are reported to `diagnostics`.
    pub fn start(diagnostics: Arc<Diagnostics>) -> Result<Self> {
        let (jobs, receiver) = unbounded::<PathBuf>();
        let pending = Arc::new(Pending::default());
        let worker_pending = Arc::clone(&pending);

        let handle = thread::Builder::new()
            .name(COMPRESS_THREAD_NAME.to_string())
            .spawn(move || {
                for path in receiver {
                    if let Err(e) = compress_file(&path) {
                        diagnostics.report(DiagnosticKind::Compression, e.to_string());
                    }
                    let mut count = worker_pending.count.lock();
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        worker_pending.idle.notify_all();
                    }
                }
            })
            .map_err(|e| {
                LoggerError::io_operation("starting compressor", "thread spawn failed", e)
            })?;

        Ok(Self {
            jobs: Some(jobs),
            pending,
            handle: Some(handle),
        })
    }

    /// Queue `path` for compression.
    pub fn submit(&self, path: PathBuf) -> Result<()> {
        let Some(ref jobs) = self.jobs else {
            return Err(LoggerError::compression(
                path.display().to_string(),
                "compressor is stopped",
            ));
        };

        *self.pending.count.lock() += 1;
        jobs.send(path).map_err(|e| {
            let mut count = self.pending.count.lock();
            *count = count.saturating_sub(1);
            LoggerError::compression(e.0.display().to_string(), "compressor thread has exited")
        })
    }

    /// Jobs queued or in progress.
    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    /// Hold the compressor busy without a job.
    #[cfg(test)]
    pub(crate) fn set_held(&self, held: bool) {
        let mut count = self.pending.count.lock();
        if held {
            *count += 1;
        } else {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.pending.idle.notify_all();
            }
        }
    }

    /// Wait until every submitted job has finished. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.pending.count.lock();
        while *count > 0 {
            if self.pending.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

impl Drop for Compressor {
    fn drop(&mut self) {
        // Closing the channel lets the thread finish queued jobs and exit
        drop(self.jobs.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// `path` with `suffix` appended to its file name.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Compress a log file with transactional safety using streaming I/O
///
/// The compressed data is written to `<path>.gz.tmp` and renamed to
/// `<path>.gz` once complete; the original file is deleted only after that
/// rename succeeded.
pub fn compress_file(path: &Path) -> Result<PathBuf> {
    let gz_path = with_suffix(path, ".gz");
    let temp_gz_path = with_suffix(path, ".gz.tmp");

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, input);

    let output = File::create(&temp_gz_path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!(
                "Failed to create temporary compressed file: {}",
                temp_gz_path.display()
            ),
            e,
        )
    })?;
    let mut encoder = flate2::write::GzEncoder::new(
        BufWriter::with_capacity(CHUNK_SIZE, output),
        flate2::Compression::default(),
    );

    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| {
            let _ = fs::remove_file(&temp_gz_path);
            LoggerError::io_operation(
                "compress log file",
                format!("Failed to read from file: {}", path.display()),
                e,
            )
        })?;
        if bytes_read == 0 {
            break;
        }
        encoder.write_all(&buffer[..bytes_read]).map_err(|e| {
            let _ = fs::remove_file(&temp_gz_path);
            LoggerError::io_operation("compress log file", "Failed to compress data chunk", e)
        })?;
    }

    encoder
        .finish()
        .and_then(|mut writer| writer.flush())
        .map_err(|e| {
            let _ = fs::remove_file(&temp_gz_path);
            LoggerError::io_operation("compress log file", "Failed to finish compression", e)
        })?;

    fs::rename(&temp_gz_path, &gz_path).map_err(|e| {
        let _ = fs::remove_file(&temp_gz_path);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz_path.display()),
            e,
        )
    })?;

    // The compressed copy is complete; a leftover original is removed on a
    // later rotation.
    fs::remove_file(path).map_err(|e| {
        LoggerError::compression(
            path.display().to_string(),
            format!("compressed, but the original could not be removed: {}", e),
        )
    })?;

    Ok(gz_path)
}
