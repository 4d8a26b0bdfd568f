use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Append-only session log. One line per event, prefixed with a UTC timestamp.
#[derive(Debug)]
pub(crate) struct Logger {
    path: Option<PathBuf>,
    disabled: AtomicBool,
}

impl Logger {
    pub(crate) fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            disabled: AtomicBool::new(false),
        }
    }

    pub(crate) fn log_event(&self, message: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if self.disabled.load(Ordering::Relaxed) {
            return;
        }
        let ts = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let line = format!("{} {}\n", ts, sanitize_log_value(message));
        let mut file = match fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => file,
            Err(err) => {
                self.disable_with_warning(path, &err);
                return;
            }
        };
        if let Err(err) = file.write_all(line.as_bytes()) {
            self.disable_with_warning(path, &err);
        }
    }

    /// Reports a recoverable problem on stderr and records it in the log.
    pub(crate) fn warn(&self, message: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "Warning: {}", message);
        drop(stderr);
        self.log_event(&format!("warning {}", message));
    }

    fn disable_with_warning(&self, path: &Path, err: &std::io::Error) {
        // Keep the shell running, but surface logging failures once and stop retrying.
        if self
            .disabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(
                stderr,
                "Warning: session logging disabled log_path={} io_error={}",
                path.display(),
                err
            );
        }
    }
}

pub(crate) fn sanitize_log_value(value: &str) -> String {
    value
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
