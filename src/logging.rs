//! Registro en archivo de la actividad de análisis
//!
//! La consola sólo ve la salida redactada de `tracing` que inicializa
//! `main.rs`; el archivo recibe el detalle completo: clasificaciones de
//! fallo con su mensaje técnico sin redactar y los marcadores de sesión.
//! Una línea por evento, apta para grep.

use crate::errors::ErrorClassification;
use chrono::Local;
use lazy_static::lazy_static;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

lazy_static! {
    static ref LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
}

/// Open the log file under the platform data directory and write the
/// session marker
pub fn init_logger() -> anyhow::Result<()> {
    let path = log_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    *LOG_FILE.lock().unwrap() = Some(file);

    write_line(&format!(
        "=== sqlsage session {} ===",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    Ok(())
}

fn log_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("sqlsage").join("sqlsage.log"))
        .unwrap_or_else(|| PathBuf::from("sqlsage.log"))
}

fn write_line(line: &str) {
    let mut guard = LOG_FILE.lock().unwrap();
    if let Some(ref mut file) = *guard {
        let _ = writeln!(file, "{}", line);
        let _ = file.flush();
    }
}

fn format_entry(level: &str, message: &str) -> String {
    format!(
        "[{}] {:<5} {}",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        level,
        message
    )
}

/// Append one leveled entry
pub fn log(level: &str, message: &str) {
    write_line(&format_entry(level, message));
}

/// Record a classified failure for one operation.
///
/// The file keeps the technical message, which may contain credentials or
/// PII; anything user-facing goes through the classification's redacted
/// `user_message` instead.
pub fn log_failure(operation: &str, classification: &ErrorClassification) {
    write_line(&format_entry(
        "ERROR",
        &format_failure(operation, classification),
    ));
}

fn format_failure(operation: &str, classification: &ErrorClassification) -> String {
    format!(
        "{} kind={:?} severity={:?} retryable={} :: {}",
        operation,
        classification.kind,
        classification.severity,
        classification.retryable,
        classification.technical_message
    )
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log("ERROR", &format!($($arg)*));
    };
}
