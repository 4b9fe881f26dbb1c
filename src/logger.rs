//! Pluggable logging seam (§9 "logger" plug-in point, §10.A).
//!
//! The crate logs through the `log` facade by default; this trait exists so
//! a caller can redirect or silence logging without touching call sites,
//! mirroring the source's `console_logger`/`without_logger` split.

pub trait Logger: std::fmt::Debug {
    fn debug(&self, msg: &str) {
        log::debug!("{msg}");
    }

    fn info(&self, msg: &str) {
        log::info!("{msg}");
    }

    fn warn(&self, msg: &str) {
        log::warn!("{msg}");
    }

    fn error(&self, msg: &str) {
        log::error!("{msg}");
    }
}

/// Forwards to the `log` facade (the default).
#[derive(Debug, Default)]
pub struct LogFacadeLogger;

impl Logger for LogFacadeLogger {}

/// Drops every message (mirrors `without_logger.hpp`).
#[derive(Debug, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn debug(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}
