// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! User-facing diagnostic lines.
//!
//! Lines are written whole under a lock, so concurrent units never
//! interleave partial output. Every line is mirrored to `tracing` under
//! this module's target (`jury::report`); a front end that already shows the
//! printed lines can turn that target off.

use parking_lot::Mutex;
use std::io::Write;

/// Where printed lines go
#[derive(Debug)]
pub enum Sink {
    /// Process stdout
    Stdout,
    /// Process stderr
    Stderr,
    /// In-memory buffer, readable through [`Printer::lines`]
    Buffer(Vec<String>),
}

/// Diagnostic printer shared by all units of a batch.
#[derive(Debug)]
pub struct Printer {
    verbose: bool,
    show_progress: bool,
    sink: Mutex<Sink>,
}

impl Printer {
    /// Printer writing to stdout
    pub fn new(verbose: bool, show_progress: bool) -> Self {
        Self::with_sink(verbose, show_progress, Sink::Stdout)
    }

    /// Printer writing to the given sink
    pub fn with_sink(verbose: bool, show_progress: bool, sink: Sink) -> Self {
        Self {
            verbose,
            show_progress,
            sink: Mutex::new(sink),
        }
    }

    /// Printer collecting lines in memory
    pub fn buffered(verbose: bool, show_progress: bool) -> Self {
        Self::with_sink(verbose, show_progress, Sink::Buffer(Vec::new()))
    }

    /// Whether verbose lines are printed
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Line printed only in verbose mode
    pub fn verbose(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::debug!("{}", line);
        if self.verbose {
            self.write(line);
        }
    }

    /// Progress notice (retries), printed in verbose or progress mode
    pub fn notice(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::warn!("{}", line);
        if self.verbose || self.show_progress {
            self.write(line);
        }
    }

    /// Error line, always printed
    pub fn error(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::error!("{}", line);
        self.write(line);
    }

    /// Lines collected so far (empty unless buffered)
    pub fn lines(&self) -> Vec<String> {
        match &*self.sink.lock() {
            Sink::Buffer(lines) => lines.clone(),
            _ => Vec::new(),
        }
    }

    /// Buffered output joined with newlines
    pub fn output(&self) -> String {
        self.lines().join("\n")
    }

    fn write(&self, line: &str) {
        let mut sink = self.sink.lock();
        // A closed pipe must not take the batch down.
        match &mut *sink {
            Sink::Stdout => {
                let _ = writeln!(std::io::stdout().lock(), "{}", line);
            }
            Sink::Stderr => {
                let _ = writeln!(std::io::stderr().lock(), "{}", line);
            }
            Sink::Buffer(lines) => lines.push(line.to_string()),
        }
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new(false, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_quiet() {
        let printer = Printer::buffered(false, false);
        printer.verbose("detail");
        printer.notice("Failed attempt 1");
        printer.error("Exception in worker");
        assert_eq!(printer.lines(), vec!["Exception in worker"]);
    }

    #[test]
    fn test_progress_shows_notices() {
        let printer = Printer::buffered(false, true);
        printer.verbose("detail");
        printer.notice("Failed attempt 1");
        assert_eq!(printer.lines(), vec!["Failed attempt 1"]);
    }

    #[test]
    fn test_verbose_shows_everything() {
        let printer = Printer::buffered(true, false);
        printer.verbose("detail");
        printer.notice("notice");
        printer.error("error");
        assert_eq!(printer.output(), "detail\nnotice\nerror");
        assert!(printer.is_verbose());
    }

    #[test]
    fn test_stdout_has_no_lines() {
        let printer = Printer::new(false, false);
        assert!(printer.lines().is_empty());
    }
}
