use super::Error;
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Problem confined to one class or one method
#[derive(Debug)]
pub struct Diagnostic {
    pub class: String,
    /// `None` when the whole class is affected
    pub method: Option<String>,
    pub error: Error,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.method {
            Some(method) => write!(f, "{}: {}", method, self.error),
            None => write!(f, "{}: {}", self.class, self.error),
        }
    }
}

/// What happened to one class
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ClassOutcome {
    /// At least one method now runs natively
    Translated { methods: usize },
    /// Written back unchanged (filtered, nothing translatable, or already translated)
    Unchanged,
    /// Not written at all
    Failed,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ClassEvent {
    pub class: String,
    pub outcome: ClassOutcome,
}

/// Receives an event for every class as soon as it is done
///
/// Called from worker threads, in completion order.
pub trait ProgressListener: Sync {
    fn class_finished(&self, event: &ClassEvent);
}

/// Ignores every event
pub struct SilentProgress;

impl ProgressListener for SilentProgress {
    fn class_finished(&self, _event: &ClassEvent) {}
}

/// Prints ` - name [OK]` lines to standard output
pub struct ConsoleProgress {
    stdout: Mutex<StandardStream>,
}

impl ConsoleProgress {
    pub fn new() -> ConsoleProgress {
        ConsoleProgress {
            stdout: Mutex::new(StandardStream::stdout(ColorChoice::Auto)),
        }
    }

    fn print(&self, event: &ClassEvent) -> io::Result<()> {
        let (color, summary) = match event.outcome {
            ClassOutcome::Translated { .. } => (Color::Green, b"OK".as_ref()),
            ClassOutcome::Unchanged => (Color::Yellow, b"SKIPPED".as_ref()),
            ClassOutcome::Failed => (Color::Red, b"FAILED".as_ref()),
        };

        let mut s = self.stdout.lock();
        s.write_all(b" - ")?;
        s.set_color(ColorSpec::new().set_bold(true))?;
        s.write_all(event.class.as_bytes())?;
        s.set_color(ColorSpec::new().set_dimmed(true))?;
        s.write_all(b" [")?;
        s.set_color(ColorSpec::new().set_fg(Some(color)))?;
        s.write_all(summary)?;
        s.set_color(ColorSpec::new().set_dimmed(true))?;
        s.write_all(b"]\n")?;
        s.reset()
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        ConsoleProgress::new()
    }
}

impl ProgressListener for ConsoleProgress {
    fn class_finished(&self, event: &ClassEvent) {
        if let Err(err) = self.print(event) {
            log::warn!("cannot print progress: {}", err);
        }
    }
}

/// Summary of a whole build
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Classes that now have native methods, with their registration index
    pub translated_classes: Vec<(u32, String)>,
    /// Classes written back without changes
    pub unchanged_classes: Vec<String>,
    /// Classes with no output at all
    pub failed_classes: Vec<String>,
    /// `Owner.name(descriptor)` of every method now running natively
    pub translated_methods: Vec<String>,
    /// Methods left as bytecode on purpose (filtered out, or without code)
    pub skipped_methods: Vec<String>,
    /// Non-class entries copied through
    pub resources: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    /// Log every diagnostic and a one line summary
    pub fn log_summary(&self) {
        for diagnostic in &self.diagnostics {
            if diagnostic.error.is_method_level() {
                log::warn!(target: "jvm2native::report", "{}", diagnostic);
            } else {
                log::error!(target: "jvm2native::report", "{}", diagnostic);
            }
        }
        log::info!(
            target: "jvm2native::report",
            "{} classes translated ({} methods), {} unchanged, {} failed, {} resources copied",
            self.translated_classes.len(),
            self.translated_methods.len(),
            self.unchanged_classes.len(),
            self.failed_classes.len(),
            self.resources
        );
    }

    pub(crate) fn merge(&mut self, other: BuildReport) {
        self.translated_classes.extend(other.translated_classes);
        self.unchanged_classes.extend(other.unchanged_classes);
        self.failed_classes.extend(other.failed_classes);
        self.translated_methods.extend(other.translated_methods);
        self.skipped_methods.extend(other.skipped_methods);
        self.resources += other.resources;
        self.diagnostics.extend(other.diagnostics);
    }

    /// Put lists in a stable order (workers finish in any order)
    pub(crate) fn sort(&mut self) {
        self.translated_classes.sort();
        self.unchanged_classes.sort();
        self.failed_classes.sort();
        self.translated_methods.sort();
        self.skipped_methods.sort();
        self.diagnostics.sort_by(|a, b| (&a.class, &a.method).cmp(&(&b.class, &b.method)));
    }
}
