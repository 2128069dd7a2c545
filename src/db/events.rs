//! Session event receivers.
//!
//! A [`Session`](crate::db::Session) reports every statement to an
//! [`EventReceiver`]: timings on success, errors on failure. Every method has
//! a no-op default, so a receiver only overrides what it cares about.

use crate::error::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

/// Key/value context attached to an event.
pub type Kvs = BTreeMap<String, String>;

/// Operations slower than this are highlighted.
pub const SLOW_THRESHOLD: Duration = Duration::from_millis(10);

/// Observer of session events.
pub trait EventReceiver: Send + Sync {
    fn event(&self, _name: &str) {}

    fn event_kv(&self, _name: &str, _kvs: &Kvs) {}

    fn event_err(&self, _name: &str, _err: &(dyn Error + 'static)) {}

    fn event_err_kv(&self, _name: &str, _err: &(dyn Error + 'static), _kvs: &Kvs) {}

    fn timing(&self, _name: &str, _elapsed: Duration) {}

    fn timing_kv(&self, _name: &str, _elapsed: Duration, _kvs: &Kvs) {}
}

/// Receiver that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventReceiver;

impl EventReceiver for NullEventReceiver {}

/// Whether an operation took long enough to be highlighted.
///
/// Compares whole milliseconds, so 10.9ms is not slow.
pub fn is_slow(elapsed: Duration) -> bool {
    elapsed.as_millis() > SLOW_THRESHOLD.as_millis()
}

// =============================================================================
// Terminal colors
// =============================================================================

/// Fixed terminal style table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Green,
    White,
    Yellow,
    Red,
    Blue,
    Magenta,
    Cyan,
    Reset,
}

impl Color {
    pub const ALL: [Color; 8] = [
        Color::Green,
        Color::White,
        Color::Yellow,
        Color::Red,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::Reset,
    ];

    /// ANSI escape sequence for this style.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Green => "\x1b[97;42m",
            Self::White => "\x1b[90;47m",
            Self::Yellow => "\x1b[97;43m",
            Self::Red => "\x1b[97;41m",
            Self::Blue => "\x1b[97;44m",
            Self::Magenta => "\x1b[97;45m",
            Self::Cyan => "\x1b[97;46m",
            Self::Reset => "\x1b[0m",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::White => "white",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
            Self::Reset => "reset",
        }
    }
}

impl FromStr for Color {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|color| color.name() == s)
            .ok_or_else(|| StoreError::unknown_color(s))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Render key/values as `map[k1:v1 k2:v2]`.
pub fn format_kvs(kvs: &Kvs) -> String {
    let mut out = String::from("map[");
    for (i, (key, value)) in kvs.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{key}:{value}");
    }
    out.push(']');
    out
}

// =============================================================================
// Printing receiver
// =============================================================================

/// Receiver that prints events as colored lines.
///
/// Only `event`, `event_err`, `event_err_kv` and `timing_kv` produce output.
/// Write failures are ignored.
pub struct SimpleEventReceiver<W: Write + Send> {
    out: Mutex<W>,
}

impl SimpleEventReceiver<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> SimpleEventReceiver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, line: std::fmt::Arguments<'_>) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = out.write_fmt(line);
        let _ = out.write_all(b"\n");
    }
}

impl<W: Write + Send> EventReceiver for SimpleEventReceiver<W> {
    fn event(&self, name: &str) {
        self.emit(format_args!("[{name}]"));
    }

    fn event_err(&self, name: &str, err: &(dyn Error + 'static)) {
        self.emit(format_args!("[{name}] {err}"));
    }

    fn event_err_kv(&self, name: &str, err: &(dyn Error + 'static), kvs: &Kvs) {
        self.emit(format_args!(
            "[{name}] |{} {err} {}| {}",
            Color::Red,
            Color::Reset,
            format_kvs(kvs)
        ));
    }

    fn timing_kv(&self, name: &str, elapsed: Duration, kvs: &Kvs) {
        let color = if is_slow(elapsed) { Color::Red } else { Color::Reset };
        self.emit(format_args!(
            "[{name}] |{color} {elapsed:?} {}| {}",
            Color::Reset,
            format_kvs(kvs)
        ));
    }
}

// =============================================================================
// Tracing receiver
// =============================================================================

/// Receiver that forwards events to `tracing`.
///
/// Slow timings are logged at `warn`, the rest at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventReceiver;

impl EventReceiver for TracingEventReceiver {
    fn event(&self, name: &str) {
        tracing::debug!(event = name, "session event");
    }

    fn event_kv(&self, name: &str, kvs: &Kvs) {
        tracing::debug!(event = name, kvs = %format_kvs(kvs), "session event");
    }

    fn event_err(&self, name: &str, err: &(dyn Error + 'static)) {
        tracing::error!(event = name, error = %err, "session error");
    }

    fn event_err_kv(&self, name: &str, err: &(dyn Error + 'static), kvs: &Kvs) {
        tracing::error!(event = name, error = %err, kvs = %format_kvs(kvs), "session error");
    }

    fn timing(&self, name: &str, elapsed: Duration) {
        tracing::debug!(event = name, elapsed = ?elapsed, "session timing");
    }

    fn timing_kv(&self, name: &str, elapsed: Duration, kvs: &Kvs) {
        if is_slow(elapsed) {
            tracing::warn!(event = name, elapsed = ?elapsed, kvs = %format_kvs(kvs), "slow statement");
        } else {
            tracing::debug!(event = name, elapsed = ?elapsed, kvs = %format_kvs(kvs), "session timing");
        }
    }
}
