//! Logging for CPU instrumentation.
//!
//! Every CPU owns its logging state through a [`LogObserver`]; there is no
//! process-wide logger, so independent CPUs (for example in parallel tests)
//! never share levels or sinks.
//!
//! # Architecture
//!
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: Cpu (instruction notices), Bus (cycle ticks), Fault (halts)
//! - **LogConfig**: per-category levels with a global fallback, rate limiting and a sink
//! - **LogObserver**: adapts a `LogConfig` to the [`CpuObserver`] hooks
//!
//! # Performance
//!
//! - Messages are built lazily, so a disabled category costs one comparison
//! - The file sink hands lines to a background thread over a channel
//!
//! # Usage
//!
//! ```rust
//! use emu_6502::logging::{LogCategory, LogConfig, LogLevel, LogObserver};
//!
//! let mut config = LogConfig::new();
//! config.set_level(LogCategory::Cpu, LogLevel::Debug);
//! let buffer = config.capture();
//! config.log(LogCategory::Cpu, LogLevel::Debug, || format!("PC={:04X}", 0x0200));
//! assert_eq!(buffer.lock().unwrap().len(), 1);
//!
//! let _observer = LogObserver::new(config);
//! ```

use crate::config::LogSettings;
use crate::cpu::CpuSnapshot;
use crate::observer::{CpuObserver, InstructionNotice};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Log level for controlling verbosity
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    #[default]
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Log category for the CPU's event streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogCategory {
    /// Dispatched instructions and resulting registers
    Cpu,
    /// Per-cycle bus ticks
    Bus,
    /// Unknown-opcode halts
    Fault,
}

impl LogCategory {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        match self {
            LogCategory::Cpu => 0,
            LogCategory::Bus => 1,
            LogCategory::Fault => 2,
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogCategory::Cpu => "cpu",
            LogCategory::Bus => "bus",
            LogCategory::Fault => "fault",
        };
        f.write_str(name)
    }
}

/// Sliding-window limiter, one window per category.
///
/// A limit of 0 disables limiting.
#[derive(Debug)]
struct RateLimiter {
    max_per_window: usize,
    window: Duration,
    timestamps: [VecDeque<Instant>; LogCategory::COUNT],
    dropped: [usize; LogCategory::COUNT],
    last_drop_report: [Option<Instant>; LogCategory::COUNT],
}

impl RateLimiter {
    fn new(max_per_window: usize) -> Self {
        Self::with_window(max_per_window, Duration::from_secs(1))
    }

    fn with_window(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            timestamps: Default::default(),
            dropped: [0; LogCategory::COUNT],
            last_drop_report: [None; LogCategory::COUNT],
        }
    }

    /// Returns (allowed, dropped count to report if one is due).
    fn should_allow(&mut self, category: LogCategory) -> (bool, Option<usize>) {
        if self.max_per_window == 0 {
            return (true, None);
        }

        let now = Instant::now();
        let idx = category.index();

        let window = &mut self.timestamps[idx];
        while let Some(&front) = window.front() {
            if now.duration_since(front) > self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.max_per_window {
            window.push_back(now);
            let dropped = std::mem::take(&mut self.dropped[idx]);
            if dropped > 0 {
                self.last_drop_report[idx] = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        self.dropped[idx] += 1;
        let report_due = match self.last_drop_report[idx] {
            None => true,
            Some(last) => now.duration_since(last) >= self.window,
        };
        if report_due {
            self.last_drop_report[idx] = Some(now);
            (false, Some(std::mem::take(&mut self.dropped[idx])))
        } else {
            (false, None)
        }
    }
}

/// File writer running on its own thread.
#[derive(Debug)]
pub struct FileSink {
    sender: Option<Sender<String>>,
    handle: Option<JoinHandle<()>>,
}

impl FileSink {
    /// Open (append) `path` and start the `log-writer` thread.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        let handle = thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    // Logging must never take the emulator down
                    let _ = writeln!(file, "{}", message);
                }
                let _ = file.flush();
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    fn send(&self, message: &str) -> bool {
        match &self.sender {
            Some(sender) => sender.send(message.to_string()).is_ok(),
            None => false,
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain and exit
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Where log lines go.
#[derive(Debug)]
pub enum LogSink {
    Stderr,
    File(FileSink),
    /// In-memory buffer, mostly for tests.
    Capture(Arc<Mutex<Vec<String>>>),
}

/// Logging state owned by one observer.
#[derive(Debug)]
pub struct LogConfig {
    global_level: LogLevel,
    levels: [LogLevel; LogCategory::COUNT],
    rate_limiter: RateLimiter,
    sink: LogSink,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LogConfig {
    /// All logging off, stderr sink, 60 messages per second per category.
    pub fn new() -> Self {
        Self {
            global_level: LogLevel::Off,
            levels: [LogLevel::Off; LogCategory::COUNT],
            rate_limiter: RateLimiter::new(60),
            sink: LogSink::Stderr,
        }
    }

    /// Build from deserialized settings. Fails only if the log file cannot be opened.
    pub fn from_settings(settings: &LogSettings) -> std::io::Result<Self> {
        let mut config = Self::new();
        config.set_global_level(settings.level);
        if let Some(level) = settings.cpu {
            config.set_level(LogCategory::Cpu, level);
        }
        if let Some(level) = settings.bus {
            config.set_level(LogCategory::Bus, level);
        }
        if let Some(level) = settings.fault {
            config.set_level(LogCategory::Fault, level);
        }
        config.set_rate_limit(settings.rate_limit);
        if let Some(path) = &settings.file {
            config.set_log_file(path)?;
        }
        Ok(config)
    }

    pub fn set_global_level(&mut self, level: LogLevel) {
        self.global_level = level;
    }

    pub fn global_level(&self) -> LogLevel {
        self.global_level
    }

    pub fn set_level(&mut self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()] = level;
    }

    pub fn level(&self, category: LogCategory) -> LogLevel {
        self.levels[category.index()]
    }

    /// A category level other than Off wins; otherwise the global level applies.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.global_level
        }
    }

    /// Reset all levels to Off
    pub fn reset(&mut self) {
        self.global_level = LogLevel::Off;
        self.levels = [LogLevel::Off; LogCategory::COUNT];
    }

    /// Messages per second per category; 0 means unlimited.
    pub fn set_rate_limit(&mut self, max_per_second: usize) {
        self.rate_limiter.max_per_window = max_per_second;
    }

    pub fn rate_limit(&self) -> usize {
        self.rate_limiter.max_per_window
    }

    pub fn set_sink(&mut self, sink: LogSink) {
        self.sink = sink;
    }

    /// Switch to a file sink. The previous sink is dropped (and a previous
    /// file writer flushed) first.
    pub fn set_log_file(&mut self, path: &Path) -> std::io::Result<()> {
        self.sink = LogSink::File(FileSink::open(path)?);
        Ok(())
    }

    /// Switch to an in-memory sink and return a handle to its buffer.
    pub fn capture(&mut self) -> Arc<Mutex<Vec<String>>> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        self.sink = LogSink::Capture(Arc::clone(&buffer));
        buffer
    }

    /// Log a lazily built message if `category` is enabled at `level`.
    pub fn log<F>(&mut self, category: LogCategory, level: LogLevel, message_fn: F)
    where
        F: FnOnce() -> String,
    {
        if !self.should_log(category, level) {
            return;
        }

        let (allowed, dropped) = self.rate_limiter.should_allow(category);
        if let Some(count) = dropped.filter(|&n| n > 0) {
            self.write_message(&format!(
                "[{}] WARNING: rate limit exceeded, {} message(s) dropped",
                category, count
            ));
        }
        if allowed {
            let message = message_fn();
            self.write_message(&message);
        }
    }

    fn write_message(&self, message: &str) {
        match &self.sink {
            LogSink::Stderr => eprintln!("{}", message),
            LogSink::File(file) => {
                if !file.send(message) {
                    eprintln!("{}", message);
                }
            }
            LogSink::Capture(buffer) => buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message.to_string()),
        }
    }
}

/// [`CpuObserver`] that writes CPU events through a [`LogConfig`].
///
/// - instruction notices at `Cpu`/Debug
/// - cycle ticks at `Bus`/Trace
/// - halts at `Fault`/Error
#[derive(Debug, Default)]
pub struct LogObserver {
    config: LogConfig,
}

impl LogObserver {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut LogConfig {
        &mut self.config
    }
}

impl CpuObserver for LogObserver {
    fn on_cycle(&mut self, cycle: u64) {
        self.config
            .log(LogCategory::Bus, LogLevel::Trace, || format!("bus: cycle {}", cycle));
    }

    fn on_instruction(&mut self, notice: &InstructionNotice) {
        self.config
            .log(LogCategory::Cpu, LogLevel::Debug, || format!("cpu: {}", notice));
    }

    fn on_halt(&mut self, opcode: u8, snapshot: &CpuSnapshot) {
        self.config.log(LogCategory::Fault, LogLevel::Error, || {
            format!(
                "fault: CPU halted on unknown opcode {:#04X}\n{}",
                opcode, snapshot
            )
        });
    }
}
