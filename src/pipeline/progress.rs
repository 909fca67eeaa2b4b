//! Progress narration for the processing pipeline.
//!
//! Both operating modes narrate the same steps: the batch command prints
//! them to the terminal, the HTTP service pushes them to the log stream.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

/// Display style hint attached to each progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Style {
    Plain,
    Dim,
    Heading,
    Step,
    Success,
    Warning,
    Alert,
    Error,
}

impl Style {
    /// Terminal style name understood by the web client.
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Plain => "white",
            Style::Dim => "dim",
            Style::Heading => "bold cyan",
            Style::Step => "green",
            Style::Success => "bold magenta",
            Style::Warning => "red",
            Style::Alert => "bold red blink",
            Style::Error => "bold red",
        }
    }
}

/// Receives progress messages from the pipeline.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, message: &str, style: Style);

    /// Called before a long-running wait (the model call).
    fn begin_wait(&self, _message: &str) {}

    /// Called when the wait started by `begin_wait` is over.
    fn end_wait(&self) {}
}

/// Prints progress to stdout with a spinner during model calls.
pub struct ConsoleSink {
    quiet: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            spinner: Mutex::new(None),
        }
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, message: &str, style: Style) {
        if self.quiet && style != Style::Error {
            return;
        }

        let line = match style {
            Style::Step | Style::Dim => format!("   {}", message.trim_start()),
            _ => message.to_string(),
        };

        match self.spinner.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(pb) => pb.println(line),
                None => println!("{}", line),
            },
            Err(_) => println!("{}", line),
        }
    }

    fn begin_wait(&self, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));

        if let Ok(mut guard) = self.spinner.lock() {
            *guard = Some(pb);
        }
    }

    fn end_wait(&self) {
        if let Ok(mut guard) = self.spinner.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

/// Cosmetic delays between narrated steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    enabled: bool,
}

impl Pacing {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sleep for `millis` when pacing is enabled.
    pub async fn pause(&self, millis: u64) {
        if self.enabled {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_names() {
        assert_eq!(Style::Heading.as_str(), "bold cyan");
        assert_eq!(Style::Alert.as_str(), "bold red blink");
        assert_eq!(Style::Dim.as_str(), "dim");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_sleeps_when_enabled() {
        let start = tokio::time::Instant::now();
        Pacing::new(true).pause(800).await;
        assert!(start.elapsed() >= Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_disabled_pacing_returns_immediately() {
        let start = std::time::Instant::now();
        Pacing::disabled().pause(10_000).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_quiet_console_sink_skips_spinner() {
        let sink = ConsoleSink::new(true);
        sink.begin_wait("waiting");
        assert!(sink.spinner.lock().unwrap().is_none());
        sink.end_wait();
    }
}
