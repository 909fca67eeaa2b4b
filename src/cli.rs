//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation.

use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

/// LabNote - policy-bound review of clinical lab reports
///
/// Pulls pending lab reports, asks a local model to interpret each one
/// against the hospital policy, and writes a clinical note per report.
/// Without flags the whole pending queue is processed once.
///
/// Examples:
///   labnote
///   labnote --model qwen2.5:14b --policy ./hospital_policy.txt
///   labnote --serve --port 8000
///   labnote --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Run the HTTP service instead of the batch run
    #[arg(long)]
    pub serve: bool,

    /// Interface for the HTTP service
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port for the HTTP service
    #[arg(long, env = "PORT", value_name = "PORT")]
    pub port: Option<u16>,

    /// Ollama model to use for analysis
    #[arg(short, long, env = "LABNOTE_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL", value_name = "URL")]
    pub ollama_url: Option<String>,

    /// Hospital policy document
    #[arg(short, long, value_name = "FILE")]
    pub policy: Option<PathBuf>,

    /// Directory for generated clinical notes
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Model request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Skip the cosmetic pauses between narrated steps
    #[arg(long)]
    pub no_delays: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .labnote.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .labnote.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.port == Some(0) {
            return Err("Port must be between 1 and 65535".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Get the log level based on verbosity settings.
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::WARN
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_no_arguments_is_valid() {
        let args = parse(&["labnote"]);
        assert!(!args.serve);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_serve_flags() {
        let args = parse(&["labnote", "--serve", "--host", "127.0.0.1", "--port", "8080"]);
        assert!(args.serve);
        assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.port, Some(8080));
    }

    #[test]
    fn test_invalid_ollama_url() {
        let args = parse(&["labnote", "--ollama-url", "localhost:11434"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_invalid_temperature() {
        let args = parse(&["labnote", "--temperature", "1.5"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let args = parse(&["labnote", "--timeout", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let args = parse(&["labnote", "--verbose", "--quiet"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(parse(&["labnote", "-q"]).log_level(), Level::WARN);
        assert_eq!(parse(&["labnote", "-v"]).log_level(), Level::DEBUG);
        assert_eq!(parse(&["labnote"]).log_level(), Level::INFO);
    }
}
