//! CLI argument definitions for the UniBot application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// UniBot - a rule-based university assistant.
#[derive(Parser, Debug)]
#[command(name = "unibot", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Knowledge document: a file path or an http(s) URL.
    #[arg(short = 'k', long = "knowledge")]
    pub knowledge: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Chat on the terminal instead of serving HTTP.
    #[arg(long = "repl")]
    pub repl: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > UNIBOT_CONFIG env var > platform default (~/.unibot/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("UNIBOT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > UNIBOT_PORT env var > config file value > 3030.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("UNIBOT_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        3030
    }

    /// Resolve the knowledge source. `None` keeps the config value.
    pub fn resolve_knowledge(&self) -> Option<String> {
        self.knowledge.clone()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".unibot").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".unibot").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::try_parse_from([
            "unibot",
            "--config",
            "/tmp/unibot.toml",
            "--port",
            "8080",
            "--knowledge",
            "https://example.edu/kb.json",
            "--log-level",
            "debug",
            "--repl",
        ])
        .unwrap();

        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/unibot.toml"));
        assert_eq!(args.resolve_port(3030), 8080);
        assert_eq!(
            args.resolve_knowledge().as_deref(),
            Some("https://example.edu/kb.json")
        );
        assert_eq!(args.resolve_log_level("info"), "debug");
        assert!(args.repl);
    }

    #[test]
    fn test_defaults_fall_back_to_config() {
        let args = CliArgs::try_parse_from(["unibot"]).unwrap();
        assert!(!args.repl);
        assert!(args.resolve_knowledge().is_none());
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(CliArgs::try_parse_from(["unibot", "--port", "not-a-port"]).is_err());
    }
}
