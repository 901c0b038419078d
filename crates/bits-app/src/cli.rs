//! CLI argument definitions for the bits binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// bits: a lab assistant that chats, calls tools, and answers from your documents.
#[derive(Parser, Debug)]
#[command(name = "bits", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the local index snapshot.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API.
    Serve {
        /// API server port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
    },
    /// Interactive chat on the terminal.
    Chat {
        /// Mode to start in (normal, tools, rag).
        #[arg(short = 'm', long = "mode")]
        mode: Option<String>,
    },
    /// Index text or Markdown files into the knowledge base.
    Ingest {
        /// Files to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Document type (people, paper, other).
        #[arg(short = 't', long = "type", default_value = "other")]
        doc_type: String,
        /// Subtype label; defaults to each file's stem.
        #[arg(long = "subtype")]
        subtype: Option<String>,
        /// Title; defaults to each file's name.
        #[arg(long = "title")]
        title: Option<String>,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > BITS_CONFIG env var > ~/.bits/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("BITS_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > BITS_PORT env var > config file value > 3030.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Command::Serve { port: Some(p) } = self.command {
            return p;
        }
        if let Ok(val) = std::env::var("BITS_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        3030
    }

    /// `None` when not overridden on the command line.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".bits").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_port() {
        let args = CliArgs::parse_from(["bits", "serve", "--port", "4040"]);
        assert_eq!(args.resolve_port(3030), 4040);
    }

    #[test]
    fn test_flag_config_path_wins() {
        let args = CliArgs::parse_from(["bits", "--config", "/tmp/bits.toml", "chat"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/bits.toml"));
    }

    #[test]
    fn test_parse_ingest() {
        let args = CliArgs::parse_from([
            "bits", "ingest", "team.md", "papers.md", "--type", "people", "-l", "debug",
        ]);
        match args.command {
            Command::Ingest {
                ref paths,
                ref doc_type,
                ..
            } => {
                assert_eq!(paths.len(), 2);
                assert_eq!(doc_type, "people");
            }
            ref other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(args.resolve_log_level("info"), "debug");
    }

    #[test]
    fn test_ingest_requires_paths() {
        assert!(CliArgs::try_parse_from(["bits", "ingest"]).is_err());
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        let args = CliArgs::parse_from(["bits", "chat"]);
        assert_eq!(args.resolve_log_level("warn"), "warn");
        assert!(args.resolve_data_dir().is_none());
    }
}
