//! CLI argument definitions using clap derive macros.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default listen address for `serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Fetch OpenAPI/Swagger specs and prepare them for Postman import.
///
/// Give it the URL of an API documentation page (`/docs`, `/redoc`,
/// `/swagger-ui`) or of the spec itself, and it resolves, fetches, validates
/// and rewrites the document.
#[derive(Parser, Debug)]
#[command(name = "spec-fetch")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/spec-fetch/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Allow loopback and private hosts (local development only)
    #[arg(long, global = true)]
    pub allow_private_hosts: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the spec URL a docs URL resolves to
    Resolve {
        /// Docs page or spec URL
        url: String,
    },

    /// Fetch, validate and rewrite a spec for Postman
    Fetch {
        /// Docs page or spec URL
        url: String,

        /// Bearer token to embed in the collection
        #[arg(short = 'a', long, value_name = "TOKEN")]
        authorization: Option<String>,

        /// Write the collection to this file instead of printing the envelope
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Validate spec text from a file or stdin
    Parse {
        /// Spec file (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Run the HTTP API
    Serve {
        /// Listen address (default: config `bind`, else 127.0.0.1:3000)
        #[arg(short, long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_subcommand() {
        let err = Args::try_parse_from(["spec-fetch"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["spec-fetch", "-v", "resolve", "https://x"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["spec-fetch", "resolve", "https://x", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_and_config_are_global() {
        let args = Args::try_parse_from([
            "spec-fetch",
            "parse",
            "--quiet",
            "--config",
            "/tmp/c.toml",
        ])
        .unwrap();
        assert!(args.quiet);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        assert_eq!(args.command, Command::Parse { file: None });
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["spec-fetch", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    // ==================== Subcommand Tests ====================

    #[test]
    fn test_cli_fetch_with_options() {
        let args = Args::try_parse_from([
            "spec-fetch",
            "fetch",
            "https://api.example.com/docs",
            "-a",
            "tok",
            "--output",
            "api.json",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Fetch {
                url: "https://api.example.com/docs".to_string(),
                authorization: Some("tok".to_string()),
                output: Some(PathBuf::from("api.json")),
            }
        );
    }

    #[test]
    fn test_cli_fetch_requires_url() {
        let err = Args::try_parse_from(["spec-fetch", "fetch"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_serve_bind() {
        let args = Args::try_parse_from(["spec-fetch", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        assert_eq!(
            args.command,
            Command::Serve {
                bind: Some("0.0.0.0:8080".parse().unwrap())
            }
        );

        let err = Args::try_parse_from(["spec-fetch", "serve", "--bind", "nope"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_default_bind_parses() {
        assert!(DEFAULT_BIND.parse::<SocketAddr>().is_ok());
    }
}
