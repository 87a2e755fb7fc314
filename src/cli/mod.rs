//! Command-line interface for the Greenlight API server.

mod commands;

pub use commands::{cmd_grant, cmd_init_config, cmd_serve};

use clap::{Parser, Subcommand};

/// Greenlight - movie catalogue JSON API
#[derive(Parser)]
#[command(name = "greenlight")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server (default)
    Serve {
        /// Port to listen on, overriding the config file
        #[arg(long)]
        port: Option<u16>,

        /// Environment name (development|staging|production)
        #[arg(long)]
        env: Option<String>,
    },

    /// Grant permission codes to a user, e.g. `grant alice@example.com movies:read`
    Grant {
        email: String,

        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Create default config file
    #[command(alias = "init")]
    InitConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grant() {
        let cli = Cli::parse_from(["greenlight", "grant", "a@b.co", "movies:read", "movies:write"]);
        match cli.command {
            Some(Commands::Grant { email, codes }) => {
                assert_eq!(email, "a@b.co");
                assert_eq!(codes, vec!["movies:read", "movies:write"]);
            }
            _ => panic!("expected grant"),
        }
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["greenlight", "serve", "--port", "8080", "--env", "staging"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Serve { port: Some(8080), env: Some(ref e) }) if e == "staging"
        ));
    }
}
