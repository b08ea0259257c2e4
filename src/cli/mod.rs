pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "projectdb")]
#[command(about = "projectdb - operator CLI for the project database control plane")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List configured database flavours and their servers")]
    Flavours,

    #[command(about = "Generate a random database name, user and password")]
    Credentials,

    #[command(about = "Check the administrative connection for a flavour")]
    Ping {
        #[arg(help = "Flavour name (mysql or postgres)")]
        flavour: String,
    },

    #[command(about = "Mint a bearer token signed with the configured JWT secret")]
    Token {
        #[arg(long, help = "User id to place in the token subject")]
        user: uuid::Uuid,
        #[arg(long, help = "Grant the admin role")]
        admin: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Flavours => commands::flavours::handle(&config, output_format),
        Commands::Credentials => commands::credentials::handle(output_format),
        Commands::Ping { flavour } => commands::ping::handle(&config, &flavour, output_format).await,
        Commands::Token { user, admin } => commands::token::handle(&config, user, admin, output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_command() {
        let user = uuid::Uuid::new_v4();
        let cli = Cli::try_parse_from(["projectdb", "--json", "token", "--user", &user.to_string(), "--admin"]).unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Token { user: parsed, admin } => {
                assert_eq!(parsed, user);
                assert!(admin);
            }
            _ => panic!("expected token command"),
        }
    }

    #[test]
    fn ping_requires_a_flavour() {
        assert!(Cli::try_parse_from(["projectdb", "ping"]).is_err());
        assert!(Cli::try_parse_from(["projectdb", "ping", "mysql"]).is_ok());
    }
}
