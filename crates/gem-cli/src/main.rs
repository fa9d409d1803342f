//! gem-admin: operator commands for the GEM registry.
//!
//! Needs only DATABASE_URL (read from the environment or `.env`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use gem_api::setup::database::run_migrations;
use gem_cli::{create_admin, init_tracing};
use gem_core::models::RegisterRequest;
use gem_db::UserRepository;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "gem-admin", about = "GEM registry administration")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the initial administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        full_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&cli.database_url)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool).await?;

    match cli.command {
        Commands::CreateAdmin {
            email,
            username,
            password,
            full_name,
        } => {
            let request = RegisterRequest {
                email,
                username,
                full_name,
                password,
            };
            let outcome = create_admin(&UserRepository::new(pool), &request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.summary())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_admin() {
        let cli = Cli::try_parse_from([
            "gem-admin",
            "--database-url",
            "postgres://localhost/gem",
            "create-admin",
            "--email",
            "root@example.org",
            "--username",
            "root",
            "--password",
            "s3cret-pass",
        ])
        .unwrap();

        assert_eq!(cli.database_url, "postgres://localhost/gem");
        match cli.command {
            Commands::CreateAdmin {
                username,
                full_name,
                ..
            } => {
                assert_eq!(username, "root");
                assert!(full_name.is_none());
            }
        }
    }

    #[test]
    fn create_admin_requires_password() {
        let result = Cli::try_parse_from([
            "gem-admin",
            "--database-url",
            "postgres://localhost/gem",
            "create-admin",
            "--email",
            "root@example.org",
            "--username",
            "root",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
