//! Recipe Box CLI - Database migrations and user management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! rb-cli migrate
//!
//! # Create a regular user
//! rb-cli user create -e cook@example.com -n "Cook" -p secret123
//!
//! # Create a staff superuser
//! rb-cli user create-superuser -e admin@example.com -p secret123
//! ```
//!
//! The database is selected with `RECIPE_DATABASE_URL` (or `DATABASE_URL`),
//! read from the environment or a `.env` file.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rb-cli")]
#[command(author, version, about = "Recipe Box CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a regular user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long, default_value = "")]
        name: String,

        /// Password (at least 5 characters)
        #[arg(short, long, env = "RECIPE_USER_PASSWORD")]
        password: String,
    },
    /// Create a staff superuser
    CreateSuperuser {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 5 characters)
        #[arg(short, long, env = "RECIPE_USER_PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                password,
            } => {
                commands::user::create(&email, &name, &password).await?;
            }
            UserAction::CreateSuperuser { email, password } => {
                commands::user::create_superuser(&email, &password).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_superuser() {
        let cli = Cli::try_parse_from([
            "rb-cli",
            "user",
            "create-superuser",
            "-e",
            "admin@example.com",
            "-p",
            "secret123",
        ])
        .expect("arguments should parse");

        assert!(matches!(
            cli.command,
            Commands::User {
                action: UserAction::CreateSuperuser { ref email, .. }
            } if email == "admin@example.com"
        ));
    }
}
