pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "erp-api")]
#[command(about = "ERP API server and maintenance commands")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to bind, overrides ERP_API_PORT")]
        port: Option<u16>,
    },

    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Create an administrator account")]
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "ADMIN_PASSWORD", help = "Initial password (min 8 characters)")]
        password: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve::handle(port).await,
        Commands::Migrate => commands::migrate::handle().await,
        Commands::CreateAdmin { name, email, password } => commands::admin::handle(name, email, password).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_admin_takes_password_flag() {
        let cli = Cli::try_parse_from([
            "erp-api",
            "create-admin",
            "--name",
            "Root",
            "--email",
            "root@example.com",
            "--password",
            "changeme123",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::CreateAdmin { name, password, .. }) => {
                assert_eq!(name, "Root");
                assert_eq!(password, "changeme123");
            }
            _ => panic!("expected create-admin"),
        }
    }

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["erp-api"]).unwrap();
        assert!(cli.command.is_none());
    }
}
