mod import;
mod users;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "orders-cli")]
#[command(about = "Catalog and order backend command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Account management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Import a shop catalog from a YAML file
    Import {
        /// Path to the catalog document
        #[arg(long)]
        file: PathBuf,
        /// Email of the shop account to import as
        #[arg(long)]
        user: Option<String>,
        /// Parse and validate only; print what would be imported
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum UserCommands {
    /// Create an account
    Create {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ORDERS_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// Create a shop account instead of a buyer
        #[arg(long)]
        shop: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("orders-cli: run with --help to list commands");
        return Ok(());
    };

    // A dry-run import never touches the database.
    if let Commands::Import {
        file,
        dry_run: true,
        ..
    } = &command
    {
        return import::run_import_dry_run(file);
    }

    let config = orders_core::load_app_config()?;
    let pool_config = orders_db::PoolConfig::from_app_config(&config);
    let pool = orders_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            orders_db::health_check(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = orders_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::User {
            command:
                UserCommands::Create {
                    email,
                    password,
                    first_name,
                    last_name,
                    shop,
                },
        } => {
            users::run_create_user(&pool, &email, &password, &first_name, &last_name, shop)
                .await?;
        }
        Commands::Import { file, user, .. } => {
            let user = user.ok_or_else(|| {
                anyhow::anyhow!("--user is required unless --dry-run is given")
            })?;
            import::run_import(&pool, &file, &user).await?;
        }
    }

    Ok(())
}
