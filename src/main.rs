use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use configuration::{Config, DEFAULT_CONFIG_PATH, LogConfig, load_config};
use core_types::Role;
use database::repository::NewUser;
use database::{Models, connect, run_migrations};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, FmtSubscriber, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// The back end of the class journal: accounts, journals, lessons and marks.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations and serve the HTTP API (the default).
    Serve,
    /// Apply the database migrations and exit.
    Migrate,
    /// Create an administrator account.
    CreateAdmin(CreateAdminArgs),
}

#[derive(Parser)]
struct CreateAdminArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // The file sink depends on the configuration, so the configuration is
    // read under a temporary stdout subscriber.
    let bootstrap = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new("warn"))
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || load_config(&cli.config))
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let _guard = init_tracing(&config.log)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => handle_serve(&config).await,
        Commands::Migrate => handle_migrate(&config).await,
        Commands::CreateAdmin(args) => handle_create_admin(&config, args).await,
    }
}

/// Installs stdout logging, plus a daily-rolling file when a directory is configured.
///
/// The returned guard flushes the file writer when dropped.
fn init_tracing(log: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &log.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "classbook.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;
    Ok(guard)
}

async fn open_models(config: &Config) -> Result<Models> {
    let pool = connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;
    Ok(Models::new(pool, config.database.query_timeout()))
}

async fn handle_serve(config: &Config) -> Result<()> {
    let models = open_models(config).await?;
    web_server::run_server(config, models).await
}

async fn handle_migrate(config: &Config) -> Result<()> {
    open_models(config).await?;
    tracing::info!("Database migrations applied.");
    Ok(())
}

async fn handle_create_admin(config: &Config, args: CreateAdminArgs) -> Result<()> {
    let models = open_models(config).await?;
    let id = models
        .users
        .insert(&NewUser {
            name: args.name,
            email: args.email,
            password: args.password,
            role: Role::Administrator,
            phone: None,
            address: None,
            birth_date: None,
        })
        .await
        .context("failed to create the administrator")?;
    models
        .logs
        .record_quietly(None, "create_user", &format!("user {id} (administrator, from the command line)"))
        .await;
    println!("Administrator created with id {id}.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["classbook"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn create_admin_takes_credentials() {
        let cli = Cli::try_parse_from([
            "classbook",
            "--config",
            "/etc/classbook.toml",
            "create-admin",
            "--name",
            "Root",
            "--email",
            "root@school.test",
            "--password",
            "hunter22",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/classbook.toml"));
        assert!(matches!(
            cli.command,
            Some(Commands::CreateAdmin(CreateAdminArgs { ref email, .. })) if email == "root@school.test"
        ));
    }
}
