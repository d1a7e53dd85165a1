use crate::error::DbError;
use configuration::DatabaseConfig;
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::env;
use std::time::Duration;

/// Builds the connect options from the individual `[database]` fields.
fn options_from_fields(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.dbname)
}

/// Resolves where to connect: `DATABASE_URL` wins over the config fields.
fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, DbError> {
    match env::var("DATABASE_URL") {
        Ok(url) => url
            .parse::<PgConnectOptions>()
            .map_err(|e| DbError::ConnectionConfigError(e.to_string())),
        Err(_) => Ok(options_from_fields(config)),
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
}

/// Establishes a connection pool to the PostgreSQL database.
///
/// The pool is shared across the entire application; each operation checks a
/// connection out for the duration of its statements only.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let pool = pool_options(config)
        .connect_with(connect_options(config)?)
        .await?;
    tracing::info!(host = %config.host, dbname = %config.dbname, "Connected to the database.");
    Ok(pool)
}

/// Builds a pool that opens connections on first use.
pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    Ok(pool_options(config).connect_lazy_with(connect_options(config)?))
}

/// Applies the embedded migrations so the schema is up to date at startup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    // Use a relative path from the crate root
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_characters_stay_inside_the_password() {
        let config = DatabaseConfig {
            host: "db.school.internal".to_string(),
            port: 6543,
            user: "journal".to_string(),
            password: "p@ss/w#rd:1".to_string(),
            dbname: "classbook".to_string(),
            ..DatabaseConfig::default()
        };
        let options = options_from_fields(&config);
        assert_eq!(options.get_host(), "db.school.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "journal");
        assert_eq!(options.get_database(), Some("classbook"));
    }
}
