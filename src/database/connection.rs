use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);

    // Every connection to `sqlite::memory:` opens its own empty database,
    // so an in-memory store must stay on a single connection.
    let max_connections = if is_memory_url(database_url) { 1 } else { 10 };

    opt.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    Database::connect(opt).await
}

pub fn get_database_url(database_path: Option<&str>) -> String {
    match database_path {
        Some(":memory:") => "sqlite::memory:".to_string(),
        Some(path) => format!("sqlite://{}?mode=rwc", path),
        None => "sqlite://yggdrasil.db?mode=rwc".to_string(),
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_database_url() {
        assert_eq!(get_database_url(Some(":memory:")), "sqlite::memory:");
        assert_eq!(
            get_database_url(Some("data/tree.db")),
            "sqlite://data/tree.db?mode=rwc"
        );
        assert_eq!(get_database_url(None), "sqlite://yggdrasil.db?mode=rwc");
    }

    #[tokio::test]
    async fn test_memory_connection() {
        let db = establish_connection("sqlite::memory:").await.unwrap();
        db.ping().await.unwrap();
    }
}
