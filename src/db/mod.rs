use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

pub mod error;
pub mod migrator;
pub mod repositories;

pub use error::RepoError;
pub use repositories::movie::MovieRepository;
pub use repositories::permission::PermissionRepository;
pub use repositories::token::TokenRepository;
pub use repositories::user::UserRepository;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    query_timeout: Duration,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::connect(&DatabaseConfig {
            url: db_url.to_string(),
            ..DatabaseConfig::default()
        })
        .await
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let db_url = config.url.as_str();
        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            min = config.min_connections,
            max = config.max_connections,
            "Database connected & migrations applied"
        );

        Ok(Self {
            conn,
            query_timeout: config.query_timeout(),
        })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.conn.clone(), self.query_timeout)
    }

    #[must_use]
    pub fn movies(&self) -> MovieRepository {
        MovieRepository::new(self.conn.clone(), self.query_timeout)
    }

    #[must_use]
    pub fn tokens(&self) -> TokenRepository {
        TokenRepository::new(self.conn.clone(), self.query_timeout)
    }

    #[must_use]
    pub fn permissions(&self) -> PermissionRepository {
        PermissionRepository::new(self.conn.clone(), self.query_timeout)
    }
}

#[cfg(test)]
pub(crate) async fn test_store() -> Store {
    let db_path =
        std::env::temp_dir().join(format!("greenlight-db-test-{}.db", uuid::Uuid::new_v4()));
    Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to open test store")
}
