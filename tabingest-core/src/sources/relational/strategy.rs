//! Pool ownership and the `SourceStrategy` implementation.

use async_trait::async_trait;
use zeroize::Zeroizing;

use super::DatabaseEngine;
use crate::error::IngestError;
use crate::models::{NormalizedFrame, SourceKind, SourceSchema, TableDescriptor};
use crate::sources::{ConnectionConfig, SourceConfig, SourceStrategy};
use crate::Result;

/// Connection pool for whichever engine the strategy targets.
pub(super) enum EnginePool {
    #[cfg(feature = "postgresql")]
    Postgres(sqlx::PgPool),
    #[cfg(feature = "mysql")]
    MySql(sqlx::MySqlPool),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqlitePool),
}

impl EnginePool {
    async fn open(
        engine: DatabaseEngine,
        connection_string: &str,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        #[allow(unreachable_patterns)]
        match engine {
            #[cfg(feature = "postgresql")]
            DatabaseEngine::Postgres => super::postgres::connect(connection_string, config)
                .await
                .map(Self::Postgres),
            #[cfg(feature = "mysql")]
            DatabaseEngine::MySql => super::mysql::connect(connection_string, config)
                .await
                .map(Self::MySql),
            #[cfg(feature = "sqlite")]
            DatabaseEngine::Sqlite => super::sqlite::connect(connection_string, config)
                .await
                .map(Self::Sqlite),
            other => Err(IngestError::driver_unavailable(
                other.feature(),
                format!("sqlx (feature `{}`)", other.feature()),
            )),
        }
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        match self {
            #[cfg(feature = "postgresql")]
            Self::Postgres(pool) => super::postgres::list_tables(pool).await,
            #[cfg(feature = "mysql")]
            Self::MySql(pool) => super::mysql::list_tables(pool).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => super::sqlite::list_tables(pool).await,
        }
    }

    async fn describe_table(&self, name: &str) -> Result<TableDescriptor> {
        match self {
            #[cfg(feature = "postgresql")]
            Self::Postgres(pool) => super::postgres::describe_table(pool, name).await,
            #[cfg(feature = "mysql")]
            Self::MySql(pool) => super::mysql::describe_table(pool, name).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => super::sqlite::describe_table(pool, name).await,
        }
    }

    async fn read_rows(
        &self,
        table: &TableDescriptor,
        limit: Option<usize>,
    ) -> Result<NormalizedFrame> {
        match self {
            #[cfg(feature = "postgresql")]
            Self::Postgres(pool) => super::postgres::read_rows(pool, table, limit).await,
            #[cfg(feature = "mysql")]
            Self::MySql(pool) => super::mysql::read_rows(pool, table, limit).await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => super::sqlite::read_rows(pool, table, limit).await,
        }
    }

    async fn close(self) {
        match self {
            #[cfg(feature = "postgresql")]
            Self::Postgres(pool) => pool.close().await,
            #[cfg(feature = "mysql")]
            Self::MySql(pool) => pool.close().await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => pool.close().await,
        }
    }
}

/// Reads tables from a live database.
///
/// `get_schema` describes every base table with exact row counts.
/// `get_data` reads the configured table, or the first table by name.
pub struct RelationalStrategy {
    engine: DatabaseEngine,
    connection_string: Zeroizing<String>,
    connection: ConnectionConfig,
    table: Option<String>,
    pool: Option<EnginePool>,
}

impl std::fmt::Debug for RelationalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalStrategy")
            .field("engine", &self.engine)
            .field("connection", &self.connection)
            .field("table", &self.table)
            .field("connected", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

impl RelationalStrategy {
    /// Creates an unconnected strategy.
    ///
    /// # Errors
    /// Returns error if the connection string is missing or unparseable.
    pub fn new(engine: DatabaseEngine, config: SourceConfig) -> Result<Self> {
        let connection_string = config.connection_string.ok_or_else(|| {
            IngestError::configuration("connection_string is required for database sources")
        })?;
        let connection = ConnectionConfig::from_connection_string(&connection_string)?;

        Ok(Self {
            engine,
            connection_string: Zeroizing::new(connection_string),
            connection,
            table: config.table,
            pool: None,
        })
    }

    /// Engine this strategy talks to.
    pub fn engine(&self) -> DatabaseEngine {
        self.engine
    }

    /// Connection settings (credentials excluded).
    pub fn connection_config(&self) -> &ConnectionConfig {
        &self.connection
    }

    async fn pool(&mut self) -> Result<&EnginePool> {
        let pool = match self.pool.take() {
            Some(pool) => pool,
            None => {
                tracing::info!("Connecting to {} at {}", self.engine, self.connection);
                EnginePool::open(self.engine, &self.connection_string, &self.connection).await?
            }
        };
        Ok(self.pool.insert(pool))
    }

    fn select_table(&self, tables: &[String]) -> Result<Option<String>> {
        match self.table.as_deref() {
            None => Ok(tables.first().cloned()),
            Some(requested) => tables
                .iter()
                .find(|name| name.as_str() == requested)
                .or_else(|| tables.iter().find(|name| name.eq_ignore_ascii_case(requested)))
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    IngestError::configuration(format!(
                        "Table {:?} not found in {} database",
                        requested, self.engine
                    ))
                }),
        }
    }
}

#[async_trait]
impl SourceStrategy for RelationalStrategy {
    async fn connect(&mut self) -> Result<()> {
        self.pool().await.map(|_| ())
    }

    async fn get_schema(&mut self) -> Result<SourceSchema> {
        let pool = self.pool().await?;
        let mut schema = SourceSchema::new(SourceKind::RelationalConnection);
        for name in pool.list_tables().await? {
            schema.tables.push(pool.describe_table(&name).await?);
        }

        tracing::info!(
            "Described {} tables ({} rows) in {} database",
            schema.tables.len(),
            schema.total_rows(),
            self.engine
        );
        Ok(schema)
    }

    async fn get_data(&mut self, limit: Option<usize>) -> Result<NormalizedFrame> {
        let tables = self.pool().await?.list_tables().await?;
        let Some(name) = self.select_table(&tables)? else {
            tracing::debug!("{} database has no tables", self.engine);
            return Ok(NormalizedFrame::default());
        };

        let pool = self.pool().await?;
        let table = pool.describe_table(&name).await?;
        let frame = pool.read_rows(&table, limit).await?;

        tracing::debug!("Read {} rows from {}", frame.row_count(), name);
        Ok(frame)
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            tracing::info!("Disconnected from {} at {}", self.engine, self.connection);
        }
        Ok(())
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::RelationalConnection
    }

    fn is_connected(&self) -> bool {
        self.pool.is_some()
    }
}
