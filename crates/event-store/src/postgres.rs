use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Version,
    store::{Commit, EventStore, EventStream, validate_commit},
};

const EVENT_COLUMNS: &str =
    "id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata";

/// PostgreSQL-backed event store.
///
/// A commit runs in one transaction. The `unique_aggregate_version`
/// constraint backs up the version check against writers that race
/// between the check and the insert.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store on a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn commit(&self, commit: Commit) -> Result<Vec<Version>> {
        validate_commit(&commit)?;

        let correlation = serde_json::Value::String(commit.correlation_id.to_string());
        let mut tx = self.pool.begin().await?;
        let mut versions = Vec::with_capacity(commit.streams.len());

        for stream in commit.streams {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                    .bind(stream.aggregate_id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await?;
            let actual = Version::new(current.unwrap_or(0));
            if actual != stream.expected_version {
                // Dropping `tx` rolls back streams already inserted.
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: stream.aggregate_id,
                    expected: stream.expected_version,
                    actual,
                });
            }

            let new_version = stream.resulting_version();
            for mut event in stream.events {
                event
                    .metadata
                    .entry("correlation_id".to_string())
                    .or_insert_with(|| correlation.clone());
                let metadata_json = serde_json::to_value(&event.metadata)?;

                sqlx::query(
                    r#"
                    INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(event.event_id.as_uuid())
                .bind(&event.event_type)
                .bind(event.aggregate_id.as_uuid())
                .bind(&event.aggregate_type)
                .bind(event.version.as_i64())
                .bind(event.timestamp)
                .bind(&event.payload)
                .bind(metadata_json)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if let sqlx::Error::Database(ref db_err) = e
                        && db_err.constraint() == Some("unique_aggregate_version")
                    {
                        return EventStoreError::ConcurrencyConflict {
                            aggregate_id: stream.aggregate_id,
                            expected: stream.expected_version,
                            actual: event.version,
                        };
                    }
                    EventStoreError::Database(e)
                })?;
            }
            versions.push(new_version);
        }

        tx.commit().await?;
        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE aggregate_id = $1 ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let mut sql: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"));

        if let Some(id) = query.aggregate_id {
            sql.push(" AND aggregate_id = ").push_bind(id.as_uuid());
        }
        if let Some(aggregate_type) = query.aggregate_type {
            sql.push(" AND aggregate_type = ").push_bind(aggregate_type);
        }
        if let Some(event_types) = query.event_types {
            sql.push(" AND event_type = ANY(")
                .push_bind(event_types)
                .push(")");
        }
        if let Some(version) = query.from_version {
            sql.push(" AND version >= ").push_bind(version.as_i64());
        }
        if let Some(since) = query.since {
            sql.push(" AND timestamp >= ").push_bind(since);
        }

        sql.push(" ORDER BY position ASC");

        if let Some(limit) = query.limit {
            sql.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sql.push(" OFFSET ").push_bind(offset as i64);
        }

        let rows = sql.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        let pool = self.pool.clone();
        let stream = log_rows(pool);
        Ok(Box::pin(stream.map(|result| match result {
            Ok(row) => Self::row_to_event(row),
            Err(e) => Err(EventStoreError::Database(e)),
        })))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}

/// Rows of the whole log in commit order.
///
/// Owns its pool handle so the returned stream is `'static`.
fn log_rows(
    pool: PgPool,
) -> impl futures_core::Stream<Item = std::result::Result<PgRow, sqlx::Error>> + Send {
    use futures_util::StreamExt;

    futures_util::stream::once(async move {
        sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY position ASC"
        ))
        .fetch_all(&pool)
        .await
    })
    .flat_map(|result| {
        let rows: Vec<std::result::Result<PgRow, sqlx::Error>> = match result {
            Ok(rows) => rows.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        futures_util::stream::iter(rows)
    })
}
