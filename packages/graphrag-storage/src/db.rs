use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};
use graphrag_config::Postgres;

const SCHEMA_LOCK_ID: i64 = 4_711_021;

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		// Advisory locks are per connection, so keep the lock and the DDL in one transaction.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)")
			.bind(SCHEMA_LOCK_ID)
			.execute(&mut *tx)
			.await?;

		for statement in schema::statements(&sql) {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
