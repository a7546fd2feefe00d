use sqlx::{PgConnection, PgPool};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::models::settings::{UpdateSettings, SETTINGS_ID};
use crate::models::Settings;

/// Access to the settings row. The row is created with defaults on first read.
pub struct SettingsStore {
    pool: PgPool,
    create_lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            create_lock: Mutex::new(()),
        }
    }

    pub async fn get(&self) -> Result<Settings, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(settings) = select(&mut *conn, false).await? {
            return Ok(settings);
        }

        let _guard = self.create_lock.lock().await;
        insert_defaults(&mut *conn).await?;
        select(&mut *conn, false)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Settings not found".to_string()))
    }

    pub async fn update(&self, input: UpdateSettings, actor: Uuid) -> Result<Settings, DatabaseError> {
        self.modify(|settings| settings.apply(input, actor)).await.map(|(s, _)| s)
    }

    /// Records a new logo and returns the filename it replaced.
    pub async fn set_logo(
        &self,
        url: String,
        filename: String,
        actor: Uuid,
    ) -> Result<(Settings, Option<String>), DatabaseError> {
        self.modify(|settings| settings.set_logo(url, filename, actor)).await
    }

    async fn modify<R>(&self, change: impl FnOnce(&mut Settings) -> R) -> Result<(Settings, R), DatabaseError> {
        // Make sure the row exists before locking it
        self.get().await?;

        let mut tx = self.pool.begin().await?;
        let mut settings = select(&mut *tx, true)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Settings not found".to_string()))?;
        let result = change(&mut settings);
        save(&mut *tx, &settings).await?;
        tx.commit().await?;
        Ok((settings, result))
    }
}

async fn select(conn: &mut PgConnection, for_update: bool) -> Result<Option<Settings>, DatabaseError> {
    let sql = if for_update {
        "SELECT * FROM \"settings\" WHERE \"id\" = $1 FOR UPDATE"
    } else {
        "SELECT * FROM \"settings\" WHERE \"id\" = $1"
    };
    Ok(sqlx::query_as::<_, Settings>(sql)
        .bind(SETTINGS_ID)
        .fetch_optional(&mut *conn)
        .await?)
}

async fn insert_defaults(conn: &mut PgConnection) -> Result<(), DatabaseError> {
    let defaults = Settings::defaults();
    let inserted = sqlx::query(
        "INSERT INTO \"settings\" (\"id\", \"company_name\", \"currency\", \"timezone\", \"fiscal_year_start\", \
         \"work_start_time\", \"late_grace_minutes\", \"sla_hours\", \"updated_at\") \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) ON CONFLICT (\"id\") DO NOTHING",
    )
    .bind(defaults.id)
    .bind(&defaults.company_name)
    .bind(&defaults.currency)
    .bind(&defaults.timezone)
    .bind(&defaults.fiscal_year_start)
    .bind(&defaults.work_start_time)
    .bind(defaults.late_grace_minutes)
    .bind(&defaults.sla_hours)
    .bind(defaults.updated_at)
    .execute(&mut *conn)
    .await?;
    if inserted.rows_affected() > 0 {
        tracing::info!("Created default settings");
    }
    Ok(())
}

async fn save(conn: &mut PgConnection, settings: &Settings) -> Result<(), DatabaseError> {
    sqlx::query(
        "UPDATE \"settings\" SET \"company_name\" = $2, \"company_email\" = $3, \"company_phone\" = $4, \
         \"company_address\" = $5, \"company_logo_url\" = $6, \"company_logo_filename\" = $7, \"currency\" = $8, \
         \"timezone\" = $9, \"fiscal_year_start\" = $10, \"work_start_time\" = $11, \"late_grace_minutes\" = $12, \
         \"sla_hours\" = $13, \"updated_by\" = $14, \"updated_at\" = $15 WHERE \"id\" = $1",
    )
    .bind(settings.id)
    .bind(&settings.company_name)
    .bind(&settings.company_email)
    .bind(&settings.company_phone)
    .bind(&settings.company_address)
    .bind(&settings.company_logo_url)
    .bind(&settings.company_logo_filename)
    .bind(&settings.currency)
    .bind(&settings.timezone)
    .bind(&settings.fiscal_year_start)
    .bind(&settings.work_start_time)
    .bind(settings.late_grace_minutes)
    .bind(&settings.sla_hours)
    .bind(settings.updated_by)
    .bind(settings.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
