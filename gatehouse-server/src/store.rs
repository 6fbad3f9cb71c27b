//! Verified user records.

use std::str::FromStr as _;

use anyhow::Error;

use chrono::{DateTime, Utc};

use gatehouse_model::{Id, discord::User};

use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

/// A user as it was last seen verifying.
#[derive(Clone, Debug, FromRow, PartialEq, Eq)]
pub struct StoredUser {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub global_name: Option<String>,
    pub email: Option<String>,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Connects to the database and brings its schema up to date.
pub async fn connect(database_url: &str) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    migrate(&pool).await?;

    Ok(pool)
}

/// Runs pending migrations.
pub async fn migrate(db: &SqlitePool) -> Result<(), Error> {
    sqlx::migrate!().run(db).await.map_err(From::from)
}

/// Records a user, overwriting what was stored from their last verification.
pub async fn upsert_user(db: &SqlitePool, user: &User) -> Result<(), sqlx::Error> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO discord_user
            (id, username, discriminator, global_name, email, inserted_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        ON CONFLICT (id) DO UPDATE SET
            username = excluded.username,
            discriminator = excluded.discriminator,
            global_name = excluded.global_name,
            email = excluded.email,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.username)
    .bind(&user.discriminator)
    .bind(&user.global_name)
    .bind(&user.email)
    .bind(now)
    .execute(db)
    .await?;

    Ok(())
}

/// Fetches a stored user by their Discord id.
pub async fn find_user(db: &SqlitePool, id: Id) -> Result<Option<StoredUser>, sqlx::Error> {
    sqlx::query_as::<_, StoredUser>(
        r#"
        SELECT id, username, discriminator, global_name, email, inserted_at, updated_at
        FROM discord_user
        WHERE id = $1
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await
}
