//! Access to the `settings` table

use crate::Result;
use sqlx::SqlitePool;

/// Read a setting value (`None` when missing or NULL)
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.and_then(|(v,)| v))
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Write `default` unless the setting already holds a non-NULL value
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default: &str) -> Result<()> {
    if get_setting(pool, key).await?.is_none() {
        set_setting(pool, key, default).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_set_then_get() {
        let pool = init_memory_database().await.unwrap();
        assert_eq!(get_setting(&pool, "upload_max_mb").await.unwrap(), None);

        set_setting(&pool, "upload_max_mb", "20").await.unwrap();
        assert_eq!(
            get_setting(&pool, "upload_max_mb").await.unwrap().as_deref(),
            Some("20")
        );
    }

    #[tokio::test]
    async fn test_ensure_setting_keeps_existing_value() {
        let pool = init_memory_database().await.unwrap();
        set_setting(&pool, "image_quality", "0.6").await.unwrap();
        ensure_setting(&pool, "image_quality", "0.8").await.unwrap();
        assert_eq!(
            get_setting(&pool, "image_quality").await.unwrap().as_deref(),
            Some("0.6")
        );
    }

    #[tokio::test]
    async fn test_ensure_setting_replaces_null() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("INSERT INTO settings (key, value) VALUES ('llm_temperature', NULL)")
            .execute(&pool)
            .await
            .unwrap();
        ensure_setting(&pool, "llm_temperature", "0.2").await.unwrap();
        assert_eq!(
            get_setting(&pool, "llm_temperature").await.unwrap().as_deref(),
            Some("0.2")
        );
    }
}
