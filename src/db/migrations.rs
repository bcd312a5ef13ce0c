use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    if current_version < 2 {
        debug!("Running migration v2");
        run_migration_v2(pool).await?;
        set_schema_version(pool, 2).await?;
    }

    if current_version < 3 {
        debug!("Running migration v3");
        run_migration_v3(pool).await?;
        set_schema_version(pool, 3).await?;
    }

    if current_version < 4 {
        debug!("Running migration v4");
        run_migration_v4(pool).await?;
        set_schema_version(pool, 4).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating initial schema");

    // Threads table. `no` is the forum's thread number (snA); `date` is the
    // resolved subject date of the thread, written once and never updated.
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS threads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            no INTEGER UNIQUE NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            date TEXT NOT NULL,
            inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create threads table")?;

    // Posters table. One row per forum account, shared by posts and comments.
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            avatar_url TEXT NOT NULL,
            inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posters table")?;

    // Posts table. `no` is the forum's global post serial (snB), also used
    // to request the post's comment feed.
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
            poster_id INTEGER NOT NULL REFERENCES posters(id),
            no INTEGER NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            inserted_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(thread_id, no)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posts table")?;

    Ok(())
}

async fn run_migration_v2(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v2: adding music links");

    // Links table. One row per recognized (site, resource id) pair found in
    // a post; the set is replaced wholesale on every re-scrape. The poster is
    // denormalized from the post so "songs shared by X" needs no join.
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            poster_id INTEGER NOT NULL REFERENCES posters(id),
            site TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            mode TEXT NOT NULL,
            inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create links table")?;

    // Denormalized flag so "posts with music" queries need no join.
    sqlx::query("ALTER TABLE posts ADD COLUMN has_music INTEGER NOT NULL DEFAULT 0")
        .execute(pool)
        .await
        .context("Failed to add has_music column")?;

    Ok(())
}

async fn run_migration_v3(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v3: adding comments");

    // Comments carry no stable id on the forum, so the natural key is the
    // full tuple of what was said, by whom, on which post, and when.
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            poster_id INTEGER NOT NULL REFERENCES posters(id),
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            inserted_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(post_id, poster_id, content, created_at)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create comments table")?;

    Ok(())
}

async fn run_migration_v4(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v4: adding indexes for common queries");

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_thread_id ON posts(thread_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_poster_id ON posts(poster_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_no ON posts(no)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_has_music ON posts(has_music)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_post_id ON links(post_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_site_resource ON links(site, resource_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post_id ON comments(post_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_threads_date ON threads(date)")
        .execute(pool)
        .await?;

    Ok(())
}
