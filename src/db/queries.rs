use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{
    Comment, Link, NewComment, NewPost, NewPoster, NewThread, Post, Poster, Thread,
};
use crate::links::ExtractedLink;

// ========== Threads ==========

/// Insert a thread or refresh an existing one by its forum number.
///
/// The resolved date is written once; later scrapes refresh title and url
/// only, so a re-parse of an old page can never move a thread to another
/// day. Returns the row id.
pub async fn upsert_thread(pool: &SqlitePool, thread: &NewThread) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r"
        INSERT INTO threads (no, title, url, date)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(no) DO UPDATE SET
            title = excluded.title,
            url = excluded.url
        RETURNING id
        ",
    )
    .bind(thread.no)
    .bind(&thread.title)
    .bind(&thread.url)
    .bind(&thread.date)
    .fetch_one(pool)
    .await
    .context("Failed to upsert thread")?;

    Ok(id)
}

/// Get a thread by its forum number.
pub async fn get_thread_by_no(pool: &SqlitePool, no: i64) -> Result<Option<Thread>> {
    sqlx::query_as("SELECT * FROM threads WHERE no = ?")
        .bind(no)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch thread by no")
}

/// Count stored threads.
pub async fn count_threads(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM threads")
        .fetch_one(pool)
        .await
        .context("Failed to count threads")?;
    Ok(count)
}

// ========== Posters ==========

/// Insert a poster or refresh an existing one by account.
///
/// Display name and avatar follow whatever the forum currently shows.
/// Returns the row id.
pub async fn upsert_poster(pool: &SqlitePool, poster: &NewPoster) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r"
        INSERT INTO posters (account, name, avatar_url)
        VALUES (?, ?, ?)
        ON CONFLICT(account) DO UPDATE SET
            name = excluded.name,
            avatar_url = excluded.avatar_url
        RETURNING id
        ",
    )
    .bind(&poster.account)
    .bind(&poster.name)
    .bind(&poster.avatar_url)
    .fetch_one(pool)
    .await
    .context("Failed to upsert poster")?;

    Ok(id)
}

/// Get a poster by forum account.
pub async fn get_poster_by_account(pool: &SqlitePool, account: &str) -> Result<Option<Poster>> {
    sqlx::query_as("SELECT * FROM posters WHERE account = ?")
        .bind(account)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch poster by account")
}

// ========== Posts ==========

/// Insert a post or refresh an existing one by `(thread, no)`.
///
/// Returns the row id and whether the row was newly created. Comment
/// fetching is only scheduled for new posts, which is what the flag is for.
pub async fn upsert_post(pool: &SqlitePool, post: &NewPost) -> Result<(i64, bool)> {
    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM posts WHERE thread_id = ? AND no = ?")
            .bind(post.thread_id)
            .bind(post.no)
            .fetch_optional(pool)
            .await
            .context("Failed to check for existing post")?;

    if let Some((id,)) = existing {
        sqlx::query(
            r"
            UPDATE posts
            SET poster_id = ?, content = ?, created_at = ?
            WHERE id = ?
            ",
        )
        .bind(post.poster_id)
        .bind(&post.content)
        .bind(&post.created_at)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post")?;

        return Ok((id, false));
    }

    let result = sqlx::query(
        r"
        INSERT INTO posts (thread_id, poster_id, no, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        ",
    )
    .bind(post.thread_id)
    .bind(post.poster_id)
    .bind(post.no)
    .bind(&post.content)
    .bind(&post.created_at)
    .execute(pool)
    .await
    .context("Failed to insert post")?;

    Ok((result.last_insert_rowid(), true))
}

/// Get a post by its forum serial.
pub async fn get_post_by_forum_no(pool: &SqlitePool, no: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE no = ? LIMIT 1")
        .bind(no)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post by forum no")
}

/// Get all posts of a thread, in forum order.
pub async fn get_posts_for_thread(pool: &SqlitePool, thread_id: i64) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE thread_id = ? ORDER BY no")
        .bind(thread_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch posts for thread")
}

/// Count stored posts.
pub async fn count_posts(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(count)
}

// ========== Links ==========

/// Replace a post's link set with the one just extracted.
///
/// Delete, insert, and the `has_music` flag move in one transaction so a
/// reader never sees a half-replaced set. An empty extraction clears the
/// set, which is how removed links disappear on re-scrape.
pub async fn replace_post_links(
    pool: &SqlitePool,
    post_id: i64,
    poster_id: i64,
    links: &[ExtractedLink],
) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin link replacement")?;

    sqlx::query("DELETE FROM links WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear old links")?;

    for link in links {
        sqlx::query(
            "INSERT INTO links (post_id, poster_id, site, resource_id, mode) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(poster_id)
        .bind(link.site.as_str())
        .bind(&link.resource_id)
        .bind(link.mode.as_str())
        .execute(&mut *tx)
        .await
        .context("Failed to insert link")?;
    }

    sqlx::query("UPDATE posts SET has_music = ? WHERE id = ?")
        .bind(!links.is_empty())
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update music flag")?;

    tx.commit()
        .await
        .context("Failed to commit link replacement")?;
    Ok(())
}

/// Get a post's links in insertion order.
pub async fn get_links_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<Link>> {
    sqlx::query_as("SELECT * FROM links WHERE post_id = ? ORDER BY id")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch links for post")
}

/// Count stored links.
pub async fn count_links(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM links")
        .fetch_one(pool)
        .await
        .context("Failed to count links")?;
    Ok(count)
}

/// Clear the music flag on posts whose link set is empty.
///
/// Returns the number of posts cleared.
pub async fn clear_music_flag_for_linkless_posts(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r"
        UPDATE posts
        SET has_music = 0
        WHERE has_music = 1
          AND id NOT IN (SELECT DISTINCT post_id FROM links)
        ",
    )
    .execute(pool)
    .await
    .context("Failed to clear stale music flags")?;

    Ok(result.rows_affected())
}

// ========== Comments ==========

/// Insert a comment unless the same comment is already stored.
///
/// Comments carry no id on the forum, so identity is the full tuple of
/// post, poster, content, and creation time. A re-sighted comment only has
/// its `inserted_at` refreshed. Returns whether a row was created.
pub async fn upsert_comment(pool: &SqlitePool, comment: &NewComment) -> Result<bool> {
    let existing: Option<(i64,)> = sqlx::query_as(
        r"
        SELECT id FROM comments
        WHERE post_id = ? AND poster_id = ? AND content = ? AND created_at = ?
        ",
    )
    .bind(comment.post_id)
    .bind(comment.poster_id)
    .bind(&comment.content)
    .bind(&comment.created_at)
    .fetch_optional(pool)
    .await
    .context("Failed to check for existing comment")?;

    if let Some((id,)) = existing {
        sqlx::query("UPDATE comments SET inserted_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to refresh comment")?;
        return Ok(false);
    }

    sqlx::query(
        r"
        INSERT INTO comments (post_id, poster_id, content, created_at)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(comment.post_id)
    .bind(comment.poster_id)
    .bind(&comment.content)
    .bind(&comment.created_at)
    .execute(pool)
    .await
    .context("Failed to insert comment")?;

    Ok(true)
}

/// Get a post's comments in forum time order.
pub async fn get_comments_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<Comment>> {
    sqlx::query_as("SELECT * FROM comments WHERE post_id = ? ORDER BY created_at, id")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch comments for post")
}

/// Count stored comments.
pub async fn count_comments(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments")
        .fetch_one(pool)
        .await
        .context("Failed to count comments")?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::links::{ExtractMode, SiteTag};
    use tempfile::TempDir;

    async fn setup() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&dir.path().join("test.sqlite")).await.unwrap();
        (db, dir)
    }

    fn sample_thread() -> NewThread {
        NewThread {
            no: 6055013,
            title: "【半夜歌串】11/7 留言推歌".into(),
            url: "https://forum.gamer.com.tw/C.php?bsn=60076&snA=6055013".into(),
            date: "2020-11-07".into(),
        }
    }

    fn sample_poster() -> NewPoster {
        NewPoster {
            account: "soda123".into(),
            name: "汽水".into(),
            avatar_url: "https://avatar2.bahamut.com.tw/avataruserpic/s/o/soda123/soda123_s.png"
                .into(),
        }
    }

    async fn insert_sample_post(db: &Database) -> (i64, i64) {
        let thread_id = upsert_thread(db.pool(), &sample_thread()).await.unwrap();
        let poster_id = upsert_poster(db.pool(), &sample_poster()).await.unwrap();
        let (post_id, created) = upsert_post(
            db.pool(),
            &NewPost {
                thread_id,
                poster_id,
                no: 21843000,
                content: "<p>今晚聽這首</p>".into(),
                created_at: "2020-11-07 23:12:44".into(),
            },
        )
        .await
        .unwrap();
        assert!(created);
        (post_id, poster_id)
    }

    fn link(site: SiteTag, id: &str) -> ExtractedLink {
        ExtractedLink {
            site,
            resource_id: id.into(),
            mode: ExtractMode::Anchor,
        }
    }

    #[tokio::test]
    async fn test_upsert_thread_refreshes_title_but_not_date() {
        let (db, _dir) = setup().await;

        let id = upsert_thread(db.pool(), &sample_thread()).await.unwrap();

        let mut renamed = sample_thread();
        renamed.title = "【半夜歌串】11/7 改名了".into();
        renamed.date = "2021-01-01".into();
        let id_again = upsert_thread(db.pool(), &renamed).await.unwrap();

        assert_eq!(id, id_again);
        let thread = get_thread_by_no(db.pool(), 6055013).await.unwrap().unwrap();
        assert_eq!(thread.title, "【半夜歌串】11/7 改名了");
        assert_eq!(thread.date, "2020-11-07");
        assert_eq!(count_threads(db.pool()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_poster_refreshes_profile() {
        let (db, _dir) = setup().await;

        let id = upsert_poster(db.pool(), &sample_poster()).await.unwrap();

        let mut renamed = sample_poster();
        renamed.name = "氣泡水".into();
        let id_again = upsert_poster(db.pool(), &renamed).await.unwrap();

        assert_eq!(id, id_again);
        let poster = get_poster_by_account(db.pool(), "soda123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(poster.name, "氣泡水");
    }

    #[tokio::test]
    async fn test_upsert_post_reports_creation_once() {
        let (db, _dir) = setup().await;
        let (post_id, _) = insert_sample_post(&db).await;

        let post = get_post_by_forum_no(db.pool(), 21843000)
            .await
            .unwrap()
            .unwrap();
        let (id_again, created) = upsert_post(
            db.pool(),
            &NewPost {
                thread_id: post.thread_id,
                poster_id: post.poster_id,
                no: 21843000,
                content: "<p>編輯過的內容</p>".into(),
                created_at: post.created_at.clone(),
            },
        )
        .await
        .unwrap();

        assert_eq!(post_id, id_again);
        assert!(!created);
        let refreshed = get_post_by_forum_no(db.pool(), 21843000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.content, "<p>編輯過的內容</p>");
        assert_eq!(count_posts(db.pool()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_post_links_swaps_the_whole_set() {
        let (db, _dir) = setup().await;
        let (post_id, poster_id) = insert_sample_post(&db).await;

        replace_post_links(
            db.pool(),
            post_id,
            poster_id,
            &[
                link(SiteTag::Youtube, "dQw4w9WgXcQ"),
                link(SiteTag::Spotify, "4uLU6hMCjMI75M1A2tKUQC"),
            ],
        )
        .await
        .unwrap();

        let stored = get_links_for_post(db.pool(), post_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].site, "youtube");
        assert_eq!(stored[0].poster_id, poster_id);
        assert_eq!(stored[0].mode, "anchor");
        let post = get_post_by_forum_no(db.pool(), 21843000)
            .await
            .unwrap()
            .unwrap();
        assert!(post.has_music);

        let pasted = ExtractedLink {
            site: SiteTag::StreetVoice,
            resource_id: "a/songs/1".into(),
            mode: ExtractMode::Text,
        };
        replace_post_links(db.pool(), post_id, poster_id, &[pasted])
            .await
            .unwrap();
        let stored = get_links_for_post(db.pool(), post_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].site, "street_voice");
        assert_eq!(stored[0].mode, "text");

        replace_post_links(db.pool(), post_id, poster_id, &[]).await.unwrap();
        assert!(get_links_for_post(db.pool(), post_id).await.unwrap().is_empty());
        let post = get_post_by_forum_no(db.pool(), 21843000)
            .await
            .unwrap()
            .unwrap();
        assert!(!post.has_music);
    }

    #[tokio::test]
    async fn test_stored_links_rebuild_presentation_urls() {
        let (db, _dir) = setup().await;
        let (post_id, poster_id) = insert_sample_post(&db).await;

        replace_post_links(db.pool(), post_id, poster_id, &[link(SiteTag::Youtube, "abc123")])
            .await
            .unwrap();

        let stored = get_links_for_post(db.pool(), post_id).await.unwrap();
        assert_eq!(
            stored[0].general_url().unwrap(),
            "https://www.youtube.com/watch?v=abc123"
        );
        assert_eq!(
            stored[0].embedded_url().unwrap(),
            "https://www.youtube.com/embed/abc123"
        );
    }

    #[tokio::test]
    async fn test_upsert_comment_is_idempotent() {
        let (db, _dir) = setup().await;
        let (post_id, _) = insert_sample_post(&db).await;
        let poster_id = upsert_poster(
            db.pool(),
            &NewPoster {
                account: "night_owl".into(),
                name: "夜貓".into(),
                avatar_url: String::new(),
            },
        )
        .await
        .unwrap();

        let comment = NewComment {
            post_id,
            poster_id,
            content: "推這首".into(),
            created_at: "2020-11-08 00:03:10".into(),
        };

        assert!(upsert_comment(db.pool(), &comment).await.unwrap());
        assert!(!upsert_comment(db.pool(), &comment).await.unwrap());
        assert_eq!(count_comments(db.pool()).await.unwrap(), 1);

        let mut other = comment.clone();
        other.content = "我也推".into();
        assert!(upsert_comment(db.pool(), &other).await.unwrap());
        assert_eq!(count_comments(db.pool()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_clear_music_flag_for_linkless_posts() {
        let (db, _dir) = setup().await;
        let (post_id, poster_id) = insert_sample_post(&db).await;

        replace_post_links(db.pool(), post_id, poster_id, &[link(SiteTag::Youtube, "abc")])
            .await
            .unwrap();

        // Orphan the flag the way an external cleanup of links would.
        sqlx::query("DELETE FROM links WHERE post_id = ?")
            .bind(post_id)
            .execute(db.pool())
            .await
            .unwrap();

        let cleared = clear_music_flag_for_linkless_posts(db.pool()).await.unwrap();
        assert_eq!(cleared, 1);
        let post = get_post_by_forum_no(db.pool(), 21843000)
            .await
            .unwrap()
            .unwrap();
        assert!(!post.has_music);

        // Second run finds nothing left to clear.
        assert_eq!(
            clear_music_flag_for_linkless_posts(db.pool()).await.unwrap(),
            0
        );
    }
}
