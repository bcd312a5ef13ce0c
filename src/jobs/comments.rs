use anyhow::Result;
use tracing::{debug, warn};

use super::{avatar_url, JobContext};
use crate::db::{get_post_by_forum_no, upsert_comment, upsert_poster, NewComment, NewPoster};

/// Walk one post's comment feed from the top, storing every comment.
///
/// The feed is cursor-paged; each response names the cursor for the next
/// request. The walk stops on an empty batch, on a terminal cursor, or when
/// the cursor stops advancing.
pub(crate) async fn fetch_comments(ctx: &JobContext, post_no: i64) -> Result<()> {
    let pool = ctx.db.pool();

    let Some(post) = get_post_by_forum_no(pool, post_no).await? else {
        warn!(post_no, "No stored post for comment fetch, skipping");
        return Ok(());
    };

    let mut cursor: Option<String> = None;
    let mut seen = 0usize;
    let mut new = 0usize;

    loop {
        let batch = ctx.comments.fetch_page(post_no, cursor.as_deref()).await?;
        if batch.comments.is_empty() {
            break;
        }

        for record in &batch.comments {
            let poster_id = upsert_poster(
                pool,
                &NewPoster {
                    account: record.userid.clone(),
                    name: record.nick.clone(),
                    avatar_url: avatar_url(&record.userid),
                },
            )
            .await?;

            let created = upsert_comment(
                pool,
                &NewComment {
                    post_id: post.id,
                    poster_id,
                    content: record.content.clone(),
                    created_at: record.wtime.clone(),
                },
            )
            .await?;

            seen += 1;
            if created {
                new += 1;
            }
        }

        let Some(next) = batch.next else { break };
        if cursor.as_deref() == Some(next.as_str()) {
            warn!(post_no, cursor = %next, "Comment cursor did not advance, stopping walk");
            break;
        }
        cursor = Some(next);
    }

    debug!(post_no, seen, new, "Comment walk finished");

    Ok(())
}
