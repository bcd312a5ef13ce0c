use anyhow::Result;
use tracing::info;

use super::{avatar_url, Job, JobContext};
use crate::baha::{PageUrl, Paginated, ThreadPage, FORUM_TIME_FORMAT};
use crate::db::{
    replace_post_links, upsert_post, upsert_poster, upsert_thread, NewPost, NewPoster, NewThread,
};
use crate::links::extract_links;
use crate::queue::JobQueue;

/// Scrape one page of a thread, then queue the next page if there is one.
pub(crate) async fn scrape_thread(ctx: &JobContext, url: &PageUrl) -> Result<()> {
    let page = ThreadPage::fetch(ctx.fetcher.as_ref(), url.clone()).await?;
    save_thread_page(ctx, &page).await?;

    if page.has_next_page() {
        ctx.queue
            .enqueue(Job::ScrapeThread {
                url: page.next_url(),
            })
            .await?;
    }

    Ok(())
}

/// Scrape a single-post page. Single-post pages carry no paginator, so this
/// job never queues a successor.
pub(crate) async fn scrape_post(ctx: &JobContext, url: &PageUrl) -> Result<()> {
    let page = ThreadPage::fetch(ctx.fetcher.as_ref(), url.clone()).await?;
    save_thread_page(ctx, &page).await
}

/// Store everything a thread page shows.
///
/// The thread row is refreshed, then each post section gets its poster and
/// content upserted and its link set replaced with what the content shows
/// now. Comment fetching is queued for posts seen for the first time.
async fn save_thread_page(ctx: &JobContext, page: &ThreadPage) -> Result<()> {
    let pool = ctx.db.pool();

    let thread_id = upsert_thread(
        pool,
        &NewThread {
            no: page.index(),
            title: page.title().to_owned(),
            url: ctx.config.thread_url(page.index()),
            date: page.date().format("%Y-%m-%d").to_string(),
        },
    )
    .await?;

    let mut new_posts = 0usize;
    let mut songs = 0usize;

    for post in page.posts() {
        let poster_id = upsert_poster(
            pool,
            &NewPoster {
                account: post.author_account.clone(),
                name: post.author_name.clone(),
                avatar_url: avatar_url(&post.author_account),
            },
        )
        .await?;

        let (post_id, created) = upsert_post(
            pool,
            &NewPost {
                thread_id,
                poster_id,
                no: post.no,
                content: post.content_html.clone(),
                created_at: post.created_at.format(FORUM_TIME_FORMAT).to_string(),
            },
        )
        .await?;

        let links = extract_links(&post.content_html);
        songs += links.len();
        replace_post_links(pool, post_id, poster_id, &links).await?;

        if created {
            new_posts += 1;
            ctx.queue
                .enqueue(Job::FetchComments { post_no: post.no })
                .await?;
        }
    }

    info!(
        thread = page.index(),
        posts = page.posts().len(),
        new_posts,
        songs,
        "Saved thread page"
    );

    Ok(())
}
