use anyhow::Result;
use tracing::info;

use super::{Job, JobContext};
use crate::baha::{PageUrl, Paginated, SearchTitlePage, SearchUserPage};
use crate::queue::JobQueue;

/// Scrape one page of title-search results.
///
/// Every matching thread on the page is queued for scraping, then the next
/// result page if there is one. The successor goes in only after all rows
/// did, so an interrupted run can at worst re-scrape a page, never skip one.
pub(crate) async fn run_title_search(
    ctx: &JobContext,
    title: &str,
    user: Option<&str>,
    page: u32,
) -> Result<()> {
    let url = PageUrl::parse(&ctx.config.title_search_url(title, page))?;
    let listing = SearchTitlePage::fetch(ctx.fetcher.as_ref(), url).await?;

    let rows = listing.rows_for(user);
    info!(title, page, threads = rows.len(), "Scraped title-search page");

    for row in rows {
        ctx.queue
            .enqueue(Job::ScrapeThread {
                url: row.url.clone(),
            })
            .await?;
    }

    if listing.has_next_page() {
        ctx.queue
            .enqueue(Job::SearchTitle {
                title: title.to_owned(),
                user: user.map(ToOwned::to_owned),
                page: page + 1,
            })
            .await?;
    }

    Ok(())
}

/// Scrape one page of a user's post search.
///
/// Rows point at single-post pages; each is queued individually, then the
/// next result page if there is one.
pub(crate) async fn run_user_search(ctx: &JobContext, user: &str, page: u32) -> Result<()> {
    let url = PageUrl::parse(&ctx.config.user_search_url(user, page))?;
    let listing = SearchUserPage::fetch(ctx.fetcher.as_ref(), url).await?;

    info!(user, page, posts = listing.rows().len(), "Scraped user-search page");

    for row in listing.rows() {
        ctx.queue
            .enqueue(Job::ScrapePost {
                url: row.url.clone(),
            })
            .await?;
    }

    if listing.has_next_page() {
        ctx.queue
            .enqueue(Job::SearchUser {
                user: user.to_owned(),
                page: page + 1,
            })
            .await?;
    }

    Ok(())
}
