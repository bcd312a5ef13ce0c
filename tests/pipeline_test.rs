//! End-to-end pipeline tests: queue, worker pool, jobs and storage together.

use std::sync::Arc;
use std::time::Duration;

use baha_song_archiver::baha::{CommentFetcher, HttpFetcher, PageUrl};
use baha_song_archiver::config::Config;
use baha_song_archiver::db::{
    count_comments, count_links, count_posts, count_threads, get_post_by_forum_no,
    get_thread_by_no, Database,
};
use baha_song_archiver::jobs::{Job, JobContext};
use baha_song_archiver::queue::{JobQueue, WorkQueue, WorkerPool};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::new(&temp_dir.path().join("test.sqlite"))
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

/// Build a worker pool wired to a fresh queue, ready to drain.
fn build_pool(base_url: &str, db: Database) -> (Arc<WorkQueue>, WorkerPool) {
    let config = Config {
        base_url: base_url.to_string(),
        ..Config::for_testing()
    };
    let (queue, receiver) = WorkQueue::new();
    let ctx = JobContext {
        fetcher: Arc::new(HttpFetcher::new(&config).expect("Failed to build fetcher")),
        comments: Arc::new(CommentFetcher::new(&config).expect("Failed to build comment client")),
        queue: queue.clone(),
        config,
        db,
    };
    let pool = WorkerPool::new(ctx, queue.clone(), receiver);
    (queue, pool)
}

async fn drain(mut pool: WorkerPool) {
    tokio::time::timeout(Duration::from_secs(10), pool.run_until_idle())
        .await
        .expect("pipeline timed out")
        .expect("pipeline failed");
}

fn result_row(title: &str, thread_no: i64, user: &str) -> String {
    format!(
        r#"<tr class="b-list__row">
            <td class="b-list__main">
                <a class="b-list__main__title" href="C.php?bsn=60076&snA={thread_no}">{title}</a>
            </td>
            <td class="b-list__count"><p class="b-list__count__user">{user}</p></td>
        </tr>"#
    )
}

fn post_section(no: i64, account: &str, name: &str, mtime: &str, content: &str) -> String {
    format!(
        r##"<section id="post_{no}" class="c-section">
             <a class="userid" href="//home.gamer.com.tw/{account}">{account}</a>
             <a class="username">{name}</a>
             <a data-mtime="{mtime}" href="#">發布時間</a>
             <div class="c-article"><div class="c-article__content">{content}</div></div>
           </section>"##
    )
}

fn thread_page(index: i64, doc_title: &str, sections: &str) -> String {
    format!(
        r#"<html><head>
             <title>{doc_title} @場外休憩區 哈啦板 - 巴哈姆特</title>
             <meta property="al:ios:url" content="bahamut://forum/60076/{index}">
           </head><body>{sections}</body></html>"#
    )
}

async fn mount_search_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/B.php"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_thread(server: &MockServer, thread_no: i64, body: String) {
    Mock::given(method("GET"))
        .and(path("/C.php"))
        .and(query_param("snA", thread_no.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_comments(server: &MockServer, post_no: i64, body: &str) {
    Mock::given(method("GET"))
        .and(path("/ajax/moreCommend.php"))
        .and(query_param("snB", post_no.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

const NO_COMMENTS: &str = r#"{ "next_snC": "0" }"#;

#[tokio::test]
async fn test_title_scrape_runs_the_whole_cascade() {
    let (db, _dir) = setup_db().await;
    let server = MockServer::start().await;

    // Two result pages worth of threads.
    mount_search_page(
        &server,
        1,
        format!(
            r#"<html><body><table>{}{}</table><p class="pagenow">1</p><a href="?page=2">2</a></body></html>"#,
            result_row("11/7 半夜歌串", 101, "alice1"),
            result_row("11/8 半夜歌串", 102, "bob2"),
        ),
    )
    .await;
    mount_search_page(
        &server,
        2,
        format!(
            "<html><body><table>{}</table></body></html>",
            result_row("11/9 半夜歌串", 103, "alice1"),
        ),
    )
    .await;

    mount_thread(
        &server,
        101,
        thread_page(
            101,
            "11/7 半夜歌串",
            &post_section(
                1001,
                "alice1",
                "愛麗絲",
                "2020-11-07 23:52:53",
                r#"<p><a href="https://www.youtube.com/watch?v=dQw4w9WgXcQ">開串曲</a></p>"#,
            ),
        ),
    )
    .await;
    mount_thread(
        &server,
        102,
        thread_page(
            102,
            "11/8 半夜歌串",
            &[
                post_section(
                    1002,
                    "bob2",
                    "鮑伯",
                    "2020-11-08 23:01:00",
                    "<p>推 https://streetvoice.com/HomeSickAlien/songs/744395</p>",
                ),
                post_section(1003, "carol3", "卡蘿", "2020-11-08 23:30:00", "<p>晚安</p>"),
            ]
            .join("\n"),
        ),
    )
    .await;
    mount_thread(
        &server,
        103,
        thread_page(
            103,
            "11/9 半夜歌串",
            &post_section(1004, "alice1", "愛麗絲", "2020-11-09 23:00:00", "<p>頂</p>"),
        ),
    )
    .await;

    mount_comments(
        &server,
        1001,
        r#"{
            "0": { "userid": "dave4", "nick": "戴夫", "content": "推", "wtime": "2020-11-08 00:01:00" },
            "next_snC": "0"
        }"#,
    )
    .await;
    mount_comments(&server, 1002, NO_COMMENTS).await;
    mount_comments(
        &server,
        1003,
        r#"{
            "0": { "userid": "alice1", "nick": "愛麗絲", "content": "晚安晚安", "wtime": "2020-11-08 23:45:00" },
            "next_snC": "0"
        }"#,
    )
    .await;
    mount_comments(&server, 1004, NO_COMMENTS).await;

    let (queue, pool) = build_pool(&server.uri(), db.clone());
    queue
        .enqueue(Job::SearchTitle {
            title: "半夜歌串".to_string(),
            user: None,
            page: 1,
        })
        .await
        .expect("enqueue failed");

    drain(pool).await;

    assert_eq!(count_threads(db.pool()).await.expect("Database error"), 3);
    assert_eq!(count_posts(db.pool()).await.expect("Database error"), 4);
    assert_eq!(count_links(db.pool()).await.expect("Database error"), 2);
    assert_eq!(count_comments(db.pool()).await.expect("Database error"), 2);

    let thread = get_thread_by_no(db.pool(), 101)
        .await
        .expect("Database error")
        .expect("Thread not found");
    assert_eq!(thread.date, "2020-11-07");

    let with_song = get_post_by_forum_no(db.pool(), 1001)
        .await
        .expect("Database error")
        .expect("Post not found");
    assert!(with_song.has_music);

    let without_song = get_post_by_forum_no(db.pool(), 1003)
        .await
        .expect("Database error")
        .expect("Post not found");
    assert!(!without_song.has_music);
}

#[tokio::test]
async fn test_transient_failure_is_retried_until_it_succeeds() {
    let (db, _dir) = setup_db().await;
    let server = MockServer::start().await;

    // First hit fails, every later hit serves the page.
    Mock::given(method("GET"))
        .and(path("/C.php"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_thread(
        &server,
        101,
        thread_page(
            101,
            "11/7 半夜歌串",
            &post_section(1001, "alice1", "愛麗絲", "2020-11-07 23:52:53", "<p>頂</p>"),
        ),
    )
    .await;
    mount_comments(&server, 1001, NO_COMMENTS).await;

    let (queue, pool) = build_pool(&server.uri(), db.clone());
    let url = PageUrl::parse(&format!("{}/C.php?bsn=60076&snA=101", server.uri()))
        .expect("valid thread url");
    queue
        .enqueue(Job::ScrapeThread { url })
        .await
        .expect("enqueue failed");

    drain(pool).await;

    assert_eq!(
        count_posts(db.pool()).await.expect("Database error"),
        1,
        "the retry should have stored the post"
    );

    let requests = server
        .received_requests()
        .await
        .expect("request recording enabled");
    let thread_hits = requests
        .iter()
        .filter(|request| request.url.path() == "/C.php")
        .count();
    assert_eq!(thread_hits, 2, "one failure, one successful retry");
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let (db, _dir) = setup_db().await;
    let server = MockServer::start().await;

    // No meta tag, no posts: the shape check rejects this outright.
    Mock::given(method("GET"))
        .and(path("/C.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><head><title>系統訊息</title></head><body>此文章無效</body></html>"),
        )
        .mount(&server)
        .await;

    let (queue, pool) = build_pool(&server.uri(), db.clone());
    let url = PageUrl::parse(&format!("{}/C.php?bsn=60076&snA=999", server.uri()))
        .expect("valid thread url");
    queue
        .enqueue(Job::ScrapeThread { url })
        .await
        .expect("enqueue failed");

    drain(pool).await;

    assert_eq!(count_threads(db.pool()).await.expect("Database error"), 0);

    let requests = server
        .received_requests()
        .await
        .expect("request recording enabled");
    assert_eq!(
        requests.len(),
        1,
        "a permanently failing page is fetched exactly once"
    );
}
