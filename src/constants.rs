//! Shared constants used across the application.

/// User agent string sent with every scraping request.
///
/// This is a realistic browser user agent that is indistinguishable from a real browser,
/// making scraping requests appear as normal browser traffic.
pub const SCRAPE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// The production forum host.
pub const DEFAULT_BASE_URL: &str = "https://forum.gamer.com.tw";

/// The music board ("場外休憩區" is 60076 on the live site).
pub const DEFAULT_BOARD_ID: u32 = 60076;

/// Default thread title searched by the scheduler.
pub const DEFAULT_SEARCH_TITLE: &str = "半夜歌串";

/// Avatar host; user pics are sharded by the first two characters of the account.
pub const AVATAR_BASE_URL: &str = "https://avatar2.bahamut.com.tw/avataruserpic";
