//! Forum page abstractions.
//!
//! Each page type owns one URL shape: it validates the descriptor, fetches
//! through a [`client::PageFetcher`], checks that the document still matches
//! the markup contract, and exposes typed accessors. A page instance is one
//! fetched page; moving through a listing means constructing the next
//! instance from [`page::Paginated::next_url`].

pub mod client;
pub mod comments;
pub mod page;
pub mod search_title;
pub mod search_user;
pub mod thread;
pub mod url;

pub use client::{BrowserFetcher, HttpFetcher, PageFetcher};
pub use comments::{CommentBatch, CommentFetcher, CommentRecord};
pub use page::Paginated;
pub use search_title::{ListingRow, SearchTitlePage};
pub use search_user::{SearchUserPage, UserRow};
pub use thread::{PostSection, ThreadPage, FORUM_TIME_FORMAT};
pub use url::PageUrl;
