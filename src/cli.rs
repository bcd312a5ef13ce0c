//! Command-line interface.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "baha-song-archiver")]
#[command(about = "Archive Bahamut song-chain threads, comments and music links")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the service: scheduled scrapes until interrupted
    Run,

    /// Search threads by title, scrape the matches, then exit
    ScrapeTitle {
        /// Title to search for (defaults to the configured standing title)
        #[arg(long)]
        title: Option<String>,
        /// Only scrape threads started by this account
        #[arg(long)]
        user: Option<String>,
    },

    /// Search a user's posts on the board, scrape them, then exit
    ScrapeUser {
        /// Account whose posts to scrape
        user: String,
    },

    /// Scrape one thread or single-post page by URL, then exit
    ScrapeThread {
        /// Thread (C.php) or single-post (Co.php) URL
        url: String,
    },

    /// Fetch the comment feed of one stored post, then exit
    FetchComments {
        /// Forum-wide post serial (snB)
        post_no: i64,
    },

    /// Clear music flags on posts whose links are gone, then exit
    Cleanup,

    /// Probe the live forum and report whether every landmark still extracts
    CheckLayout {
        /// Client to probe with
        #[arg(long, value_enum, default_value = "http")]
        client: ClientChoice,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ClientChoice {
    Http,
    Browser,
    All,
}
