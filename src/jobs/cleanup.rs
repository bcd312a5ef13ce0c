use anyhow::Result;
use tracing::info;

use super::JobContext;
use crate::db::clear_music_flag_for_linkless_posts;

/// Drop the music flag from posts whose link set has become empty.
///
/// Link replacement keeps the flag consistent on its own; this catches rows
/// touched outside the scraper, e.g. by hand-run SQL.
pub(crate) async fn clear_stale_music_flags(ctx: &JobContext) -> Result<()> {
    let cleared = clear_music_flag_for_linkless_posts(ctx.db.pool()).await?;
    if cleared > 0 {
        info!(cleared, "Cleared stale music flags");
    }
    Ok(())
}
