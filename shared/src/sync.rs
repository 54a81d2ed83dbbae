use std::path::Path;

use log::{info, warn};
use time::OffsetDateTime;

use crate::catalog::{Catalog, FeedItem};
use crate::error::{Error, Result};
use crate::manga::{
    chapter_path, compare_chapters, Chapter, Demographic, Manga, PubStatus,
};
use crate::store::Store;

pub const FEED_PAGE_LIMIT: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// Only request chapters published at or after the last recorded sync.
    NewSince,
    /// Re-request the whole feed. Picks up chapters the catalog re-sorted or
    /// back-filled, at the cost of paging through everything again.
    Full,
}

/// A feed item the sync skipped instead of aborting the whole run.
#[derive(Debug)]
pub struct SkippedChapter {
    pub chapter_hash: String,
    pub error: Error,
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub manga: Manga,
    /// Chapters fetched from the feed this run, before dedup by the store.
    pub fetched: usize,
    pub skipped: Vec<SkippedChapter>,
}

/// Turn one raw feed record into a canonical chapter.
///
/// Title falls back to `"Ch. <number>"` when the feed has none. The chapter
/// number must parse; the volume is best-effort (integer, then truncated
/// float, then 0) because some sources ship fractional or garbage volume
/// labels.
fn normalize_chapter(
    item: &FeedItem,
    manga_id: &str,
    ser_title: &str,
    library_root: &Path,
) -> Result<Chapter> {
    let raw_title = item.attributes.title.as_deref().unwrap_or("");
    let raw_volume = item.attributes.volume.as_deref().unwrap_or("");
    let raw_chapter = item.attributes.chapter.as_deref().unwrap_or("");

    let chapter_name = if raw_title.is_empty() {
        format!("Ch. {}", raw_chapter)
    } else {
        raw_title.to_string()
    };

    let chapter_num = if raw_chapter.is_empty() {
        0.0
    } else {
        raw_chapter
            .parse::<f64>()
            .map_err(|_| Error::ChapterNumParseFailed(raw_chapter.to_string()))?
    };

    let volume_num = if raw_volume.is_empty() {
        0
    } else {
        match raw_volume.parse::<i32>() {
            Ok(v) => v,
            Err(_) => raw_volume
                .parse::<f64>()
                .map(|v| v as i32)
                .unwrap_or(0),
        }
    };

    let path =
        chapter_path(library_root, ser_title, volume_num, chapter_num, &item.id);

    Ok(Chapter {
        chapter_hash: item.id.clone(),
        chapter_num,
        chapter_name,
        volume_num,
        manga_id: manga_id.to_string(),
        downloaded: false,
        is_read: false,
        chapter_path: path,
    })
}

/// Pull the series feed and merge its chapters into the store.
///
/// Pages are fetched at a fixed size of 50 until the server-reported total
/// is exhausted; at least one page is always fetched. Feed items with a
/// malformed chapter number are skipped and reported in the outcome rather
/// than failing the run. On success the manga's sync time is advanced.
pub fn sync_feed<C, S>(
    catalog: &C,
    store: &mut S,
    mut manga: Manga,
    mode: SyncMode,
    library_root: &Path,
) -> Result<SyncOutcome>
where
    C: Catalog,
    S: Store,
{
    let since = match mode {
        SyncMode::NewSince => Some(manga.time_modified),
        SyncMode::Full => None,
    };

    let mut fetched = Vec::new();
    let mut skipped = Vec::new();

    let mut offset = 0;
    loop {
        let page = catalog.feed_page(
            &manga.manga_id,
            offset,
            FEED_PAGE_LIMIT,
            since,
        )?;

        for item in &page.data {
            match normalize_chapter(
                item,
                &manga.manga_id,
                &manga.ser_title,
                library_root,
            ) {
                Ok(chapter) => fetched.push(chapter),
                Err(error) => {
                    warn!("{}: skipping feed item: {:?}", item.id, error);
                    skipped.push(SkippedChapter {
                        chapter_hash: item.id.clone(),
                        error,
                    });
                }
            }
        }

        offset += FEED_PAGE_LIMIT;
        if offset >= page.total {
            break;
        }
    }

    let num_fetched = fetched.len();
    info!(
        "{}: fetched {} chapter(s), skipped {}",
        manga.ser_title,
        num_fetched,
        skipped.len()
    );

    manga.chapters.extend(fetched);
    manga.chapters.sort_by(compare_chapters);

    store.insert_or_ignore_chapters(&manga.chapters)?;
    let manga = store.update_sync_time(&manga)?;

    Ok(SyncOutcome {
        manga,
        fetched: num_fetched,
        skipped,
    })
}

/// Fetch series metadata from the catalog and register it as a new library
/// entry. Chapters are not touched here; run a sync for that.
pub fn register_manga<C, S>(
    catalog: &C,
    store: &mut S,
    series_id: &str,
    full_title: &str,
    ser_title: &str,
) -> Result<Manga>
where
    C: Catalog,
    S: Store,
{
    let meta = catalog.series_metadata(series_id)?;
    let attrs = meta.data.attributes;

    let tag_names = attrs
        .tags
        .iter()
        .filter_map(|t| t.attributes.name.en.clone())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    let tags = store.insert_tags_if_absent(&tag_names)?;

    let demographic = Demographic::from_api(
        attrs.publication_demographic.as_deref().unwrap_or(""),
    );
    let pub_status = PubStatus::from_api(&attrs.status)
        .ok_or_else(|| Error::UnknownPubStatus(attrs.status.clone()))?;

    // The catalog leaves these unset for ongoing series.
    let last_volume = attrs
        .last_volume
        .as_deref()
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);
    let last_chapter = attrs
        .last_chapter
        .as_deref()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);

    let manga = Manga {
        manga_id: meta.data.id,
        ser_title: ser_title.to_string(),
        full_title: full_title.to_string(),
        descr: attrs.description.en.unwrap_or_default(),
        time_modified: OffsetDateTime::UNIX_EPOCH,
        last_volume,
        last_chapter,
        demographic,
        pub_status,
        tags: tags.clone(),
        chapters: Vec::new(),
    };

    store.insert_manga(&manga)?;
    store.link_tags(&manga.manga_id, &tags)?;

    info!("registered '{}' as {}", manga.full_title, manga.ser_title);

    Ok(manga)
}
