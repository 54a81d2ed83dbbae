use std::fs::{self, File};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use regex::Regex;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::manga::Chapter;
use crate::store::Store;

/// Minimum gap between successive page-image requests, per the delivery
/// network's rate policy.
pub const PAGE_FETCH_INTERVAL: Duration = Duration::from_millis(350);

/// Gate in front of every page fetch. The download loop only ever calls
/// `wait`, so the fixed-interval policy below can be swapped for something
/// adaptive without touching the loop.
pub trait PageGate {
    fn wait(&mut self);
}

/// Blocks until at least `interval` has passed since the previous call.
/// The first call never blocks.
#[derive(Debug)]
pub struct IntervalGate {
    interval: Duration,
    last: Option<Instant>,
}

impl IntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }
}

impl Default for IntervalGate {
    fn default() -> Self {
        Self::new(PAGE_FETCH_INTERVAL)
    }
}

impl PageGate for IntervalGate {
    fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }

        self.last = Some(Instant::now());
    }
}

/// Normalize a delivery page name like
/// `x6-23b96047cdd7217e5f493894de6d536afa046e7a33695e539a6960e2a7304d35.jpg`
/// into `0000006.jpg`: the page index zero-padded to seven digits plus the
/// original extension. Names that don't fit the pattern are kept, padded to
/// the same width so they still sort.
fn page_file_name(raw: &str) -> String {
    static CLEANER: OnceLock<Regex> = OnceLock::new();
    let re = CLEANER.get_or_init(|| {
        Regex::new(r"^[A-Za-z]?(\d+)-.*(\.[a-z]+)$").unwrap()
    });

    match re.captures(raw) {
        Some(caps) => format!("{:0>7}{}", &caps[1], &caps[2]),
        None => format!("{:0>7}", raw),
    }
}

#[derive(Debug)]
pub struct FailedChapter {
    pub chapter: Chapter,
    pub error: Error,
}

#[derive(Debug)]
pub struct DownloadOutcome {
    /// Chapters that are downloaded after this run, including ones that
    /// already were and passed through untouched.
    pub completed: Vec<Chapter>,
    pub failed: Vec<FailedChapter>,
}

/// Fetch every page of one chapter and mark it downloaded. Any failure
/// abandons the whole chapter; there is no page-level resume, so a retry
/// starts over from the first page.
fn download_chapter<C, S>(
    catalog: &C,
    store: &mut S,
    gate: &mut dyn PageGate,
    chapter: &Chapter,
) -> Result<Chapter>
where
    C: Catalog,
    S: Store,
{
    let delivery = catalog.chapter_delivery(&chapter.chapter_hash)?;

    fs::create_dir_all(&chapter.chapter_path).map_err(|e| {
        Error::CreateDirFailed(chapter.chapter_path.clone(), e)
    })?;

    debug!(
        "{}: {} page(s) via {}",
        chapter.chapter_hash,
        delivery.chapter.data.len(),
        delivery.base_url
    );

    for page_name in &delivery.chapter.data {
        let page_url = format!(
            "{}/data/{}/{}",
            delivery.base_url, delivery.chapter.hash, page_name
        );
        let dest = chapter.chapter_path.join(page_file_name(page_name));

        gate.wait();

        let mut file = File::create(&dest)
            .map_err(|e| Error::CreateFileFailed(dest.clone(), e))?;
        catalog.page_bytes(&page_url, &mut file)?;
    }

    store.update_chapter_downloaded(chapter)
}

/// Download the given chapters one at a time, skipping any already marked
/// downloaded. A chapter that fails is reported in the outcome and the rest
/// still get their attempt; the caller decides what to retry.
pub fn download_chapters<C, S>(
    catalog: &C,
    store: &mut S,
    gate: &mut dyn PageGate,
    chapters: Vec<Chapter>,
) -> DownloadOutcome
where
    C: Catalog,
    S: Store,
{
    let mut completed = Vec::new();
    let mut failed = Vec::new();

    for chapter in chapters {
        if chapter.downloaded {
            completed.push(chapter);
            continue;
        }

        match download_chapter(catalog, store, gate, &chapter) {
            Ok(updated) => {
                info!("{}: downloaded", updated.chapter_hash);
                completed.push(updated);
            }
            Err(error) => {
                warn!("{}: download failed: {:?}", chapter.chapter_hash, error);
                failed.push(FailedChapter { chapter, error });
            }
        }
    }

    DownloadOutcome { completed, failed }
}
