use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::manga::{Chapter, Demographic, Manga, PubStatus, Review, Tag};

/// The contract the engine consumes from durable storage. The engine never
/// issues queries of its own; everything goes through these operations.
pub trait Store {
    fn insert_manga(&mut self, manga: &Manga) -> Result<()>;

    /// Insert chapters, silently dropping any whose hash is already known.
    /// The catalog sometimes returns duplicates; re-syncing must not error
    /// and must not duplicate rows.
    fn insert_or_ignore_chapters(&mut self, chapters: &[Chapter]) -> Result<()>;

    /// Make sure a tag row exists for every name, then return the tags with
    /// their store-assigned ids, in input order.
    fn insert_tags_if_absent(&mut self, names: &[String]) -> Result<Vec<Tag>>;

    fn link_tags(&mut self, manga_id: &str, tags: &[Tag]) -> Result<()>;

    /// Flip `downloaded` to true and return the updated chapter. The flag is
    /// monotonic; nothing in the engine ever resets it.
    fn update_chapter_downloaded(&mut self, chapter: &Chapter) -> Result<Chapter>;

    fn update_chapter_read(&mut self, chapter: &Chapter) -> Result<()>;

    /// Advance `time_modified` to now and return the updated manga.
    fn update_sync_time(&mut self, manga: &Manga) -> Result<Manga>;

    fn insert_review(&mut self, review: &Review) -> Result<()>;

    fn get_review(&self, manga_id: &str) -> Result<Option<Review>>;

    fn get_by_id(&self, manga_id: &str) -> Result<Manga>;

    fn get_all(&self) -> Result<Vec<Manga>>;
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct MangaRow {
    manga_id: String,
    ser_title: String,
    full_title: String,
    descr: String,
    #[serde(with = "time::serde::rfc3339")]
    time_modified: OffsetDateTime,
    last_volume: i32,
    last_chapter: f64,
    demographic: Demographic,
    pub_status: PubStatus,
}

impl MangaRow {
    fn from_manga(manga: &Manga) -> Self {
        Self {
            manga_id: manga.manga_id.clone(),
            ser_title: manga.ser_title.clone(),
            full_title: manga.full_title.clone(),
            descr: manga.descr.clone(),
            time_modified: manga.time_modified,
            last_volume: manga.last_volume,
            last_chapter: manga.last_chapter,
            demographic: manga.demographic,
            pub_status: manga.pub_status,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct TagLink {
    manga_id: String,
    tag_id: u32,
}

#[derive(Serialize, Deserialize, Default, Debug)]
struct LibraryFile {
    mangas: Vec<MangaRow>,
    chapters: Vec<Chapter>,
    tags: Vec<Tag>,
    manga_tags: Vec<TagLink>,
    reviews: Vec<Review>,
}

/// Single-file JSON store. Every mutation is written back to disk before the
/// call returns; single-process usage is assumed throughout.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    data: LibraryFile,
}

impl JsonStore {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref().to_path_buf();

        let data = if path.is_file() {
            let s = fs::read_to_string(&path).map_err(Error::StoreReadFailed)?;
            serde_json::from_str::<LibraryFile>(&s)
                .map_err(Error::StoreParseFailed)?
        } else {
            LibraryFile::default()
        };

        debug!(
            "opened store {:?} ({} mangas, {} chapters)",
            path,
            data.mangas.len(),
            data.chapters.len()
        );

        Ok(Self { path, data })
    }

    fn save(&self) -> Result<()> {
        let s = serde_json::to_string_pretty(&self.data)
            .map_err(Error::StoreParseFailed)?;
        fs::write(&self.path, s).map_err(Error::StoreWriteFailed)
    }

    fn assemble(&self, row: &MangaRow) -> Manga {
        let chapters = self
            .data
            .chapters
            .iter()
            .filter(|c| c.manga_id == row.manga_id)
            .cloned()
            .collect::<Vec<_>>();

        let tags = self
            .data
            .manga_tags
            .iter()
            .filter(|l| l.manga_id == row.manga_id)
            .filter_map(|l| {
                self.data.tags.iter().find(|t| t.tag_id == l.tag_id)
            })
            .cloned()
            .collect::<Vec<_>>();

        Manga {
            manga_id: row.manga_id.clone(),
            ser_title: row.ser_title.clone(),
            full_title: row.full_title.clone(),
            descr: row.descr.clone(),
            time_modified: row.time_modified,
            last_volume: row.last_volume,
            last_chapter: row.last_chapter,
            demographic: row.demographic,
            pub_status: row.pub_status,
            tags,
            chapters,
        }
    }
}

impl Store for JsonStore {
    fn insert_manga(&mut self, manga: &Manga) -> Result<()> {
        if self.data.mangas.iter().any(|m| m.manga_id == manga.manga_id) {
            return Err(Error::DuplicateManga(manga.manga_id.clone()));
        }

        if self.data.mangas.iter().any(|m| m.ser_title == manga.ser_title) {
            return Err(Error::DuplicateSerTitle(manga.ser_title.clone()));
        }

        self.data.mangas.push(MangaRow::from_manga(manga));
        self.insert_or_ignore_chapters(&manga.chapters)?;
        self.save()
    }

    fn insert_or_ignore_chapters(&mut self, chapters: &[Chapter]) -> Result<()> {
        let mut added = 0;

        for chapter in chapters {
            let known = self
                .data
                .chapters
                .iter()
                .any(|c| c.chapter_hash == chapter.chapter_hash);
            if !known {
                self.data.chapters.push(chapter.clone());
                added += 1;
            }
        }

        debug!("inserted {} of {} chapter(s)", added, chapters.len());
        self.save()
    }

    fn insert_tags_if_absent(&mut self, names: &[String]) -> Result<Vec<Tag>> {
        let mut next_id = self
            .data
            .tags
            .iter()
            .map(|t| t.tag_id)
            .max()
            .unwrap_or(0)
            + 1;

        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            let tag = match self.data.tags.iter().find(|t| &t.tag_title == name)
            {
                Some(tag) => tag.clone(),
                None => {
                    let tag = Tag {
                        tag_id: next_id,
                        tag_title: name.clone(),
                    };
                    next_id += 1;
                    self.data.tags.push(tag.clone());
                    tag
                }
            };
            tags.push(tag);
        }

        self.save()?;
        Ok(tags)
    }

    fn link_tags(&mut self, manga_id: &str, tags: &[Tag]) -> Result<()> {
        for tag in tags {
            let linked = self
                .data
                .manga_tags
                .iter()
                .any(|l| l.manga_id == manga_id && l.tag_id == tag.tag_id);
            if !linked {
                self.data.manga_tags.push(TagLink {
                    manga_id: manga_id.to_string(),
                    tag_id: tag.tag_id,
                });
            }
        }

        self.save()
    }

    fn update_chapter_downloaded(&mut self, chapter: &Chapter) -> Result<Chapter> {
        let row = self
            .data
            .chapters
            .iter_mut()
            .find(|c| c.chapter_hash == chapter.chapter_hash)
            .ok_or_else(|| {
                Error::NoChapterWithHash(chapter.chapter_hash.clone())
            })?;

        row.downloaded = true;
        let updated = row.clone();

        self.save()?;
        Ok(updated)
    }

    fn update_chapter_read(&mut self, chapter: &Chapter) -> Result<()> {
        let row = self
            .data
            .chapters
            .iter_mut()
            .find(|c| c.chapter_hash == chapter.chapter_hash)
            .ok_or_else(|| {
                Error::NoChapterWithHash(chapter.chapter_hash.clone())
            })?;

        row.is_read = true;
        self.save()
    }

    fn update_sync_time(&mut self, manga: &Manga) -> Result<Manga> {
        let now = OffsetDateTime::now_utc();

        let row = self
            .data
            .mangas
            .iter_mut()
            .find(|m| m.manga_id == manga.manga_id)
            .ok_or_else(|| Error::NoMangaWithId(manga.manga_id.clone()))?;

        row.time_modified = now;
        self.save()?;

        let mut updated = manga.clone();
        updated.time_modified = now;
        Ok(updated)
    }

    fn insert_review(&mut self, review: &Review) -> Result<()> {
        match self
            .data
            .reviews
            .iter_mut()
            .find(|r| r.manga_id == review.manga_id)
        {
            Some(row) => *row = review.clone(),
            None => self.data.reviews.push(review.clone()),
        }

        self.save()
    }

    fn get_review(&self, manga_id: &str) -> Result<Option<Review>> {
        Ok(self
            .data
            .reviews
            .iter()
            .find(|r| r.manga_id == manga_id)
            .cloned())
    }

    fn get_by_id(&self, manga_id: &str) -> Result<Manga> {
        let row = self
            .data
            .mangas
            .iter()
            .find(|m| m.manga_id == manga_id)
            .ok_or_else(|| Error::NoMangaWithId(manga_id.to_string()))?;

        Ok(self.assemble(row))
    }

    fn get_all(&self) -> Result<Vec<Manga>> {
        Ok(self.data.mangas.iter().map(|r| self.assemble(r)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manga(id: &str, ser_title: &str) -> Manga {
        Manga {
            manga_id: id.to_string(),
            ser_title: ser_title.to_string(),
            full_title: format!("The Full {}", ser_title),
            descr: String::new(),
            time_modified: OffsetDateTime::UNIX_EPOCH,
            last_volume: 0,
            last_chapter: 0.0,
            demographic: Demographic::Unknown,
            pub_status: PubStatus::Ongoing,
            tags: Vec::new(),
            chapters: Vec::new(),
        }
    }

    fn chapter(hash: &str, manga_id: &str) -> Chapter {
        Chapter {
            chapter_hash: hash.to_string(),
            chapter_num: 1.0,
            chapter_name: "Ch. 1".to_string(),
            volume_num: 0,
            manga_id: manga_id.to_string(),
            downloaded: false,
            is_read: false,
            chapter_path: PathBuf::from("/tmp/x"),
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> JsonStore {
        JsonStore::open(dir.path().join("library.json")).unwrap()
    }

    #[test]
    fn insert_or_ignore_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.insert_manga(&manga("m1", "st")).unwrap();

        let chapters =
            vec![chapter("a", "m1"), chapter("b", "m1"), chapter("a", "m1")];
        store.insert_or_ignore_chapters(&chapters).unwrap();
        assert_eq!(store.get_by_id("m1").unwrap().chapters.len(), 2);

        // Second run over the same input changes nothing.
        store.insert_or_ignore_chapters(&chapters).unwrap();
        assert_eq!(store.get_by_id("m1").unwrap().chapters.len(), 2);
    }

    #[test]
    fn ser_title_is_unique() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.insert_manga(&manga("m1", "st")).unwrap();
        let res = store.insert_manga(&manga("m2", "st"));
        assert!(matches!(res, Err(Error::DuplicateSerTitle(_))));
    }

    #[test]
    fn duplicate_manga_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.insert_manga(&manga("m1", "st")).unwrap();
        let res = store.insert_manga(&manga("m1", "other"));
        assert!(matches!(res, Err(Error::DuplicateManga(_))));
    }

    #[test]
    fn downloaded_flag_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");

        {
            let mut store = JsonStore::open(&path).unwrap();
            store.insert_manga(&manga("m1", "st")).unwrap();
            store
                .insert_or_ignore_chapters(&[chapter("a", "m1")])
                .unwrap();

            let updated =
                store.update_chapter_downloaded(&chapter("a", "m1")).unwrap();
            assert!(updated.downloaded);
        }

        let store = JsonStore::open(&path).unwrap();
        let m = store.get_by_id("m1").unwrap();
        assert!(m.chapters[0].downloaded);
        assert!(!m.chapters[0].is_read);
    }

    #[test]
    fn updating_unknown_chapter_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        let res = store.update_chapter_downloaded(&chapter("nope", "m1"));
        assert!(matches!(res, Err(Error::NoChapterWithHash(_))));
    }

    #[test]
    fn tags_get_stable_ids_and_no_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        let first = store
            .insert_tags_if_absent(&[
                "Action".to_string(),
                "Comedy".to_string(),
            ])
            .unwrap();
        let second = store
            .insert_tags_if_absent(&[
                "Comedy".to_string(),
                "Drama".to_string(),
            ])
            .unwrap();

        assert_eq!(first[1].tag_id, second[0].tag_id);
        assert_eq!(second[1].tag_title, "Drama");

        store.insert_manga(&manga("m1", "st")).unwrap();
        store.link_tags("m1", &first).unwrap();
        store.link_tags("m1", &first).unwrap();

        assert_eq!(store.get_by_id("m1").unwrap().tags.len(), 2);
    }

    #[test]
    fn sync_time_advances() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        let m = manga("m1", "st");
        store.insert_manga(&m).unwrap();

        let updated = store.update_sync_time(&m).unwrap();
        assert!(updated.time_modified > OffsetDateTime::UNIX_EPOCH);
        assert_eq!(
            store.get_by_id("m1").unwrap().time_modified,
            updated.time_modified
        );
    }

    #[test]
    fn review_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_store(&dir);

        store.insert_manga(&manga("m1", "st")).unwrap();
        assert!(store.get_review("m1").unwrap().is_none());

        store
            .insert_review(&Review {
                manga_id: "m1".to_string(),
                rating: 85,
                rev: "peak".to_string(),
            })
            .unwrap();

        let rev = store.get_review("m1").unwrap().unwrap();
        assert_eq!(rev.rating, 85);
    }
}
