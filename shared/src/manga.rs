use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Target audience of a series, as reported by the catalog.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Demographic {
    Shounen,
    Shoujo,
    Seinen,
    Josei,
    Unknown,
}

impl Demographic {
    /// The catalog sends lowercase labels and omits the field entirely for
    /// some series; anything unrecognized maps to `Unknown`.
    pub fn from_api(s: &str) -> Self {
        match s {
            "shounen" => Demographic::Shounen,
            "shoujo" => Demographic::Shoujo,
            "seinen" => Demographic::Seinen,
            "josei" => Demographic::Josei,
            _ => Demographic::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Demographic::Shounen => "Shounen",
            Demographic::Shoujo => "Shoujo",
            Demographic::Seinen => "Seinen",
            Demographic::Josei => "Josei",
            Demographic::Unknown => "Unknown",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PubStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
}

impl PubStatus {
    pub fn from_api(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(PubStatus::Ongoing),
            "completed" => Some(PubStatus::Completed),
            "hiatus" => Some(PubStatus::Hiatus),
            "cancelled" => Some(PubStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PubStatus::Ongoing => "Ongoing",
            PubStatus::Completed => "Completed",
            PubStatus::Hiatus => "Hiatus",
            PubStatus::Cancelled => "Cancelled",
        }
    }
}

/// A genre or prominent element of a series. Tag identity is shared across
/// the whole library; the id is assigned by the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub tag_id: u32,
    pub tag_title: String,
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag_title)
    }
}

/// A review of a series. Rating is intended as some n/100.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Review {
    pub manga_id: String,
    pub rating: i32,
    pub rev: String,
}

/// One chapter of a series. Immutable after sync except for the two status
/// flags, which only ever go from false to true.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Chapter {
    pub chapter_hash: String,
    pub chapter_num: f64,
    pub chapter_name: String,
    pub volume_num: i32,
    pub manga_id: String,
    pub downloaded: bool,
    pub is_read: bool,
    pub chapter_path: PathBuf,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Manga {
    pub manga_id: String,
    pub ser_title: String,
    pub full_title: String,
    pub descr: String,
    #[serde(with = "time::serde::rfc3339")]
    pub time_modified: OffsetDateTime,
    pub last_volume: i32,
    pub last_chapter: f64,
    pub demographic: Demographic,
    pub pub_status: PubStatus,
    pub tags: Vec<Tag>,
    pub chapters: Vec<Chapter>,
}

/// Canonical chapter ordering: volume-major, but only when both volumes are
/// known (nonzero); otherwise chapter number decides.
///
/// NOTE: This is not a total order over mixed inputs. A chapter with an
/// unknown volume compares against everything by chapter number alone, so
/// e.g. (vol 0, ch 5) sorts after (vol 2, ch 1) even though (vol 2, ch 1)
/// sorts before (vol 3, ch 0). Kept as-is for compatibility with existing
/// libraries; do not "fix" the tie-break without migrating stored data.
pub fn compare_chapters(a: &Chapter, b: &Chapter) -> Ordering {
    if a.volume_num != 0 && b.volume_num != 0 && a.volume_num != b.volume_num {
        return a.volume_num.cmp(&b.volume_num);
    }

    a.chapter_num.total_cmp(&b.chapter_num)
}

/// Deterministic location for a chapter's pages:
/// `<root>/<ser_title>/<volume, two digits>/<chapter, 000.0>-<hash>`.
pub fn chapter_path<P>(
    library_root: P,
    ser_title: &str,
    volume_num: i32,
    chapter_num: f64,
    chapter_hash: &str,
) -> PathBuf
where
    P: AsRef<Path>,
{
    let mut path = library_root.as_ref().to_path_buf();
    path.push(ser_title);
    path.push(format!("{:02}", volume_num));
    path.push(format!("{:05.1}-{}", chapter_num, chapter_hash));

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(volume_num: i32, chapter_num: f64) -> Chapter {
        Chapter {
            chapter_hash: format!("{}-{}", volume_num, chapter_num),
            chapter_num,
            chapter_name: String::new(),
            volume_num,
            manga_id: "manga".to_string(),
            downloaded: false,
            is_read: false,
            chapter_path: PathBuf::new(),
        }
    }

    #[test]
    fn both_volumes_known_orders_by_volume() {
        let a = chapter(2, 11.0);
        let b = chapter(3, 0.0);
        assert_eq!(compare_chapters(&a, &b), Ordering::Less);
        assert_eq!(compare_chapters(&b, &a), Ordering::Greater);
    }

    #[test]
    fn same_volume_orders_by_chapter_number() {
        let a = chapter(2, 10.5);
        let b = chapter(2, 10.0);
        assert_eq!(compare_chapters(&a, &b), Ordering::Greater);
    }

    #[test]
    fn unknown_volume_falls_back_to_chapter_number() {
        // (vol 0, ch 5) vs (vol 2, ch 1) compares 5 against 1, ignoring
        // the known volume on the right side.
        let a = chapter(0, 5.0);
        let b = chapter(2, 1.0);
        assert_eq!(compare_chapters(&a, &b), Ordering::Greater);
    }

    #[test]
    fn equal_chapters_compare_equal() {
        let a = chapter(1, 4.0);
        let b = chapter(1, 4.0);
        assert_eq!(compare_chapters(&a, &b), Ordering::Equal);
    }

    #[test]
    fn path_is_zero_padded() {
        let path = chapter_path("/media/manga", "st", 3, 12.5, "abc123");
        assert_eq!(
            path,
            PathBuf::from("/media/manga/st/03/012.5-abc123")
        );
    }

    #[test]
    fn path_pads_whole_chapter_numbers() {
        let path = chapter_path("/media/manga", "st", 0, 7.0, "h");
        assert_eq!(path, PathBuf::from("/media/manga/st/00/007.0-h"));
    }

    #[test]
    fn demographic_from_api_defaults_to_unknown() {
        assert_eq!(Demographic::from_api("seinen"), Demographic::Seinen);
        assert_eq!(Demographic::from_api(""), Demographic::Unknown);
        assert_eq!(Demographic::from_api("none"), Demographic::Unknown);
    }

    #[test]
    fn pub_status_rejects_unknown_labels() {
        assert_eq!(PubStatus::from_api("hiatus"), Some(PubStatus::Hiatus));
        assert_eq!(PubStatus::from_api("axed"), None);
    }
}
