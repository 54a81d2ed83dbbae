use std::io::Write;

use log::trace;
use reqwest::blocking::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::{Error, Result};

pub const API_ENDPOINT: &str = "https://api.mangadex.org";

/// Response to a `manga/{id}` query, trimmed down to the attributes the
/// library tracks.
#[derive(Deserialize, Debug)]
pub struct SeriesMetadata {
    pub data: SeriesData,
}

#[derive(Deserialize, Debug)]
pub struct SeriesData {
    pub id: String,
    pub attributes: SeriesAttributes,
}

#[derive(Deserialize, Debug)]
pub struct SeriesAttributes {
    pub title: LocalizedText,
    #[serde(rename = "altTitles", default)]
    pub alt_titles: Vec<AltTitle>,
    pub description: LocalizedText,
    #[serde(rename = "lastVolume")]
    pub last_volume: Option<String>,
    #[serde(rename = "lastChapter")]
    pub last_chapter: Option<String>,
    #[serde(rename = "publicationDemographic")]
    pub publication_demographic: Option<String>,
    pub status: String,
    #[serde(default)]
    pub tags: Vec<SeriesTag>,
}

#[derive(Deserialize, Debug)]
pub struct LocalizedText {
    #[serde(default)]
    pub en: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct AltTitle {
    #[serde(default)]
    pub ja: Option<String>,
    #[serde(rename = "ja-ro", default)]
    pub ja_ro: Option<String>,
    #[serde(default)]
    pub en: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SeriesTag {
    pub attributes: SeriesTagAttributes,
}

#[derive(Deserialize, Debug)]
pub struct SeriesTagAttributes {
    pub name: LocalizedText,
}

/// One page of a `manga/{id}/feed` query.
#[derive(Deserialize, Debug)]
pub struct FeedPage {
    pub data: Vec<FeedItem>,
    pub limit: usize,
    pub offset: usize,
    pub total: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FeedItem {
    pub id: String,
    pub attributes: FeedItemAttributes,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FeedItemAttributes {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
}

/// Response to an `at-home/server/{id}` query: the ephemeral delivery
/// endpoint plus the ordered page filenames for one chapter.
#[derive(Deserialize, Debug)]
pub struct ChapterDelivery {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    pub chapter: DeliveryChapter,
}

#[derive(Deserialize, Debug)]
pub struct DeliveryChapter {
    pub hash: String,
    pub data: Vec<String>,
}

/// Read-only view of the remote catalog service. Calls are blocking and
/// stateless; there is no retry logic at this layer.
pub trait Catalog {
    fn series_metadata(&self, series_id: &str) -> Result<SeriesMetadata>;

    fn feed_page(
        &self,
        series_id: &str,
        offset: usize,
        limit: usize,
        since: Option<OffsetDateTime>,
    ) -> Result<FeedPage>;

    fn chapter_delivery(&self, chapter_hash: &str) -> Result<ChapterDelivery>;

    fn page_bytes(&self, page_url: &str, dest: &mut dyn Write) -> Result<u64>;
}

#[derive(Clone, Debug)]
pub struct MdClient {
    endpoint: String,
    client: Client,
}

impl MdClient {
    pub fn new(endpoint: String) -> Self {
        // A hung request blocks the whole pipeline. Chapter pages can be
        // slow to come down, so no timeout is set.
        let client = ClientBuilder::new().timeout(None).build().unwrap();

        Self { endpoint, client }
    }

    fn get_json<T>(&self, url: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        trace!("GET {}", url);

        let res = self
            .client
            .get(url)
            .send()
            .map_err(Error::SendRequestFailed)?;

        let status = res.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(Error::RequestFailed(status));
        }

        res.json::<T>().map_err(Error::ResponseDecodeFailed)
    }
}

/// `publishAtSince` wants a bare ISO-8601 local timestamp, no zone suffix.
fn format_since(t: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

impl Catalog for MdClient {
    fn series_metadata(&self, series_id: &str) -> Result<SeriesMetadata> {
        let url = format!("{}/manga/{}", self.endpoint, series_id);
        self.get_json(&url)
    }

    fn feed_page(
        &self,
        series_id: &str,
        offset: usize,
        limit: usize,
        since: Option<OffsetDateTime>,
    ) -> Result<FeedPage> {
        let mut url = format!(
            "{}/manga/{}/feed?{}=en&includeExternalUrl=0&offset={}&limit={}",
            self.endpoint,
            series_id,
            urlencoding::encode("translatedLanguage[]"),
            offset,
            limit,
        );

        if let Some(since) = since {
            url.push_str("&publishAtSince=");
            url.push_str(&urlencoding::encode(&format_since(since)));
        }

        self.get_json(&url)
    }

    fn chapter_delivery(&self, chapter_hash: &str) -> Result<ChapterDelivery> {
        let url = format!("{}/at-home/server/{}", self.endpoint, chapter_hash);
        self.get_json(&url)
    }

    fn page_bytes(&self, page_url: &str, dest: &mut dyn Write) -> Result<u64> {
        trace!("GET {}", page_url);

        let mut res = self
            .client
            .get(page_url)
            .send()
            .map_err(Error::SendRequestFailed)?;

        let status = res.status();
        if !status.is_success() {
            return Err(Error::RequestFailed(status));
        }

        res.copy_to(dest).map_err(Error::WritePageFailed)
    }
}
