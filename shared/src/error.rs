use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    // Remote catalog
    SendRequestFailed(reqwest::Error),
    RequestFailed(reqwest::StatusCode),
    NotFound(String),
    ResponseDecodeFailed(reqwest::Error),
    UnknownPubStatus(String),

    // Feed normalization
    ChapterNumParseFailed(String),

    // Download pipeline
    CreateDirFailed(PathBuf, std::io::Error),
    CreateFileFailed(PathBuf, std::io::Error),
    WritePageFailed(reqwest::Error),

    // Local store
    StoreReadFailed(std::io::Error),
    StoreParseFailed(serde_json::Error),
    StoreWriteFailed(std::io::Error),
    DuplicateManga(String),
    DuplicateSerTitle(String),
    NoMangaWithId(String),
    NoChapterWithHash(String),
}

pub type Result<T> = std::result::Result<T, Error>;
