use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tsundoku::catalog::API_ENDPOINT;

fn default_endpoint() -> String {
    API_ENDPOINT.to_string()
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    /// Where chapter directories are created.
    pub library_root: PathBuf,
    /// Where the library store file lives.
    pub store_path: PathBuf,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Config {
    pub fn load<P>(path: P) -> Result<Self, String>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();

        let s = read_to_string(path)
            .map_err(|e| format!("failed to read config {:?}: {}", path, e))?;
        serde_json::from_str::<Config>(&s)
            .map_err(|e| format!("invalid config {:?}: {}", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_to_public_api() {
        let config = serde_json::from_str::<Config>(
            r#"{"library_root": "/media/manga", "store_path": "/media/manga/library.json"}"#,
        )
        .unwrap();

        assert_eq!(config.endpoint, API_ENDPOINT);
        assert_eq!(config.library_root, PathBuf::from("/media/manga"));
    }
}
