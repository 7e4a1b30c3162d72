//! Background music catalogue.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reel_models::AssetHandle;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::{AssetError, AssetResult};
use crate::http::{ensure_success, stream_to_file, with_retry};

/// File name of the downloaded (untrimmed) clip inside the request directory.
pub const MUSIC_SOURCE_FILE: &str = "music-source.mp3";

/// Music collaborator.
#[async_trait]
pub trait MusicGeneration: Send + Sync {
    /// Fetch one clip for `genre`, writing under `dest_dir` if it must be downloaded.
    async fn generate_music(&self, genre: &str, dest_dir: &Path) -> AssetResult<AssetHandle>;
}

/// How a clip is picked from a genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    #[default]
    Random,
    First,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::Random => f.write_str("random"),
            SelectionPolicy::First => f.write_str("first"),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(SelectionPolicy::Random),
            "first" => Ok(SelectionPolicy::First),
            other => Err(format!("unknown music selection policy: {}", other)),
        }
    }
}

/// Genre to clip ids (URL-encoded file names).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicCatalogue {
    genres: BTreeMap<String, Vec<String>>,
}

impl Default for MusicCatalogue {
    fn default() -> Self {
        let mut genres = BTreeMap::new();
        genres.insert(
            "corporate".to_string(),
            to_owned(&[
                "Aurora%20on%20the%20Boulevard%20-%20National%20Sweetheart.mp3",
                "Champion%20-%20Telecasted.mp3",
                "Crystaline%20-%20Quincas%20Moreira.mp3",
                "Final%20Soliloquy%20-%20Asher%20Fulero.mp3",
                "Hopeful%20-%20Nat%20Keefe.mp3",
                "Hopeful%20Freedom%20-%20Asher%20Fulero.mp3",
                "Name%20The%20Time%20And%20Place%20-%20Telecasted.mp3",
                "Organic%20Guitar%20House%20-%20Dyalla.mp3",
                "Phantom%20-%20Density%20%26%20Time.mp3",
                "Touch%20-%20Anno%20Domini%20Beats.mp3",
                "Traversing%20-%20Godmode.mp3",
            ]),
        );
        genres.insert(
            "upbeat".to_string(),
            to_owned(&[
                "Baby%20Animals%20Playing%20-%20Joel%20Cummins.mp3",
                "Banjo%20Doops%20-%20Joel%20Cummins.mp3",
                "Buckle%20Up%20-%20Jeremy%20Korpas.mp3",
                "Cafecito%20por%20la%20Manana%20-%20Cumbia%20Deli.mp3",
                "Jetski%20-%20Telecasted.mp3",
                "Like%20It%20Loud%20-%20Dyalla.mp3",
                "Oh%20Please%20-%20Telecasted.mp3",
                "Seagull%20-%20Telecasted.mp3",
                "Sly%20Sky%20-%20Telecasted.mp3",
                "Twin%20Engines%20-%20Jeremy%20Korpas.mp3",
            ]),
        );
        genres.insert(
            "realtor".to_string(),
            to_owned(&[
                "Heartbeat%20Of%20The%20Wind%20-%20Asher%20Fulero.mp3",
                "Hopeful%20-%20Nat%20Keefe.mp3",
                "Hopeful%20Freedom%20-%20Asher%20Fulero.mp3",
                "No.2%20Remembering%20Her%20-%20Esther%20Abrami.mp3",
                "Organic%20Guitar%20House%20-%20Dyalla.mp3",
                "Phantom%20-%20Density%20%26%20Time.mp3",
                "Touch%20-%20Anno%20Domini%20Beats.mp3",
                "Traversing%20-%20Godmode.mp3",
            ]),
        );
        genres.insert(
            "traditional".to_string(),
            to_owned(&[
                "Curse%20of%20the%20Witches%20-%20Jimena%20Contreras.mp3",
                "Delayed%20Baggage%20-%20Ryan%20Stasik.mp3",
                "Honey%2C%20I%20Dismembered%20The%20Kids%20-%20Ezra%20Lipp.mp3",
                "Hopeless%20-%20Jimena%20Contreras.mp3",
                "Night%20Hunt%20-%20Jimena%20Contreras.mp3",
                "On%20The%20Hunt%20-%20Andrew%20Langdon.mp3",
                "Restless%20Heart%20-%20Jimena%20Contreras.mp3",
                "Sinister%20-%20Anno%20Domini%20Beats.mp3",
            ]),
        );
        Self { genres }
    }
}

fn to_owned(clips: &[&str]) -> Vec<String> {
    clips.iter().map(|c| c.to_string()).collect()
}

impl MusicCatalogue {
    /// Catalogue from explicit genre lists; genre keys are matched case-insensitively.
    pub fn new<I, G, C>(genres: I) -> Self
    where
        I: IntoIterator<Item = (G, Vec<C>)>,
        G: Into<String>,
        C: Into<String>,
    {
        Self {
            genres: genres
                .into_iter()
                .map(|(genre, clips)| {
                    (
                        genre.into().to_lowercase(),
                        clips.into_iter().map(Into::into).collect(),
                    )
                })
                .collect(),
        }
    }

    pub fn genres(&self) -> impl Iterator<Item = &str> {
        self.genres.keys().map(String::as_str)
    }

    /// Clip ids for a genre.
    pub fn clips(&self, genre: &str) -> AssetResult<&[String]> {
        let key = genre.trim().to_lowercase();
        match self.genres.get(&key) {
            Some(clips) if clips.is_empty() => Err(AssetError::EmptyGenre(key)),
            Some(clips) => Ok(clips),
            None => Err(AssetError::UnknownGenre(genre.to_string())),
        }
    }

    /// Pick one clip id for a genre.
    pub fn select(&self, genre: &str, policy: SelectionPolicy) -> AssetResult<&str> {
        let clips = self.clips(genre)?;
        let picked = match policy {
            SelectionPolicy::First => clips.first(),
            SelectionPolicy::Random => clips.choose(&mut rand::rng()),
        };
        picked
            .map(String::as_str)
            .ok_or_else(|| AssetError::EmptyGenre(genre.to_string()))
    }
}

/// Music source configuration.
#[derive(Debug, Clone)]
pub struct MusicConfig {
    /// Remote library root; clips are fetched from `{base_url}/{clip}`
    pub base_url: Option<String>,
    /// Local library root; takes precedence over `base_url`
    pub library_dir: Option<PathBuf>,
    pub selection: SelectionPolicy,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            library_dir: None,
            selection: SelectionPolicy::Random,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl MusicConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("MUSIC_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string()),
            library_dir: std::env::var("MUSIC_LIBRARY_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            selection: std::env::var("MUSIC_SELECTION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            timeout: Duration::from_secs(
                std::env::var("MUSIC_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: 2,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() || self.library_dir.is_some()
    }
}

/// Catalogue-backed music provider.
pub struct CatalogueMusic {
    http: Client,
    catalogue: MusicCatalogue,
    config: MusicConfig,
}

impl CatalogueMusic {
    pub fn new(catalogue: MusicCatalogue, config: MusicConfig) -> AssetResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AssetError::Network)?;
        Ok(Self {
            http,
            catalogue,
            config,
        })
    }

    pub fn from_env() -> AssetResult<Self> {
        Self::new(MusicCatalogue::default(), MusicConfig::from_env())
    }

    pub fn catalogue(&self) -> &MusicCatalogue {
        &self.catalogue
    }

    async fn download(&self, base_url: &str, clip: &str, dest_dir: &Path) -> AssetResult<AssetHandle> {
        let url = format!("{}/{}", base_url, clip);
        debug!("Downloading music clip {}", url);

        let response = with_retry(self.config.max_retries, || async {
            let response = self.http.get(&url).send().await?;
            ensure_success(response).await
        })
        .await?;

        let path = dest_dir.join(MUSIC_SOURCE_FILE);
        let bytes = stream_to_file(response, &path).await?;
        info!(bytes, clip, "Music clip downloaded");
        Ok(AssetHandle::owned(path, dest_dir))
    }
}

#[async_trait]
impl MusicGeneration for CatalogueMusic {
    async fn generate_music(&self, genre: &str, dest_dir: &Path) -> AssetResult<AssetHandle> {
        let clip = self.catalogue.select(genre, self.config.selection)?.to_string();

        if let Some(dir) = &self.config.library_dir {
            let name = urlencoding::decode(&clip)
                .map_err(|e| AssetError::InvalidResponse(format!("bad clip id {clip}: {e}")))?;
            let path = dir.join(name.as_ref());
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(AssetError::MediaMissing(path));
            }
            debug!(genre, "Using library clip {}", path.display());
            return Ok(AssetHandle::shared(path));
        }

        match &self.config.base_url {
            Some(base_url) => self.download(base_url, &clip, dest_dir).await,
            None => Err(AssetError::NotConfigured(
                "MUSIC_BASE_URL or MUSIC_LIBRARY_DIR".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_catalogue() {
        let catalogue = MusicCatalogue::default();
        assert_eq!(
            catalogue.genres().collect::<Vec<_>>(),
            vec!["corporate", "realtor", "traditional", "upbeat"]
        );
        assert_eq!(catalogue.clips("corporate").unwrap().len(), 11);
        assert_eq!(catalogue.clips("UpBeat").unwrap().len(), 10);
    }

    #[test]
    fn test_unknown_and_empty_genre() {
        let catalogue = MusicCatalogue::new([("ambient", Vec::<String>::new())]);
        assert!(matches!(
            catalogue.clips("ambient"),
            Err(AssetError::EmptyGenre(_))
        ));
        assert!(matches!(
            catalogue.clips("polka"),
            Err(AssetError::UnknownGenre(_))
        ));
    }

    #[test]
    fn test_selection_policies() {
        let catalogue = MusicCatalogue::default();
        let first = catalogue.select("upbeat", SelectionPolicy::First).unwrap();
        assert_eq!(first, "Baby%20Animals%20Playing%20-%20Joel%20Cummins.mp3");

        let clips = catalogue.clips("realtor").unwrap();
        for _ in 0..20 {
            let picked = catalogue.select("realtor", SelectionPolicy::Random).unwrap();
            assert!(clips.iter().any(|c| c == picked));
        }
    }

    #[tokio::test]
    async fn test_library_dir_resolves_decoded_name() {
        let library = tempfile::tempdir().unwrap();
        std::fs::write(library.path().join("Jetski - Telecasted.mp3"), b"mp3").unwrap();

        let music = CatalogueMusic::new(
            MusicCatalogue::new([("upbeat", vec!["Jetski%20-%20Telecasted.mp3"])]),
            MusicConfig {
                library_dir: Some(library.path().to_path_buf()),
                ..Default::default()
            },
        )
        .unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let handle = music.generate_music("upbeat", scratch.path()).await.unwrap();
        assert_eq!(handle.basename(), "Jetski - Telecasted.mp3");
        assert!(handle.owning_dir().is_none());
    }

    #[tokio::test]
    async fn test_remote_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Jetski%20-%20Telecasted.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let music = CatalogueMusic::new(
            MusicCatalogue::new([("upbeat", vec!["Jetski%20-%20Telecasted.mp3"])]),
            MusicConfig {
                base_url: Some(server.uri()),
                ..Default::default()
            },
        )
        .unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let handle = music.generate_music("upbeat", scratch.path()).await.unwrap();
        assert_eq!(handle.basename(), MUSIC_SOURCE_FILE);
        assert_eq!(std::fs::read(handle.path()).unwrap(), b"mp3-bytes");
    }

    #[tokio::test]
    async fn test_unconfigured_source() {
        let music = CatalogueMusic::new(MusicCatalogue::default(), MusicConfig::default()).unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let err = music.generate_music("upbeat", scratch.path()).await.unwrap_err();
        assert!(matches!(err, AssetError::NotConfigured(_)));
    }
}
