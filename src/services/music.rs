//! Local music library with fetch-on-miss

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::engine::buffer::AudioBuffer;
use crate::engine::decode::decode_file;
use crate::error::{Result, SpotmixError};

/// Downloads a missing track into a directory
pub trait MusicFetcher {
    /// Fetch `filename` into `dest_dir`
    ///
    /// Returns `Ok(false)` when the remote catalog does not have the track.
    fn fetch(&self, filename: &str, dest_dir: &Path) -> Result<bool>;
}

/// URL of a track in a remote catalog; spaces become `%20`
pub fn track_url(base_url: &str, filename: &str) -> String {
    format!("{}{}", base_url, filename.replace(' ', "%20"))
}

/// Music tracks stored as files in one directory
pub struct MusicLibrary {
    dir: PathBuf,
    fetcher: Option<Box<dyn MusicFetcher>>,
}

impl MusicLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fetcher: None,
        }
    }

    /// Library over `dir` that downloads missing tracks from `base_url`
    ///
    /// Downloading needs the `catalog-http` feature. Without it a configured
    /// URL is logged and ignored.
    pub fn from_config(dir: impl Into<PathBuf>, base_url: Option<&str>) -> Result<Self> {
        let library = Self::new(dir);
        let base_url = match base_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(url) => url,
            None => return Ok(library),
        };

        attach_catalog(library, base_url)
    }

    /// Attach a hook that runs when a track is missing
    pub fn with_fetcher(mut self, fetcher: Box<dyn MusicFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn has_fetcher(&self) -> bool {
        self.fetcher.is_some()
    }

    /// Path of `filename`, fetching it first if absent
    ///
    /// # Errors
    /// * `InvalidField` - If the filename is empty or names another directory
    /// * `MusicFetch` - If the fetch hook failed
    /// * `MusicNotFound` - If the track is still absent afterwards
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;

        let path = self.dir.join(filename);
        if path.is_file() {
            return Ok(path);
        }

        if let Some(fetcher) = &self.fetcher {
            info!("Music file {} not found locally; fetching", filename);
            std::fs::create_dir_all(&self.dir)?;
            if !fetcher.fetch(filename, &self.dir)? {
                warn!("Catalog has no track named {}", filename);
            }
        }

        if path.is_file() {
            Ok(path)
        } else {
            Err(SpotmixError::MusicNotFound {
                filename: filename.to_string(),
            })
        }
    }

    /// Resolve and decode a track
    pub fn load(&self, filename: &str) -> Result<AudioBuffer> {
        let path = self.resolve(filename)?;
        decode_file(&path)
    }
}

#[cfg(feature = "catalog-http")]
fn attach_catalog(library: MusicLibrary, base_url: &str) -> Result<MusicLibrary> {
    info!(
        "Missing tracks in {} will be fetched from {}",
        library.dir.display(),
        base_url
    );
    Ok(library.with_fetcher(Box::new(HttpMusicFetcher::new(base_url)?)))
}

#[cfg(not(feature = "catalog-http"))]
fn attach_catalog(library: MusicLibrary, base_url: &str) -> Result<MusicLibrary> {
    warn!(
        "Ignoring catalog URL {}: built without the catalog-http feature",
        base_url
    );
    Ok(library)
}

fn validate_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(SpotmixError::MissingField {
            field: "music_filename",
        });
    }
    let single_component = Path::new(filename).components().count() == 1
        && Path::new(filename).file_name().is_some();
    if !single_component {
        return Err(SpotmixError::InvalidField {
            field: "music_filename",
            reason: format!("'{}' is not a plain file name", filename),
        });
    }
    Ok(())
}

/// Fetches tracks over HTTP from a base URL
#[cfg(feature = "catalog-http")]
pub struct HttpMusicFetcher {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "catalog-http")]
impl HttpMusicFetcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| SpotmixError::MusicFetch {
                filename: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[cfg(feature = "catalog-http")]
impl MusicFetcher for HttpMusicFetcher {
    fn fetch(&self, filename: &str, dest_dir: &Path) -> Result<bool> {
        use std::io::Write;

        let fetch_err = |reason: String| SpotmixError::MusicFetch {
            filename: filename.to_string(),
            reason,
        };

        let url = track_url(&self.base_url, filename);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| fetch_err(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(fetch_err(format!("{} returned {}", url, response.status())));
        }

        let bytes = response.bytes().map_err(|e| fetch_err(e.to_string()))?;
        let mut staged = tempfile::NamedTempFile::new_in(dest_dir)?;
        staged.write_all(&bytes)?;
        staged
            .persist(dest_dir.join(filename))
            .map_err(|e| SpotmixError::Io(e.error))?;

        info!("Downloaded {} ({} bytes)", filename, bytes.len());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{export_wav, generate_test_tone, ExportFormat};
    use std::cell::Cell;
    use tempfile::tempdir;

    /// Writes a short tone when asked for `available`
    struct FakeFetcher {
        available: &'static str,
        calls: std::rc::Rc<Cell<usize>>,
    }

    impl MusicFetcher for FakeFetcher {
        fn fetch(&self, filename: &str, dest_dir: &Path) -> Result<bool> {
            self.calls.set(self.calls.get() + 1);
            if filename != self.available {
                return Ok(false);
            }
            let tone = generate_test_tone(110.0, 0.3, 500, 44100);
            export_wav(&tone, &dest_dir.join(filename), ExportFormat::default())?;
            Ok(true)
        }
    }

    #[test]
    fn test_track_url_encodes_spaces() {
        assert_eq!(
            track_url("https://cdn.example.com/music/", "Sunny Day Loop.mp3"),
            "https://cdn.example.com/music/Sunny%20Day%20Loop.mp3"
        );
    }

    #[test]
    fn test_present_track_skips_fetch() {
        let dir = tempdir().unwrap();
        let tone = generate_test_tone(110.0, 0.3, 500, 44100);
        export_wav(&tone, &dir.path().join("bed.wav"), ExportFormat::default()).unwrap();

        let calls = std::rc::Rc::new(Cell::new(0));
        let library = MusicLibrary::new(dir.path()).with_fetcher(Box::new(FakeFetcher {
            available: "bed.wav",
            calls: calls.clone(),
        }));

        let music = library.load("bed.wav").unwrap();
        assert_eq!(music.duration_ms(), 500);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_missing_track_is_fetched() {
        let dir = tempdir().unwrap();
        let calls = std::rc::Rc::new(Cell::new(0));
        let library = MusicLibrary::new(dir.path().join("music")).with_fetcher(Box::new(
            FakeFetcher {
                available: "upbeat.wav",
                calls: calls.clone(),
            },
        ));

        let path = library.resolve("upbeat.wav").unwrap();
        assert!(path.exists());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unknown_track_not_found() {
        let dir = tempdir().unwrap();
        let calls = std::rc::Rc::new(Cell::new(0));
        let library = MusicLibrary::new(dir.path()).with_fetcher(Box::new(FakeFetcher {
            available: "upbeat.wav",
            calls: calls.clone(),
        }));

        let err = library.resolve("missing.wav").unwrap_err();
        assert!(matches!(err, SpotmixError::MusicNotFound { .. }));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_no_fetcher() {
        let dir = tempdir().unwrap();
        let library = MusicLibrary::new(dir.path());
        assert!(matches!(
            library.resolve("anything.mp3"),
            Err(SpotmixError::MusicNotFound { .. })
        ));
    }

    #[test]
    fn test_from_config_without_url() {
        let library = MusicLibrary::from_config("/music", None).unwrap();
        assert_eq!(library.dir(), Path::new("/music"));
        assert!(!library.has_fetcher());

        let blank = MusicLibrary::from_config("/music", Some("  ")).unwrap();
        assert!(!blank.has_fetcher());
    }

    #[cfg(feature = "catalog-http")]
    #[test]
    fn test_from_config_attaches_http_fetcher() {
        let library =
            MusicLibrary::from_config("/music", Some("https://cdn.example.com/music/")).unwrap();
        assert!(library.has_fetcher());
    }

    #[cfg(not(feature = "catalog-http"))]
    #[test]
    fn test_from_config_ignores_url_without_http() {
        let library =
            MusicLibrary::from_config("/music", Some("https://cdn.example.com/music/")).unwrap();
        assert!(!library.has_fetcher());
    }

    #[test]
    fn test_rejects_paths() {
        let library = MusicLibrary::new("/music");
        assert!(library.resolve("../secrets.mp3").unwrap_err().is_validation());
        assert!(library.resolve("a/b.mp3").unwrap_err().is_validation());
        assert!(library.resolve(" ").unwrap_err().is_validation());
    }
}
