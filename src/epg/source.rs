//! Where a listing comes from: the on-disk cache, the remote guide, or a file
//! picked by the user.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::parser::{EpgParser, Listing};
use crate::error::{EpgError, Result};

/// Download configuration
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds
    pub read_timeout_secs: u64,
    /// Chunk size for reading (bytes)
    pub chunk_size: usize,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            retry_delay_ms: 2000,
            connect_timeout_secs: 30,
            read_timeout_secs: 120,
            chunk_size: 64 * 1024,
            user_agent: concat!("EpgViewer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Download progress callback: (downloaded_bytes, total_bytes)
pub type ProgressCallback = Box<dyn Fn(u64, Option<u64>) + Send>;

/// Fetches a guide document over HTTP(S)
pub struct EpgDownloader;

impl EpgDownloader {
    fn create_agent(config: &DownloadConfig) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.read_timeout_secs)))
            .timeout_connect(Some(Duration::from_secs(config.connect_timeout_secs)))
            .build()
            .new_agent()
    }

    /// Fetch the body of `url` into memory, retrying up to `max_attempts` times
    pub fn download(
        url: &str,
        config: &DownloadConfig,
        progress: Option<&ProgressCallback>,
    ) -> Result<Vec<u8>> {
        let agent = Self::create_agent(config);
        let max_attempts = config.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            match Self::try_download(&agent, url, config, progress) {
                Ok(body) => {
                    info!("downloaded {} bytes from {}", body.len(), url);
                    return Ok(body);
                }
                Err(e) if attempts >= max_attempts => return Err(e),
                Err(e) => {
                    warn!("download attempt {}/{} failed: {}", attempts, max_attempts, e);
                    std::thread::sleep(Duration::from_millis(config.retry_delay_ms));
                }
            }
        }
    }

    fn try_download(
        agent: &ureq::Agent,
        url: &str,
        config: &DownloadConfig,
        progress: Option<&ProgressCallback>,
    ) -> Result<Vec<u8>> {
        use std::io::Read;

        let response = agent
            .get(url)
            .header("User-Agent", &config.user_agent)
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => EpgError::Status(code),
                other => EpgError::Http(other),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EpgError::Status(status.as_u16()));
        }

        let total_size: Option<u64> = response
            .headers()
            .get("Content-Length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        let mut reader = response.into_body().into_reader();
        let mut body = Vec::with_capacity(total_size.unwrap_or(0) as usize);
        let mut buffer = vec![0u8; config.chunk_size.max(1)];

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    body.extend_from_slice(&buffer[..n]);
                    if let Some(cb) = progress {
                        cb(body.len() as u64, total_size);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(body)
    }
}

/// Which path produced the current listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Cache,
    Network,
    File,
}

impl LoadOrigin {
    pub fn label(&self) -> &'static str {
        match self {
            LoadOrigin::Cache => "cache",
            LoadOrigin::Network => "internet",
            LoadOrigin::File => "file",
        }
    }
}

/// Remote guide plus its local cache
#[derive(Debug, Clone)]
pub struct ListingSource {
    pub url: String,
    pub cache_path: PathBuf,
    pub download: DownloadConfig,
}

impl ListingSource {
    pub fn new(url: impl Into<String>, cache_path: impl Into<PathBuf>, download: DownloadConfig) -> Self {
        Self {
            url: url.into(),
            cache_path: cache_path.into(),
            download,
        }
    }

    pub fn has_cache(&self) -> bool {
        self.cache_path.exists()
    }

    /// Startup load: the cached document if present, otherwise a fresh download
    pub fn load(&self, progress: Option<&ProgressCallback>) -> Result<(Listing, LoadOrigin)> {
        if self.has_cache() {
            debug!("loading cached listing from {}", self.cache_path.display());
            let listing = EpgParser::parse_file(&self.cache_path)?;
            return Ok((listing, LoadOrigin::Cache));
        }
        info!("no cached listing at {}, downloading", self.cache_path.display());
        let listing = self.refresh(progress)?;
        Ok((listing, LoadOrigin::Network))
    }

    /// Download the guide, overwrite the cache with the raw body, then parse it.
    /// Nothing is written when the download fails.
    pub fn refresh(&self, progress: Option<&ProgressCallback>) -> Result<Listing> {
        let body = EpgDownloader::download(&self.url, &self.download, progress)?;

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.cache_path, &body)?;
        debug!("cached {} bytes at {}", body.len(), self.cache_path.display());

        EpgParser::parse_bytes(&body)
    }

    /// Parse a user-chosen file. The cache is left alone.
    pub fn import(path: &Path) -> Result<Listing> {
        info!("importing listing from {}", path.display());
        EpgParser::parse_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    const XML: &str = r#"<tv><channel id="CNN"/><programme start="20240115120000" channel="CNN"><title>News</title></programme></tv>"#;

    fn unreachable_source(dir: &Path) -> ListingSource {
        // Port 9 (discard) is closed on any sane test host
        ListingSource::new(
            "http://127.0.0.1:9/epg.xml",
            dir.join("cache").join("epg.xml"),
            DownloadConfig {
                connect_timeout_secs: 2,
                read_timeout_secs: 2,
                ..DownloadConfig::default()
            },
        )
    }

    /// Answer exactly one HTTP request on a local port with `status` and `body`
    fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else { return };
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&chunk[..n]),
                }
            }
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        });
        format!("http://{}/epg.xml", addr)
    }

    fn local_source(dir: &Path, url: String) -> ListingSource {
        ListingSource {
            url,
            ..unreachable_source(dir)
        }
    }

    fn gzipped(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_refresh_overwrites_cache_with_exact_body() {
        let dir = tempfile::tempdir().unwrap();
        let body = gzipped(XML.as_bytes());
        let source = local_source(dir.path(), serve_once("200 OK", body.clone()));
        fs::create_dir_all(source.cache_path.parent().unwrap()).unwrap();
        fs::write(&source.cache_path, "<tv><channel id=\"old\"/></tv>").unwrap();

        let received = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&received);
        let progress: ProgressCallback = Box::new(move |done, _total| seen.store(done, Ordering::SeqCst));

        let listing = source.refresh(Some(&progress)).unwrap();
        assert_eq!(listing.channels[0].id, "CNN");
        assert_eq!(fs::read(&source.cache_path).unwrap(), body);
        assert_eq!(received.load(Ordering::SeqCst), body.len() as u64);
    }

    #[test]
    fn test_load_without_cache_downloads_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let source = local_source(dir.path(), serve_once("200 OK", XML.as_bytes().to_vec()));
        assert!(!source.has_cache());

        let (listing, origin) = source.load(None).unwrap();
        assert_eq!(origin, LoadOrigin::Network);
        assert_eq!(listing.programmes[0].title, "News");
        assert_eq!(fs::read_to_string(&source.cache_path).unwrap(), XML);
    }

    #[test]
    fn test_server_error_keeps_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = local_source(
            dir.path(),
            serve_once("500 Internal Server Error", b"oops".to_vec()),
        );
        fs::create_dir_all(source.cache_path.parent().unwrap()).unwrap();
        fs::write(&source.cache_path, XML).unwrap();

        let err = source.refresh(None).unwrap_err();
        assert!(matches!(err, EpgError::Status(500)), "got {:?}", err);
        assert_eq!(fs::read_to_string(&source.cache_path).unwrap(), XML);
    }

    #[test]
    fn test_load_prefers_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = unreachable_source(dir.path());
        fs::create_dir_all(source.cache_path.parent().unwrap()).unwrap();
        fs::write(&source.cache_path, XML).unwrap();

        let (listing, origin) = source.load(None).unwrap();
        assert_eq!(origin, LoadOrigin::Cache);
        assert_eq!(listing.channel_count(), 1);
        assert_eq!(listing.programme_count(), 1);
    }

    #[test]
    fn test_corrupt_cache_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = unreachable_source(dir.path());
        fs::create_dir_all(source.cache_path.parent().unwrap()).unwrap();
        fs::write(&source.cache_path, "<tv><channel id=\"x\">").unwrap();

        assert!(source.load(None).is_err());
    }

    #[test]
    fn test_failed_refresh_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = unreachable_source(dir.path());

        assert!(source.refresh(None).is_err());
        assert!(!source.has_cache());
    }

    #[test]
    fn test_import_does_not_touch_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = unreachable_source(dir.path());
        let picked = dir.path().join("picked.xml");
        fs::write(&picked, XML).unwrap();

        let listing = ListingSource::import(&picked).unwrap();
        assert_eq!(listing.programmes[0].title, "News");
        assert!(!source.has_cache());
    }
}
