// src/recipe/kitchen/archive.rs

//! Source fetching and archive extraction for the Kitchen

use crate::error::{Error, Result};
use crate::hash;
use crate::recipe::format::SourceLocator;
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::Archive;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use xz2::read::XzDecoder;

/// Timeout for source downloads
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Produces a fresh, unpacked source tree for a locator
///
/// Implementations never retry; any transport or integrity problem is a
/// `SourceFetchFailed` error.
pub trait SourceFetcher: Send + Sync {
    /// Populate the empty directory `dest` with the upstream source
    fn fetch(&self, locator: &SourceLocator, dest: &Path) -> Result<()>;
}

/// Archive formats unpacked in-process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    Tar,
}

impl ArchiveFormat {
    /// Detect the format from a file name
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// Default fetcher: local directories, local archives and HTTP(S) downloads
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    source_cache: PathBuf,
    offline: bool,
}

impl ArchiveFetcher {
    pub fn new(source_cache: impl Into<PathBuf>, offline: bool) -> Self {
        Self {
            source_cache: source_cache.into(),
            offline,
        }
    }

    pub fn source_cache(&self) -> &Path {
        &self.source_cache
    }

    /// Digest recorded for an unpinned source on its first download
    fn recorded_digest_path(&self, cache_key: &str) -> PathBuf {
        self.source_cache.join(format!("{}.sha256", cache_key))
    }

    /// Download a remote archive into the cache, or reuse a verified copy
    ///
    /// A locator without a sha256 is pinned on first download: the digest is
    /// recorded next to the cache entry and every later fetch must match it.
    fn cached_download(&self, locator: &SourceLocator) -> Result<PathBuf> {
        let failed = |reason: String| Error::SourceFetchFailed {
            locator: locator.url.clone(),
            reason,
        };

        fs::create_dir_all(&self.source_cache)
            .map_err(|e| failed(format!("cannot create source cache: {}", e)))?;

        let cache_key = match &locator.sha256 {
            Some(digest) => hash::normalize(digest),
            None => format!(
                "{}-{}",
                &hash::sha256(locator.url.as_bytes())[..16],
                locator.file_name()
            ),
        };
        let cached_path = self.source_cache.join(&cache_key);
        let record_path = self.recorded_digest_path(&cache_key);

        let recorded = match &locator.sha256 {
            Some(_) => None,
            None => match fs::read_to_string(&record_path) {
                Ok(text) => Some(text.trim().to_string()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => return Err(failed(format!("cannot read recorded digest: {}", e))),
            },
        };
        let expected = locator.sha256.clone().or_else(|| recorded.clone());

        if cached_path.exists() {
            match &expected {
                Some(expected) => match hash::verify_file_sha256(&cached_path, expected) {
                    Ok(()) => {
                        debug!("Using cached source: {}", cached_path.display());
                        return Ok(cached_path);
                    }
                    Err(e) => {
                        warn!("Cached source is corrupt ({}), downloading again", e);
                        fs::remove_file(&cached_path)
                            .map_err(|e| failed(format!("cannot evict cache entry: {}", e)))?;
                    }
                },
                None => {
                    // Entry predates digest recording
                    let digest = hash::sha256_file(&cached_path)
                        .map_err(|e| failed(e.to_string()))?;
                    record_digest(&record_path, &digest).map_err(failed)?;
                    warn!(
                        "{} has no sha256; pinned cached copy to sha256 = \"{}\"",
                        locator.url, digest
                    );
                    return Ok(cached_path);
                }
            }
        }

        if self.offline {
            return Err(failed("not in the source cache and offline mode is set".to_string()));
        }

        info!("Downloading: {}", locator.url);
        let temp_path = self.source_cache.join(format!("{}.tmp", cache_key));
        download(&locator.url, &temp_path).map_err(failed)?;

        match &expected {
            Some(expected) => {
                if let Err(e) = hash::verify_file_sha256(&temp_path, expected) {
                    let _ = fs::remove_file(&temp_path);
                    let reason = if recorded.is_some() {
                        format!("upstream archive changed since it was first downloaded: {}", e)
                    } else {
                        e.to_string()
                    };
                    return Err(failed(reason));
                }
            }
            None => {
                let digest = hash::sha256_file(&temp_path).map_err(|e| failed(e.to_string()))?;
                record_digest(&record_path, &digest).map_err(failed)?;
                warn!(
                    "{} has no sha256; pinned first download to sha256 = \"{}\"",
                    locator.url, digest
                );
            }
        }

        fs::rename(&temp_path, &cached_path)
            .map_err(|e| failed(format!("cannot move download into cache: {}", e)))?;
        Ok(cached_path)
    }
}

/// Persist the digest an unpinned source was first seen with
fn record_digest(path: &Path, digest: &str) -> std::result::Result<(), String> {
    fs::write(path, format!("{}\n", digest))
        .map_err(|e| format!("cannot record digest in {}: {}", path.display(), e))
}

impl SourceFetcher for ArchiveFetcher {
    fn fetch(&self, locator: &SourceLocator, dest: &Path) -> Result<()> {
        let failed = |reason: String| Error::SourceFetchFailed {
            locator: locator.url.clone(),
            reason,
        };

        let archive = match locator.local_path() {
            Some(path) if path.is_dir() => {
                let root = if locator.strip_root {
                    single_top_level_dir(path)
                        .map_err(|e| failed(e.to_string()))?
                        .unwrap_or_else(|| path.to_path_buf())
                } else {
                    path.to_path_buf()
                };
                copy_tree(&root, dest).map_err(|e| failed(e.to_string()))?;
                info!("Copied source tree from {}", root.display());
                return Ok(());
            }
            Some(path) if path.is_file() => {
                if let Some(expected) = &locator.sha256 {
                    hash::verify_file_sha256(path, expected).map_err(|e| failed(e.to_string()))?;
                }
                path.to_path_buf()
            }
            Some(path) => {
                return Err(failed(format!("{} does not exist", path.display())));
            }
            None => self.cached_download(locator)?,
        };

        let format = ArchiveFormat::from_file_name(&locator.file_name())
            .ok_or_else(|| failed(format!("unknown archive format: {}", locator.file_name())))?;
        unpack(&archive, format, dest, locator.strip_root).map_err(|e| failed(e.to_string()))?;
        info!("Unpacked {} into {}", locator.file_name(), dest.display());
        Ok(())
    }
}

/// Fetch `url` into `dest` with a blocking client
fn download(url: &str, dest: &Path) -> std::result::Result<(), String> {
    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| format!("cannot create HTTP client: {}", e))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| format!("request failed: {}", e))?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    let mut file = File::create(dest).map_err(|e| format!("cannot create {}: {}", dest.display(), e))?;
    response
        .copy_to(&mut file)
        .map_err(|e| format!("download interrupted: {}", e))?;
    Ok(())
}

/// Extract an archive into `dest`, optionally dropping its single top-level
/// directory
pub fn unpack(archive: &Path, format: ArchiveFormat, dest: &Path, strip_root: bool) -> Result<()> {
    let parent = dest.parent().unwrap_or(dest);
    fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".galley-unpack")
        .tempdir_in(parent)?;

    let file = BufReader::new(File::open(archive)?);
    let reader: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
        ArchiveFormat::TarXz => Box::new(XzDecoder::new(file)),
        ArchiveFormat::Tar => Box::new(file),
    };
    Archive::new(reader).unpack(staging.path()).map_err(|e| {
        Error::IoError(format!("Failed to extract {}: {}", archive.display(), e))
    })?;

    let root = if strip_root {
        single_top_level_dir(staging.path())?.unwrap_or_else(|| staging.path().to_path_buf())
    } else {
        staging.path().to_path_buf()
    };

    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(&root)? {
        let entry = entry?;
        fs::rename(entry.path(), dest.join(entry.file_name()))?;
    }
    debug!("Extracted {} into {}", archive.display(), dest.display());
    Ok(())
}

/// The only entry of `dir`, when that entry is a directory
fn single_top_level_dir(dir: &Path) -> io::Result<Option<PathBuf>> {
    let entries: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<_>>()?;
    match entries.as_slice() {
        [only] if only.file_type()?.is_dir() => Ok(Some(only.path())),
        _ => Ok(None),
    }
}

/// Recursively copy a directory tree
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry =
            entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {}", src.display(), e)))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::IoError(e.to_string()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        } else {
            debug!("Skipping non-regular file {}", entry.path().display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn locator(url: &str, sha256: Option<String>) -> SourceLocator {
        SourceLocator {
            url: url.to_string(),
            sha256,
            strip_root: true,
        }
    }

    fn make_tar_gz(dir: &Path) -> PathBuf {
        let path = dir.join("demo-1.0.tar.gz");
        let file = File::create(&path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let content = b"project(Demo)\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "demo-1.0/CMakeLists.txt", &content[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ArchiveFormat::from_file_name("a.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("a.TGZ"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("a.tar.xz"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_file_name("a.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_file_name("a.zip"), None);
    }

    #[test]
    fn test_fetch_local_archive_strips_root() {
        let work = TempDir::new().unwrap();
        let archive = make_tar_gz(work.path());
        let digest = hash::sha256_file(&archive).unwrap();
        let dest = work.path().join("src");

        let fetcher = ArchiveFetcher::new(work.path().join("cache"), true);
        fetcher
            .fetch(&locator(archive.to_str().unwrap(), Some(digest)), &dest)
            .unwrap();

        assert_eq!(
            fs::read_to_string(dest.join("CMakeLists.txt")).unwrap(),
            "project(Demo)\n"
        );
    }

    #[test]
    fn test_fetch_checksum_mismatch() {
        let work = TempDir::new().unwrap();
        let archive = make_tar_gz(work.path());
        let fetcher = ArchiveFetcher::new(work.path().join("cache"), true);

        let err = fetcher
            .fetch(
                &locator(archive.to_str().unwrap(), Some("0".repeat(64))),
                &work.path().join("src"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::SourceFetchFailed { .. }));
    }

    #[test]
    fn test_fetch_local_directory() {
        let work = TempDir::new().unwrap();
        let upstream = work.path().join("upstream");
        fs::create_dir_all(upstream.join("include")).unwrap();
        fs::write(upstream.join("CMakeLists.txt"), "project(X)\n").unwrap();
        fs::write(upstream.join("include/x.h"), "#pragma once\n").unwrap();

        let dest = work.path().join("src");
        let fetcher = ArchiveFetcher::new(work.path().join("cache"), true);
        fetcher
            .fetch(&locator(&format!("file://{}", upstream.display()), None), &dest)
            .unwrap();

        assert!(dest.join("CMakeLists.txt").is_file());
        assert!(dest.join("include/x.h").is_file());
    }

    #[test]
    fn test_offline_remote_not_cached() {
        let work = TempDir::new().unwrap();
        let fetcher = ArchiveFetcher::new(work.path().join("cache"), true);
        let err = fetcher
            .fetch(
                &locator("https://example.com/demo-1.0.tar.gz", Some("a".repeat(64))),
                &work.path().join("src"),
            )
            .unwrap_err();
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_remote_served_from_cache() {
        let work = TempDir::new().unwrap();
        let archive = make_tar_gz(work.path());
        let digest = hash::sha256_file(&archive).unwrap();
        let cache = work.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::copy(&archive, cache.join(&digest)).unwrap();

        let fetcher = ArchiveFetcher::new(&cache, true);
        let dest = work.path().join("src");
        fetcher
            .fetch(
                &locator("https://example.com/demo-1.0.tar.gz", Some(format!("sha256:{}", digest))),
                &dest,
            )
            .unwrap();
        assert!(dest.join("CMakeLists.txt").is_file());
    }

    fn unpinned_cache_key(url: &str) -> String {
        format!("{}-demo-1.0.tar.gz", &hash::sha256(url.as_bytes())[..16])
    }

    #[test]
    fn test_unpinned_source_records_digest() {
        let work = TempDir::new().unwrap();
        let archive = make_tar_gz(work.path());
        let digest = hash::sha256_file(&archive).unwrap();
        let url = "https://example.com/demo-1.0.tar.gz";
        let cache = work.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        let key = unpinned_cache_key(url);
        fs::copy(&archive, cache.join(&key)).unwrap();

        let fetcher = ArchiveFetcher::new(&cache, true);
        fetcher.fetch(&locator(url, None), &work.path().join("a")).unwrap();
        let recorded = fs::read_to_string(cache.join(format!("{}.sha256", key))).unwrap();
        assert_eq!(recorded.trim(), digest);

        // The recorded digest is checked on the next fetch
        fetcher.fetch(&locator(url, None), &work.path().join("b")).unwrap();
        assert!(work.path().join("b/CMakeLists.txt").is_file());
    }

    #[test]
    fn test_unpinned_source_rejects_changed_archive() {
        let work = TempDir::new().unwrap();
        let archive = make_tar_gz(work.path());
        let url = "https://example.com/demo-1.0.tar.gz";
        let cache = work.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        let key = unpinned_cache_key(url);
        fs::copy(&archive, cache.join(&key)).unwrap();
        fs::write(cache.join(format!("{}.sha256", key)), "b".repeat(64)).unwrap();

        let fetcher = ArchiveFetcher::new(&cache, true);
        let err = fetcher
            .fetch(&locator(url, None), &work.path().join("src"))
            .unwrap_err();
        assert!(matches!(err, Error::SourceFetchFailed { .. }));
        assert!(!cache.join(&key).exists());
        assert!(!work.path().join("src/CMakeLists.txt").exists());
    }

    #[test]
    fn test_missing_local_path() {
        let work = TempDir::new().unwrap();
        let fetcher = ArchiveFetcher::new(work.path().join("cache"), true);
        assert!(fetcher
            .fetch(&locator("/nonexistent/demo.tar.gz", None), &work.path().join("src"))
            .is_err());
    }
}
