//! GTFS dataset refresh.
//!
//! Downloads the upstream zip, extracts and validates it in a staging
//! directory, and only then swaps it into the dataset directory. The swap
//! is a pair of renames, so a concurrently running server always finds a
//! complete dataset on disk: the old one or the new one, never a partial
//! extract. Any failure before the final rename leaves the existing data
//! untouched.
//!
//! This module has no timer of its own; the `gtfs_refresh` binary is run
//! by an external scheduler (cron, a systemd timer) once a day.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use chrono::{Days, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::GtfsConfig;
use crate::gtfs::{DataError, Snapshot};

/// Bodies smaller than this are an upstream error page, not a dataset.
const MIN_ARCHIVE_BYTES: usize = 1000;

/// How many days back to probe for the newest published dataset.
const MAX_PROBE_DAYS: u64 = 30;

/// Name of the version marker written into the dataset directory.
const VERSION_FILE: &str = "version.json";

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Network failure or bad HTTP status from the upstream source.
    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The response body is too small to be a dataset archive.
    #[error("download too small ({0} bytes), likely an upstream error page")]
    TooSmall(usize),

    /// Could not find any published dataset within the probe window.
    #[error("could not determine the latest dataset version")]
    NoVersion,

    /// The downloaded archive is not a readable zip.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The staged dataset failed to load as a snapshot.
    #[error("staged dataset failed validation: {0}")]
    Data(#[from] DataError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What a refresh run did.
#[derive(Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new dataset version was installed.
    Updated { version: String },
    /// The on-disk dataset already matches the newest upstream version.
    UpToDate { version: String },
}

/// Version marker stored alongside the dataset files.
#[derive(Debug, Serialize, Deserialize)]
struct VersionMarker {
    date: String,
    updated_at: String,
}

/// Downloads and installs GTFS datasets.
pub struct Updater {
    http: reqwest::Client,
    source_url: String,
    api_key: Option<String>,
    data_dir: PathBuf,
}

impl Updater {
    pub fn new(config: &GtfsConfig) -> Result<Self, UpdateError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            source_url: config.source_url.clone(),
            api_key: config.api_key.clone(),
            data_dir: config.data_dir.clone(),
        })
    }

    /// Fetch, validate and install the newest dataset.
    ///
    /// With `force` the version check is skipped and today's date is used
    /// as the version. Returns [`RefreshOutcome::UpToDate`] without
    /// downloading when the installed marker already matches upstream.
    pub async fn refresh(&self, force: bool) -> Result<RefreshOutcome, UpdateError> {
        let latest = if force {
            Local::now().format("%Y%m%d").to_string()
        } else {
            self.latest_version().await?
        };

        let current = read_version(&self.data_dir);
        info!(
            current = current.as_deref().unwrap_or("none"),
            latest = %latest,
            "checked dataset versions"
        );
        if !force && current.as_deref() == Some(latest.as_str()) {
            return Ok(RefreshOutcome::UpToDate { version: latest });
        }

        let body = self.download(&latest).await?;
        install_dataset(&body, &self.data_dir, &latest)?;
        info!(version = %latest, bytes = body.len(), "installed new GTFS dataset");
        Ok(RefreshOutcome::Updated { version: latest })
    }

    /// Probe for the newest published dataset date, walking back from
    /// today. The source publishes one archive per day and keeps history,
    /// so the first date that answers is the newest.
    async fn latest_version(&self) -> Result<String, UpdateError> {
        let today = Local::now().date_naive();
        for days_ago in 0..MAX_PROBE_DAYS {
            let Some(date) = today.checked_sub_days(Days::new(days_ago)) else {
                break;
            };
            let date_str = date.format("%Y%m%d").to_string();
            let response = self
                .http
                .head(&self.source_url)
                .query(&self.query(&date_str))
                .send()
                .await;
            match response {
                Ok(r) if r.status().is_success() || r.status().is_redirection() => {
                    return Ok(date_str);
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(date = %date_str, "version probe failed: {e}");
                    continue;
                }
            }
        }
        Err(UpdateError::NoVersion)
    }

    async fn download(&self, version: &str) -> Result<Vec<u8>, UpdateError> {
        let response = self
            .http
            .get(&self.source_url)
            .query(&self.query(version))
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        if body.len() < MIN_ARCHIVE_BYTES {
            return Err(UpdateError::TooSmall(body.len()));
        }
        Ok(body.to_vec())
    }

    fn query(&self, date: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![("date", date.to_string())];
        if let Some(key) = &self.api_key {
            query.push(("acl:consumerKey", key.clone()));
        }
        query
    }
}

/// Extract `archive` into a staging directory, validate it loads as a
/// snapshot, and swap it into `data_dir`.
pub fn install_dataset(archive: &[u8], data_dir: &Path, version: &str) -> Result<(), UpdateError> {
    let parent = match data_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    // Stage next to the destination so the final renames stay on one
    // filesystem.
    let staging = tempfile::tempdir_in(parent)?;
    extract_archive(archive, staging.path())?;

    // A dataset that does not load is never published.
    Snapshot::load(staging.path())?;

    write_version(staging.path(), version)?;
    swap_into_place(staging.keep(), data_dir)?;
    Ok(())
}

/// Flatten the zip into `dest`; GTFS archives are flat lists of text
/// files, but some sources nest them under a directory.
fn extract_archive(archive: &[u8], dest: &Path) -> Result<(), UpdateError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = Path::new(entry.name()).file_name().map(ToOwned::to_owned) else {
            continue;
        };
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        std::fs::write(dest.join(name), contents)?;
    }
    Ok(())
}

/// Publish `staging` as `data_dir` with two renames. The old dataset is
/// moved aside first and restored if the second rename fails.
fn swap_into_place(staging: PathBuf, data_dir: &Path) -> Result<(), UpdateError> {
    let old = data_dir.with_extension("old");
    if old.exists() {
        std::fs::remove_dir_all(&old)?;
    }

    let had_previous = data_dir.exists();
    if had_previous {
        std::fs::rename(data_dir, &old)?;
    }

    if let Err(e) = std::fs::rename(&staging, data_dir) {
        if had_previous {
            if let Err(restore) = std::fs::rename(&old, data_dir) {
                warn!("failed to restore previous dataset: {restore}");
            }
        }
        return Err(e.into());
    }

    if had_previous {
        if let Err(e) = std::fs::remove_dir_all(&old) {
            warn!("failed to remove old dataset: {e}");
        }
    }
    Ok(())
}

/// Read the installed dataset version, if any.
pub fn read_version(data_dir: &Path) -> Option<String> {
    let text = std::fs::read_to_string(data_dir.join(VERSION_FILE)).ok()?;
    let marker: VersionMarker = serde_json::from_str(&text).ok()?;
    Some(marker.date)
}

fn write_version(dir: &Path, version: &str) -> Result<(), UpdateError> {
    let marker = VersionMarker {
        date: version.to_string(),
        updated_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
    };
    let text = serde_json::to_string_pretty(&marker).unwrap_or_default();
    std::fs::write(dir.join(VERSION_FILE), text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_archive() -> Vec<u8> {
        build_archive(&[
            ("stops.txt", "stop_id,stop_name\nS1,Station Front\n"),
            (
                "trips.txt",
                "route_id,service_id,trip_id,trip_headsign\nR1,SVC,T1,Central Station\n",
            ),
            (
                "stop_times.txt",
                "trip_id,departure_time,stop_id,stop_sequence\nT1,07:00:00,S1,1\n",
            ),
            (
                "calendar_dates.txt",
                "service_id,date,exception_type\nSVC,20240315,1\n",
            ),
        ])
    }

    fn build_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            for (name, contents) in files {
                writer
                    .start_file(*name, zip::write::FileOptions::default())
                    .unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn installs_valid_dataset() {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data");

        install_dataset(&valid_archive(), &data_dir, "20240314").unwrap();

        let snapshot = Snapshot::load(&data_dir).unwrap();
        assert_eq!(snapshot.stop_count(), 1);
        assert_eq!(read_version(&data_dir).as_deref(), Some("20240314"));
    }

    #[test]
    fn replaces_previous_dataset() {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data");

        install_dataset(&valid_archive(), &data_dir, "20240313").unwrap();

        let newer = build_archive(&[
            ("stops.txt", "stop_id,stop_name\nS1,Renamed Stop\n"),
            (
                "trips.txt",
                "route_id,service_id,trip_id,trip_headsign\nR1,SVC,T1,Central Station\n",
            ),
            (
                "stop_times.txt",
                "trip_id,departure_time,stop_id,stop_sequence\nT1,07:00:00,S1,1\n",
            ),
            (
                "calendar_dates.txt",
                "service_id,date,exception_type\nSVC,20240315,1\n",
            ),
        ]);
        install_dataset(&newer, &data_dir, "20240314").unwrap();

        let snapshot = Snapshot::load(&data_dir).unwrap();
        assert_eq!(snapshot.stop("S1").unwrap().name, "Renamed Stop");
        assert_eq!(read_version(&data_dir).as_deref(), Some("20240314"));
        assert!(!data_dir.with_extension("old").exists());
    }

    #[test]
    fn corrupt_archive_leaves_previous_dataset_serving() {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data");
        install_dataset(&valid_archive(), &data_dir, "20240313").unwrap();

        // Simulates a download cut off partway through.
        let full = valid_archive();
        let err = install_dataset(&full[..100], &data_dir, "20240314").unwrap_err();
        assert!(matches!(err, UpdateError::Archive(_)));

        let snapshot = Snapshot::load(&data_dir).unwrap();
        assert_eq!(snapshot.stop_count(), 1);
        assert_eq!(read_version(&data_dir).as_deref(), Some("20240313"));
    }

    #[test]
    fn invalid_staged_dataset_is_rejected_before_swap() {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data");
        install_dataset(&valid_archive(), &data_dir, "20240313").unwrap();

        // Readable zip, but missing stop_times.txt.
        let incomplete = build_archive(&[
            ("stops.txt", "stop_id,stop_name\nS1,Station Front\n"),
            (
                "trips.txt",
                "route_id,service_id,trip_id,trip_headsign\nR1,SVC,T1,Central Station\n",
            ),
            (
                "calendar_dates.txt",
                "service_id,date,exception_type\nSVC,20240315,1\n",
            ),
        ]);
        let err = install_dataset(&incomplete, &data_dir, "20240314").unwrap_err();
        assert!(matches!(
            err,
            UpdateError::Data(DataError::MissingFile(_))
        ));

        assert!(Snapshot::load(&data_dir).is_ok());
        assert_eq!(read_version(&data_dir).as_deref(), Some("20240313"));
    }

    #[test]
    fn nested_archive_entries_are_flattened() {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("data");

        let nested = build_archive(&[
            ("feed/stops.txt", "stop_id,stop_name\nS1,Station Front\n"),
            (
                "feed/trips.txt",
                "route_id,service_id,trip_id,trip_headsign\nR1,SVC,T1,Central Station\n",
            ),
            (
                "feed/stop_times.txt",
                "trip_id,departure_time,stop_id,stop_sequence\nT1,07:00:00,S1,1\n",
            ),
            (
                "feed/calendar_dates.txt",
                "service_id,date,exception_type\nSVC,20240315,1\n",
            ),
        ]);
        install_dataset(&nested, &data_dir, "20240314").unwrap();
        assert!(Snapshot::load(&data_dir).is_ok());
    }

    #[test]
    fn version_roundtrip_and_missing_marker() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_version(dir.path()), None);
        write_version(dir.path(), "20240314").unwrap();
        assert_eq!(read_version(dir.path()).as_deref(), Some("20240314"));
    }
}
