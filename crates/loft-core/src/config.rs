//! Configuration module
//!
//! Configuration is read once from the environment at process start. The
//! storage volume list is the only hard requirement: a missing or malformed
//! `LOFT_STORAGE_VOLUMES` is fatal at startup, never a runtime-recoverable
//! error.

use std::env;
use std::path::PathBuf;

const SERVER_PORT: u16 = 4000;
const MAX_SESSION_AGE_SECS: u64 = 3600;
const MAX_SESSION_BYTES: u64 = 1024 * 1024 * 1024;
const MAX_CONCURRENT_TRANSCODES: usize = 2;
const JOB_QUEUE_SIZE: usize = 1000;

/// One storage volume as declared in configuration: a short name paired with
/// the directory it is mounted or symlinked to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeSpec {
    pub name: String,
    pub path: PathBuf,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    /// Base URL files are served under, e.g. "http://localhost:4000".
    pub base_url: String,
    /// Root directory volume shorthand entries resolve against.
    pub storage_root: PathBuf,
    /// Declared storage volumes, in configuration order.
    pub volumes: Vec<VolumeSpec>,
    /// When unset the process runs without a metadata store; uploads still
    /// land on disk but no file record is registered.
    pub database_url: Option<String>,
    pub max_session_age_secs: u64,
    pub max_session_bytes: u64,
    pub ffmpeg_path: String,
    pub max_concurrent_transcodes: usize,
    pub job_queue_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_root = PathBuf::from(
            env::var("LOFT_STORAGE_ROOT").unwrap_or_else(|_| "storage/files".to_string()),
        );

        let volumes_str = env::var("LOFT_STORAGE_VOLUMES").map_err(|_| {
            anyhow::anyhow!("LOFT_STORAGE_VOLUMES must be set (e.g. \"1,2,3\" or \"main=/mnt/a,spill=/mnt/b\")")
        })?;
        let volumes = parse_volumes(&volumes_str, &storage_root)?;

        Ok(Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            base_url: env::var("LOFT_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            storage_root,
            volumes,
            database_url: env::var("DATABASE_URL").ok(),
            max_session_age_secs: env::var("LOFT_MAX_SESSION_AGE_SECS")
                .unwrap_or_else(|_| MAX_SESSION_AGE_SECS.to_string())
                .parse()
                .unwrap_or(MAX_SESSION_AGE_SECS),
            max_session_bytes: env::var("LOFT_MAX_SESSION_BYTES")
                .unwrap_or_else(|_| MAX_SESSION_BYTES.to_string())
                .parse()
                .unwrap_or(MAX_SESSION_BYTES),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            max_concurrent_transcodes: env::var("LOFT_MAX_CONCURRENT_TRANSCODES")
                .unwrap_or_else(|_| MAX_CONCURRENT_TRANSCODES.to_string())
                .parse()
                .unwrap_or(MAX_CONCURRENT_TRANSCODES),
            job_queue_size: env::var("LOFT_JOB_QUEUE_SIZE")
                .unwrap_or_else(|_| JOB_QUEUE_SIZE.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_SIZE)
                .max(1),
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

/// Parse the volume declaration string.
///
/// Entries are comma-separated. `name=path` declares an explicit mount path;
/// a bare `name` resolves to `<storage_root>/<name>`.
pub fn parse_volumes(s: &str, storage_root: &std::path::Path) -> Result<Vec<VolumeSpec>, anyhow::Error> {
    let mut volumes = Vec::new();
    for entry in s.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let spec = match entry.split_once('=') {
            Some((name, path)) => {
                let name = name.trim();
                let path = path.trim();
                if name.is_empty() || path.is_empty() {
                    return Err(anyhow::anyhow!("invalid volume entry: {:?}", entry));
                }
                VolumeSpec {
                    name: name.to_string(),
                    path: PathBuf::from(path),
                }
            }
            None => VolumeSpec {
                name: entry.to_string(),
                path: storage_root.join(entry),
            },
        };
        if volumes.iter().any(|v: &VolumeSpec| v.name == spec.name) {
            return Err(anyhow::anyhow!("duplicate volume name: {}", spec.name));
        }
        volumes.push(spec);
    }
    if volumes.is_empty() {
        return Err(anyhow::anyhow!("LOFT_STORAGE_VOLUMES declares no volumes"));
    }
    Ok(volumes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn parses_bare_names_against_storage_root() {
        let volumes = parse_volumes("1,2,3", Path::new("storage/files")).unwrap();
        assert_eq!(volumes.len(), 3);
        assert_eq!(volumes[0].name, "1");
        assert_eq!(volumes[0].path, PathBuf::from("storage/files/1"));
        assert_eq!(volumes[2].path, PathBuf::from("storage/files/3"));
    }

    #[test]
    fn parses_explicit_mount_paths() {
        let volumes = parse_volumes("main=/mnt/a, spill=/mnt/b", Path::new("unused")).unwrap();
        assert_eq!(volumes[0].name, "main");
        assert_eq!(volumes[0].path, PathBuf::from("/mnt/a"));
        assert_eq!(volumes[1].name, "spill");
    }

    #[test]
    fn rejects_duplicates_and_empty_lists() {
        assert!(parse_volumes("a,a", Path::new("root")).is_err());
        assert!(parse_volumes("", Path::new("root")).is_err());
        assert!(parse_volumes("x=", Path::new("root")).is_err());
    }
}
