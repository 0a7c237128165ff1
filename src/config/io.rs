use std::env::current_exe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use directories_next::ProjectDirs;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use serde_json;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{info, warn};
use std::fs::OpenOptions;
use std::str;

use crate::config::types::Config;
use crate::error::ConfigError;

// creates a path to battery-monitor.json in the same directory as the executable
// this could be useful for usb sticks
fn get_portable_config_path() -> Option<PathBuf> {
    match current_exe() {
        Ok(mut path) => {
            // F:\battery-monitor.exe => F:\battery-monitor.json
            if !path.set_extension("json") {
                warn!("current exe has no filename: {}", path.to_string_lossy());
                return None
            }

            Some(path)
        },
        Err(err) => {
            warn!("failed to get current exe path: {:?}", err);
            None
        },
    }
}

// creates a path to battery-monitor.json in an os dependent standard directory, such as %AppData% on
// windows.
fn get_local_config_path() -> Option<PathBuf> {
    ProjectDirs::from("cc", "arduino", "battery-monitor").map(|dirs| {
        dirs.config_dir().join("battery-monitor.json")
    })
}

fn get_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = get_portable_config_path() {
        match std::fs::metadata(&path) {
            Ok(attr) => {
                if attr.is_file() {
                    return Ok(path);
                }
            }
            Err(err) => {
                info!("Could not read metadata of: {}; Using local path instead. ({})", path.to_string_lossy(), err);
            },
        }
    }

    match get_local_config_path() {
        None => Err(ConfigError::NoConfigPath),
        Some(path) => Ok(path),
    }
}

pub struct ConfigIOLocker {
    rw_lock: RwLock<std::fs::File>,
}

impl ConfigIOLocker {
    pub fn lock(&mut self) -> Result<RwLockWriteGuard<std::fs::File>, ConfigError> {
        self.rw_lock.try_write().map_err(|source| ConfigError::CanNotLock { source })
    }
}

struct ConfigIOInner {
    file: std::fs::File,
}

#[derive(Clone)]
pub struct ConfigIO {
    inner: Arc<Mutex<ConfigIOInner>>,
}

impl ConfigIO {
    pub fn new_sync() -> Result<Self, ConfigError> {
        let path = get_config_path()?;
        Self::open_sync(path)
    }

    pub fn open_sync(path: PathBuf) -> Result<Self, ConfigError> {
        info!("Using config file {}", path.to_string_lossy());

        if let Some(directory) = path.parent() {
            std::fs::create_dir_all(directory)?;
        }

        // the file is locked later on (see `locker`), so that it is used by only one instance of
        // this application.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .append(false)
            .create(true)
            .open(path)?;

        let inner = ConfigIOInner {
            file,
        };
        Ok(ConfigIO { inner: Arc::new(Mutex::new(inner)) })
    }

    pub fn locker(&mut self) -> Result<ConfigIOLocker, ConfigError> {
        let inner = self.inner.lock().expect("Failed to lock ConfigIO inner");

        Ok(ConfigIOLocker {
            rw_lock: RwLock::new(inner.file.try_clone()?),
        })
    }

    // The File returned from here should never be closed!
    fn get_file(&self) -> Result<File, ConfigError> {
        let inner = self.inner.lock().expect("Failed to lock ConfigIO inner");
        let file = inner.file.try_clone()?; // std File
        Ok(File::from_std(file)) // tokio File
    }

    /// Returns None if the file is empty.
    pub async fn read(&self) -> Result<Option<Config>, ConfigError> {
        let mut file = self.get_file()?;
        info!("Reading config file");

        let mut content = vec![];
        file.rewind().await?;
        file.read_to_end(&mut content).await?;

        if content.is_empty() {
            return Ok(None);
        }

        let content = str::from_utf8(&content)?;
        let config: Config = serde_json::from_str(content)?;
        Ok(Some(config))
    }

    /// Read the config, writing the defaults to the file if it is still empty.
    pub async fn read_or_init(&self) -> Result<Config, ConfigError> {
        match self.read().await? {
            Some(config) => Ok(config),
            None => {
                info!("Config file is empty, writing defaults");
                let config = Config::default();
                self.save(config.clone()).await?;
                Ok(config)
            },
        }
    }

    pub async fn save(&self, config: Config) -> Result<(), ConfigError> {
        let mut file = self.get_file()?;
        info!("Saving config");

        let content = serde_json::to_string_pretty(&config)?;
        file.rewind().await?;
        file.set_len(0).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::process;

    fn temp_config_path(name: &str) -> PathBuf {
        temp_dir()
            .join(format!("battery-monitor-test-{}", process::id()))
            .join(format!("{}.json", name))
    }

    #[tokio::test]
    async fn empty_file_is_initialized_with_defaults() {
        let path = temp_config_path("init");
        let _ = std::fs::remove_file(&path);
        let config_io = ConfigIO::open_sync(path.clone()).unwrap();

        assert_eq!(config_io.read().await.unwrap(), None);
        assert_eq!(config_io.read_or_init().await.unwrap(), Config::default());
        assert_eq!(config_io.read().await.unwrap(), Some(Config::default()));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"pollIntervalMs\": 5000"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn save_replaces_previous_content() {
        let path = temp_config_path("save");
        let _ = std::fs::remove_file(&path);
        let config_io = ConfigIO::open_sync(path.clone()).unwrap();

        let config = Config { use_polling: false, poll_interval_ms: 250, scan_timeout_ms: 1000 };
        config_io.save(Config::default()).await.unwrap();
        config_io.save(config.clone()).await.unwrap();
        assert_eq!(config_io.read_or_init().await.unwrap(), config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn second_lock_fails() {
        let path = temp_config_path("lock");
        let mut config_io = ConfigIO::open_sync(path.clone()).unwrap();
        let mut locker = config_io.locker().unwrap();
        let guard = locker.lock().unwrap();

        let mut other = ConfigIO::open_sync(path.clone()).unwrap();
        let mut other_locker = other.locker().unwrap();
        assert!(matches!(other_locker.lock(), Err(ConfigError::CanNotLock { .. })));

        drop(guard);
        let _ = std::fs::remove_file(&path);
    }
}
