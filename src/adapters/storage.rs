//! File-backed configuration store.
//!
//! Implements [`ConfigStore`] over a single JSON file.
//!
//! # Atomicity
//!
//! A save writes the full record to `<path>.tmp`, flushes it to the medium
//! with `sync_all`, then renames it over `<path>`.  A failure at any step
//! removes the temp file and leaves the previous file untouched, so a
//! reader sees either the old record or the new one.  On the device the path lives on the
//! SPIFFS partition mounted by [`mount_spiffs`].

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::ConfigStore;
use crate::app::record::DeviceConfigRecord;
use crate::error::StorageError;

/// Where the record lives on the device filesystem.
pub const DEFAULT_RECORD_PATH: &str = "/spiffs/cyberfly_config.json";

pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = self.temp_path();
        let written = fs::File::create(&tmp).and_then(|mut f| {
            f.write_all(bytes)?;
            f.sync_all()?;
            drop(f);
            fs::rename(&tmp, &self.path)
        });
        if written.is_err() && tmp.is_file() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Option<DeviceConfigRecord>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("STORE: read {} failed: {}", self.path.display(), e);
                return Err(StorageError::Io);
            }
        };
        DeviceConfigRecord::from_json(&bytes).map(Some).map_err(|e| {
            warn!("STORE: record at {} is corrupted: {}", self.path.display(), e);
            StorageError::Corrupted
        })
    }

    fn save(&mut self, record: &DeviceConfigRecord) -> Result<(), StorageError> {
        if !record.is_valid() {
            return Err(StorageError::Invalid("device_id, ssid and publicKey are required"));
        }
        let json = record.to_json().map_err(|_| StorageError::Invalid("unserialisable record"))?;
        self.write_atomic(json.as_bytes()).map_err(|e| {
            warn!("STORE: write {} failed: {}", self.path.display(), e);
            StorageError::Io
        })?;
        info!("STORE: record written to {}", self.path.display());
        Ok(())
    }
}

/// Initialise NVS flash.  The Bluedroid stack keeps bonding state there
/// and refuses to start without it.
#[cfg(target_os = "espidf")]
pub fn init_nvs() -> Result<(), StorageError> {
    use esp_idf_svc::sys::*;

    // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
    // single main-task context before the radio is brought up.
    let ret = unsafe { nvs_flash_init() };
    if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t {
        warn!("STORE: erasing and re-initialising NVS partition");
        if unsafe { nvs_flash_erase() } != ESP_OK as esp_err_t {
            return Err(StorageError::Io);
        }
        if unsafe { nvs_flash_init() } != ESP_OK as esp_err_t {
            return Err(StorageError::Io);
        }
    } else if ret != ESP_OK as esp_err_t {
        return Err(StorageError::Io);
    }
    Ok(())
}

/// Register the SPIFFS partition at `/spiffs`, formatting it on first use.
#[cfg(target_os = "espidf")]
pub fn mount_spiffs() -> Result<(), StorageError> {
    use esp_idf_svc::sys::*;

    let conf = esp_vfs_spiffs_conf_t {
        base_path: c"/spiffs".as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: true,
    };
    // SAFETY: called once from the main task before any file access.
    let ret = unsafe { esp_vfs_spiffs_register(&conf) };
    if ret == ESP_OK as esp_err_t || ret == ESP_ERR_INVALID_STATE as esp_err_t {
        Ok(())
    } else {
        warn!("STORE: SPIFFS mount failed ({})", ret);
        Err(StorageError::Io)
    }
}
