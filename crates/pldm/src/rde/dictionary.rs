// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema dictionary storage.
//!
//! Dictionaries accumulate from multipart chunks and persist under a
//! UUID-scoped directory so a restart does not force re-discovery:
//!
//! ```text
//! {dict_root}/{device_uuid}/
//!     dictionary_{resource_id}.bin
//!     annotation.bin
//! ```
//!
//! Writes are temp-file-then-rename so a crash mid-write leaves either
//! the old file or the new one, never a torn dictionary.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::rde::SchemaClass;
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const DICT_FILE_PREFIX: &str = "dictionary_";
const DICT_FILE_EXTENSION: &str = ".bin";
const ANNOTATION_FILE_NAME: &str = "annotation.bin";

/// One schema dictionary, keyed by `(resource_id, schema_class)`.
#[derive(Debug, Clone)]
pub struct Dictionary {
    resource_id: u32,
    schema_class: SchemaClass,
    bytes: Vec<u8>,
    complete: bool,
    path: PathBuf,
}

impl Dictionary {
    fn new(resource_id: u32, schema_class: SchemaClass, path: PathBuf) -> Self {
        Self {
            resource_id,
            schema_class,
            bytes: Vec::new(),
            complete: false,
            path,
        }
    }

    pub fn resource_id(&self) -> u32 {
        self.resource_id
    }

    pub fn schema_class(&self) -> SchemaClass {
        self.schema_class
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Monotonic; set once the final chunk has been appended.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Append one chunk. When `has_checksum` is set the final 4 bytes of
    /// the payload are the transfer checksum and are stripped before the
    /// append.
    pub fn append_chunk(&mut self, payload: &[u8], has_checksum: bool) -> Result<()> {
        if payload.is_empty() {
            return Err(Error::DecodeError("empty dictionary chunk".into()));
        }
        let keep = if has_checksum {
            if payload.len() < 4 {
                return Err(Error::DecodeError(
                    "final dictionary chunk shorter than its checksum".into(),
                ));
            }
            payload.len() - 4
        } else {
            payload.len()
        };
        self.bytes.extend_from_slice(&payload[..keep]);
        Ok(())
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Persist atomically: write the temp file, then rename into place.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("bin.tmp");
        fs::write(&tmp, &self.bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load from the persistence path; a loaded dictionary is complete.
    pub fn load(&mut self) -> Result<()> {
        self.bytes = fs::read(&self.path)?;
        self.complete = true;
        Ok(())
    }

    /// Drop in-memory bytes and the on-disk file.
    pub fn reset(&mut self) -> Result<()> {
        self.bytes.clear();
        self.complete = false;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// UUID-scoped dictionary set for one device.
#[derive(Debug)]
pub struct DictionaryManager {
    root: PathBuf,
    dictionaries: HashMap<(u32, SchemaClass), Dictionary>,
    annotation: Option<Dictionary>,
}

impl DictionaryManager {
    /// Create the store for `device_uuid`. The annotation dictionary is
    /// copied in from its fixed source path; when the bootstrap trigger
    /// file exists, previously persisted schema dictionaries are restored
    /// instead of waiting for discovery.
    pub fn new(cfg: &Config, device_uuid: &str) -> Result<Self> {
        let root = cfg.dict_root.join(device_uuid);
        fs::create_dir_all(&root)?;

        let mut mgr = Self {
            root,
            dictionaries: HashMap::new(),
            annotation: None,
        };
        mgr.install_annotation(&cfg.annotation_dict_path);

        if cfg.dict_bootstrap_trigger.exists() {
            info!("[rde] dictionary bootstrap: restoring persisted dictionaries");
            mgr.load_persisted()?;
        }
        Ok(mgr)
    }

    fn install_annotation(&mut self, source: &Path) {
        let mut dict = Dictionary::new(
            0,
            SchemaClass::Annotation,
            self.root.join(ANNOTATION_FILE_NAME),
        );
        match fs::read(source) {
            Ok(bytes) => {
                dict.bytes = bytes;
                dict.complete = true;
                if let Err(e) = dict.save() {
                    warn!("[rde] failed to persist annotation dictionary: {}", e);
                }
                self.annotation = Some(dict);
            }
            Err(e) => {
                // Fall back to a previously persisted copy if one exists.
                if dict.load().is_ok() {
                    self.annotation = Some(dict);
                } else {
                    warn!(
                        "[rde] annotation dictionary unavailable at {}: {}",
                        source.display(),
                        e
                    );
                }
            }
        }
    }

    fn dict_path(&self, resource_id: u32) -> PathBuf {
        self.root
            .join(format!("{}{}{}", DICT_FILE_PREFIX, resource_id, DICT_FILE_EXTENSION))
    }

    fn get_or_create(&mut self, resource_id: u32, schema_class: SchemaClass) -> &mut Dictionary {
        let path = self.dict_path(resource_id);
        self.dictionaries
            .entry((resource_id, schema_class))
            .or_insert_with(|| Dictionary::new(resource_id, schema_class, path))
    }

    /// Append one multipart chunk; persists when the final chunk lands.
    pub fn add_chunk(
        &mut self,
        resource_id: u32,
        schema_class: SchemaClass,
        payload: &[u8],
        has_checksum: bool,
        is_final: bool,
    ) -> Result<()> {
        let dict = self.get_or_create(resource_id, schema_class);
        dict.append_chunk(payload, has_checksum)?;
        if is_final {
            dict.mark_complete();
            dict.save()?;
        }
        Ok(())
    }

    /// Install an already reassembled (and checksum-stripped) dictionary.
    pub fn add_complete(
        &mut self,
        resource_id: u32,
        schema_class: SchemaClass,
        bytes: &[u8],
    ) -> Result<()> {
        let dict = self.get_or_create(resource_id, schema_class);
        dict.bytes.clear();
        dict.append_chunk(bytes, false)?;
        dict.mark_complete();
        dict.save()
    }

    pub fn get(&self, resource_id: u32, schema_class: SchemaClass) -> Option<&Dictionary> {
        self.dictionaries.get(&(resource_id, schema_class))
    }

    pub fn annotation(&self) -> Option<&Dictionary> {
        self.annotation.as_ref()
    }

    /// Remove one dictionary, in memory and on disk.
    pub fn reset(&mut self, resource_id: u32, schema_class: SchemaClass) -> Result<()> {
        if let Some(mut dict) = self.dictionaries.remove(&(resource_id, schema_class)) {
            dict.reset()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }

    /// Scan the UUID directory and restore every `dictionary_*.bin`.
    fn load_persisted(&mut self) -> Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name
                .strip_prefix(DICT_FILE_PREFIX)
                .and_then(|s| s.strip_suffix(DICT_FILE_EXTENSION))
            else {
                continue;
            };
            let Ok(resource_id) = stem.parse::<u32>() else {
                warn!("[rde] skipping dictionary file with odd name: {}", name);
                continue;
            };
            let dict = self.get_or_create(resource_id, SchemaClass::Major);
            if let Err(e) = dict.load() {
                warn!("[rde] failed to restore dictionary {}: {}", name, e);
            } else {
                info!("[rde] restored dictionary for resource {}", resource_id);
            }
        }
        Ok(())
    }
}
