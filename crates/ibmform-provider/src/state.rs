//! State management for provisioned resources
//!
//! Manages the `.ibmform/state.json` file which tracks the last known
//! attributes of every managed resource.

use crate::error::{ProviderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".ibmform";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_STAGED: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// State of every resource in a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Incremented on every save
    #[serde(default)]
    pub serial: u64,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by address (`type.name`)
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resources of one type
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<(&String, &ResourceState)> {
        self.resources
            .iter()
            .filter(|(_, r)| r.resource_type == resource_type)
            .collect()
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, address: String, state: ResourceState) {
        self.resources.insert(address, state);
        self.updated_at = Utc::now();
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, address: &str) -> Option<ResourceState> {
        let result = self.resources.remove(address);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    pub fn get_resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Remote ID (possibly composite)
    pub id: String,

    /// Resource type
    pub resource_type: String,

    /// Current status
    pub status: ResourceStatus,

    /// Resource attributes as last read
    pub attributes: Map<String, Value>,

    /// Addresses this resource depended on when applied
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Unknown,
            attributes: Map::new(),
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn set_attributes(&mut self, attributes: Map<String, Value>) {
        self.attributes = attributes;
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Created or updated successfully
    Ready,
    /// An operation failed part way, the object may need replacing
    Tainted,
    /// Status is unknown
    Unknown,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Tainted => write!(f, "tainted"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reads and writes `state.json` under a project's `.ibmform` directory
pub struct StateManager {
    dir: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(STATE_DIR),
        }
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn state_path(&self) -> PathBuf {
        self.file(STATE_FILE)
    }

    /// Read the saved state, or an empty one when nothing was saved yet
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no saved state");
                return Ok(GlobalState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: GlobalState = serde_json::from_str(&content)?;
        if state.version > STATE_VERSION {
            return Err(ProviderError::StateError(format!(
                "{} was written by a newer ibmform (version {}, this build reads up to {})",
                path.display(),
                state.version,
                STATE_VERSION
            )));
        }

        tracing::debug!(
            serial = state.serial,
            resources = state.resources.len(),
            "loaded state"
        );
        Ok(state)
    }

    /// Persist the state with the next serial
    ///
    /// The new content is written beside the old file and renamed over it,
    /// so a crash leaves either the old or the new state on disk. The
    /// previous content is kept as `state.json.backup`.
    pub async fn save(&self, state: &mut GlobalState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        state.serial += 1;
        state.updated_at = Utc::now();
        let staged = self.file(STATE_STAGED);
        fs::write(&staged, serde_json::to_vec_pretty(state)?).await?;

        let current = self.state_path();
        if fs::try_exists(&current).await? {
            fs::copy(&current, self.file(STATE_BACKUP)).await?;
        }
        fs::rename(&staged, &current).await?;

        tracing::debug!(
            serial = state.serial,
            resources = state.resources.len(),
            "saved state"
        );
        Ok(())
    }

    /// Take the project lock
    ///
    /// The lock carries a lease. Another run may take it over only once the
    /// lease has run out, which the holder pushes back with
    /// [`StateLock::extend`] before each long operation.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.file(LOCK_FILE);
        let holder = LockHolder::current();
        let body = serde_json::to_vec_pretty(&holder)?;

        for _ in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&body).await?;
                    tracing::debug!(holder = %holder.holder, "acquired state lock");
                    return Ok(StateLock {
                        path,
                        holder,
                        held: true,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    let existing: LockHolder =
                        serde_json::from_str(&fs::read_to_string(&path).await?)?;
                    if !existing.expired() {
                        return Err(ProviderError::LockError(format!(
                            "state is locked by {} until {} (remove {} if that run is gone)",
                            existing.holder,
                            existing.expires_at(),
                            path.display()
                        )));
                    }
                    tracing::warn!(holder = %existing.holder, "replacing expired state lock");
                    fs::remove_file(&path).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ProviderError::LockError(format!(
            "could not create {}",
            path.display()
        )))
    }

    /// Whether `lock` guards this project's state
    pub fn holds(&self, lock: &StateLock) -> bool {
        lock.held && lock.path == self.file(LOCK_FILE)
    }
}

/// Lease a fresh lock starts with, in minutes
pub const DEFAULT_LEASE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockHolder {
    holder: String,
    acquired_at: DateTime<Utc>,
    /// Absent in locks written before leases existed
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl LockHolder {
    fn current() -> Self {
        let host = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| "localhost".to_string());
        let now = Utc::now();
        Self {
            holder: format!("{}:{}", host, std::process::id()),
            acquired_at: now,
            expires_at: Some(now + chrono::Duration::minutes(DEFAULT_LEASE_MINUTES)),
        }
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
            .unwrap_or(self.acquired_at + chrono::Duration::minutes(DEFAULT_LEASE_MINUTES))
    }

    fn expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }
}

/// Held project lock, removed on [`StateLock::release`] or drop
pub struct StateLock {
    path: PathBuf,
    holder: LockHolder,
    held: bool,
}

impl StateLock {
    /// Keep the lock for at least `lease` from now
    ///
    /// A lease ending earlier than the current one is ignored.
    pub async fn extend(&mut self, lease: std::time::Duration) -> Result<()> {
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| ProviderError::LockError(format!("invalid lease: {}", e)))?;
        let until = Utc::now() + lease;
        if until <= self.holder.expires_at() {
            return Ok(());
        }

        self.holder.expires_at = Some(until);
        fs::write(&self.path, serde_json::to_vec_pretty(&self.holder)?).await?;
        tracing::debug!(until = %until, "extended state lock");
        Ok(())
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.holder.expires_at()
    }

    pub async fn release(mut self) -> Result<()> {
        self.held = false;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("released state lock");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if self.held {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
