//! Resource and data source traits

use crate::data::ResourceData;
use crate::error::{ProviderError, Result};
use crate::schema::Schema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// CRUD operation a timeout applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Per-operation timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(with = "secs")]
    pub create: Duration,
    #[serde(with = "secs")]
    pub read: Duration,
    #[serde(with = "secs")]
    pub update: Duration,
    #[serde(with = "secs")]
    pub delete: Duration,
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(20 * 60))
    }
}

impl Timeouts {
    pub fn uniform(d: Duration) -> Self {
        Self {
            create: d,
            read: d,
            update: d,
            delete: d,
        }
    }

    pub fn minutes(create: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            read: Duration::from_secs(20 * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }

    pub fn get(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    /// Apply overrides from a `timeouts { create "30m" }` block
    pub fn with_overrides(mut self, overrides: &Map<String, Value>) -> Result<Self> {
        for (key, value) in overrides {
            let raw = value.as_str().ok_or_else(|| {
                ProviderError::InvalidConfig(format!("timeout '{}' must be a duration string", key))
            })?;
            let d = parse_duration(raw)?;
            match key.as_str() {
                "create" => self.create = d,
                "read" => self.read = d,
                "update" => self.update = d,
                "delete" => self.delete = d,
                other => {
                    return Err(ProviderError::InvalidConfig(format!(
                        "unknown timeout '{}', expected create, read, update or delete",
                        other
                    )));
                }
            }
        }
        Ok(self)
    }
}

/// Parse durations such as `30s`, `20m`, `1h` or `1h30m`
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let invalid = || ProviderError::InvalidConfig(format!("invalid duration '{}'", raw));
    let mut total = 0u64;
    let mut digits = String::new();

    for c in raw.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        total += match c {
            'h' => n * 3600,
            'm' => n * 60,
            's' => n,
            _ => return Err(invalid()),
        };
        digits.clear();
    }

    if !digits.is_empty() || total == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}

/// A managed resource type
///
/// Implementations translate between the flat attribute model in
/// [`ResourceData`] and the vendor API. `read` clears the id when the remote
/// object no longer exists.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name as used in manifests (e.g. "ibm_is_vpc")
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    async fn create(&self, d: &mut ResourceData) -> Result<()>;

    async fn read(&self, d: &mut ResourceData) -> Result<()>;

    async fn update(&self, d: &mut ResourceData) -> Result<()>;

    async fn delete(&self, d: &mut ResourceData) -> Result<()>;

    async fn exists(&self, d: &ResourceData) -> Result<bool> {
        let mut current = d.clone();
        self.read(&mut current).await?;
        Ok(!current.id().is_empty())
    }

    /// Turn an import id into resource data ready for `read`
    async fn import(&self, id: &str) -> Result<ResourceData> {
        Ok(ResourceData::from_state(id, Map::new()).with_timeouts(self.timeouts()))
    }
}

/// A read-only data source type
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, d: &mut ResourceData) -> Result<()>;
}
