use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a routing slip instance.
///
/// Assigned once when the routing slip is built and carried unchanged by
/// every hop. Activities use it as their idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingNumber(Uuid);

impl TrackingNumber {
    /// Creates a new random tracking number.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a tracking number from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TrackingNumber {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TrackingNumber {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for TrackingNumber {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<TrackingNumber> for Uuid {
    fn from(id: TrackingNumber) -> Self {
        id.0
    }
}

/// Identifies a single execution of an activity.
///
/// A compensation refers back to the execution it undoes by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Creates a new random execution ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ExecutionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// An endpoint address understood by the transport, e.g. `queue:reserve_inventory_execute`.
///
/// The engine never interprets addresses beyond the optional `scheme:` prefix;
/// resolving them to a broker destination is the transport's job.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Creates an address from its string form.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Creates an address of the form `scheme:path`.
    pub fn from_parts(scheme: &str, path: &str) -> Self {
        Self(format!("{scheme}:{path}"))
    }

    /// Returns the scheme prefix, if the address has one.
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once(':').map(|(scheme, _)| scheme)
    }

    /// Returns the part after the scheme, or the whole address without one.
    pub fn path(&self) -> &str {
        self.0.split_once(':').map_or(&self.0, |(_, path)| path)
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}
