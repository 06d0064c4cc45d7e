//! Tenant identity and catalog records.
//!
//! A [`TenantRecord`] is created by a provisioning caller before the first
//! connection is resolved and is never mutated afterwards. The tenant key is
//! also the sharding key, so [`TenantId`] keeps the exact literal the caller
//! supplied: it is written verbatim into the isolation context of every
//! connection opened for the tenant. Only the hyphenated UUID form is
//! accepted, so two callers naming the same tenant send the same text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors returned by tenant constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenantValidationError {
    /// The tenant id was the empty string.
    #[error("tenant id must not be empty")]
    EmptyId,
    /// The tenant id was not a hyphenated UUID.
    #[error("tenant id must be a hyphenated UUID")]
    InvalidId,
    /// The tenant name was blank.
    #[error("tenant name must not be empty")]
    EmptyName,
    /// The service plan was blank.
    #[error("service plan must not be empty")]
    EmptyServicePlan,
}

/// Tenant key used both as catalog primary key and shard-map point.
///
/// # Examples
/// ```
/// use tenant_router::domain::TenantId;
///
/// let id = TenantId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("valid UUID");
/// assert_eq!(id.as_ref(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(Uuid, String);

impl TenantId {
    /// Validate and construct a [`TenantId`] from borrowed input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, TenantValidationError> {
        Self::from_owned(id.as_ref().to_owned())
    }

    /// Construct a [`TenantId`] from an already parsed UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid, uuid.to_string())
    }

    /// Generate a new random [`TenantId`].
    pub fn random() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    fn from_owned(id: String) -> Result<Self, TenantValidationError> {
        if id.is_empty() {
            return Err(TenantValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(TenantValidationError::InvalidId);
        }
        let parsed = Uuid::parse_str(&id).map_err(|_| TenantValidationError::InvalidId)?;
        // `parse_str` also takes the simple, braced and URN spellings.
        if !parsed.hyphenated().to_string().eq_ignore_ascii_case(&id) {
            return Err(TenantValidationError::InvalidId);
        }
        Ok(Self(parsed, id))
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

// Identity is the UUID; the literal is presentation only.
impl PartialEq for TenantId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for TenantId {}

impl std::hash::Hash for TenantId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        self.1.as_str()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl FromStr for TenantId {
    type Err = TenantValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        let TenantId(_, raw) = value;
        raw
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Immutable tenant catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    tenant_id: TenantId,
    tenant_name: String,
    service_plan: String,
}

impl TenantRecord {
    /// Validate and construct a record.
    ///
    /// # Examples
    /// ```
    /// use tenant_router::domain::{TenantId, TenantRecord};
    ///
    /// let record = TenantRecord::new(TenantId::random(), "Harbour Bakery", "standard")
    ///     .expect("valid record");
    /// assert_eq!(record.service_plan(), "standard");
    /// ```
    pub fn new(
        tenant_id: TenantId,
        tenant_name: impl Into<String>,
        service_plan: impl Into<String>,
    ) -> Result<Self, TenantValidationError> {
        let tenant_name = tenant_name.into();
        let service_plan = service_plan.into();
        if tenant_name.trim().is_empty() {
            return Err(TenantValidationError::EmptyName);
        }
        if service_plan.trim().is_empty() {
            return Err(TenantValidationError::EmptyServicePlan);
        }
        Ok(Self {
            tenant_id,
            tenant_name,
            service_plan,
        })
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn tenant_name(&self) -> &str {
        self.tenant_name.as_str()
    }

    pub fn service_plan(&self) -> &str {
        self.service_plan.as_str()
    }
}
