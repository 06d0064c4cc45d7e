//! Shard identity, point mappings and transport credentials.
//!
//! [`ShardLocation`] is the natural key of a shard: two locations are equal
//! iff every field matches. The shard map assigns each shard an opaque
//! [`ShardId`] on creation; point mappings reference shards by that id while
//! callers compare them by location.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Transport protocol recorded in a shard location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlProtocol {
    Default,
    Tcp,
    NamedPipe,
}

impl SqlProtocol {
    /// Stable storage label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Tcp => "tcp",
            Self::NamedPipe => "named_pipe",
        }
    }

    /// Parse a storage label produced by [`SqlProtocol::as_str`].
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "default" => Some(Self::Default),
            "tcp" => Some(Self::Tcp),
            "named_pipe" => Some(Self::NamedPipe),
            _ => None,
        }
    }
}

/// Physical address of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardLocation {
    server: String,
    partition_name: String,
    protocol: SqlProtocol,
    port: u16,
}

impl ShardLocation {
    /// Location of `partition_name` on `server:port`.
    pub fn new(
        server: impl Into<String>,
        partition_name: impl Into<String>,
        protocol: SqlProtocol,
        port: u16,
    ) -> Self {
        Self {
            server: server.into(),
            partition_name: partition_name.into(),
            protocol,
            port,
        }
    }

    /// TCP location, the only protocol the provisioning path creates.
    pub fn tcp(server: impl Into<String>, partition_name: impl Into<String>, port: u16) -> Self {
        Self::new(server, partition_name, SqlProtocol::Tcp, port)
    }

    pub fn server(&self) -> &str {
        self.server.as_str()
    }

    pub fn partition_name(&self) -> &str {
        self.partition_name.as_str()
    }

    pub fn protocol(&self) -> SqlProtocol {
        self.protocol
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ShardLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}",
            self.protocol.as_str(),
            self.server,
            self.port,
            self.partition_name
        )
    }
}

/// Identifier the shard map assigns to a registered shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardId(Uuid);

impl ShardId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Fresh random shard identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle to a registered partition.
///
/// Many point mappings may reference one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shard {
    id: ShardId,
    location: ShardLocation,
}

impl Shard {
    /// Handle for an already registered shard.
    pub fn new(id: ShardId, location: ShardLocation) -> Self {
        Self { id, location }
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    pub fn location(&self) -> &ShardLocation {
        &self.location
    }
}

/// Binding of exactly one tenant key to exactly one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointMapping {
    key: crate::domain::TenantId,
    shard: Shard,
}

impl PointMapping {
    /// Bind `key` to `shard`.
    pub fn new(key: crate::domain::TenantId, shard: Shard) -> Self {
        Self { key, shard }
    }

    pub fn key(&self) -> &crate::domain::TenantId {
        &self.key
    }

    pub fn shard(&self) -> &Shard {
        &self.shard
    }
}

/// Login used to open transport connections to shards.
///
/// The password is zeroed on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Credentials for `user`; the password is moved into zeroizing storage.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn user(&self) -> &str {
        self.user.as_str()
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn locations_compare_on_every_field() {
        let base = ShardLocation::tcp("db-1", "tenants", 5432);

        assert_eq!(base, ShardLocation::tcp("db-1", "tenants", 5432));
        assert_ne!(base, ShardLocation::tcp("db-2", "tenants", 5432));
        assert_ne!(base, ShardLocation::tcp("db-1", "premium", 5432));
        assert_ne!(base, ShardLocation::tcp("db-1", "tenants", 5433));
        assert_ne!(
            base,
            ShardLocation::new("db-1", "tenants", SqlProtocol::Default, 5432)
        );
    }

    #[rstest]
    #[case(SqlProtocol::Default)]
    #[case(SqlProtocol::Tcp)]
    #[case(SqlProtocol::NamedPipe)]
    fn protocol_labels_parse_back(#[case] protocol: SqlProtocol) {
        assert_eq!(SqlProtocol::from_label(protocol.as_str()), Some(protocol));
    }

    #[rstest]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials::new("router", "hunter2");
        let rendered = format!("{credentials:?}");

        assert!(rendered.contains("router"));
        assert!(!rendered.contains("hunter2"));
    }
}
