//! Tenant shard router.
//!
//! Resolves a tenant key to a connection on the shard holding the tenant's
//! data, provisioning the shard and mapping on first use, and sets the
//! tenant isolation context on the session before handing it out.

pub mod domain;
pub mod outbound;
pub mod settings;
