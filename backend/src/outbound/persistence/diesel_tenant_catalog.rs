//! PostgreSQL-backed tenant catalog.
//!
//! Each [`DieselTenantCatalog`] owns one pooled connection for its lifetime;
//! dropping the handle returns the connection to the pool.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::pooled_connection::bb8::PooledConnection;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{TenantCatalog, TenantCatalogError, TenantCatalogFactory};
use crate::domain::{TenantId, TenantRecord};

use super::diesel_error_mapping::{StoreFailure, classify_diesel_error};
use super::models::{NewTenantRow, TenantRow};
use super::pool::DbPool;
use super::schema::tenants;

fn map_failure(failure: StoreFailure) -> TenantCatalogError {
    match failure {
        StoreFailure::Connection(message) => TenantCatalogError::connection(message),
        StoreFailure::Query(message) => TenantCatalogError::query(message),
        StoreFailure::UniqueViolation => TenantCatalogError::query("unexpected unique violation"),
    }
}

fn row_to_record(row: TenantRow) -> Result<TenantRecord, TenantCatalogError> {
    TenantRecord::new(
        TenantId::from_uuid(row.tenant_id),
        row.tenant_name,
        row.service_plan,
    )
    .map_err(|err| TenantCatalogError::query(format!("corrupted tenant record in catalog: {err}")))
}

/// Factory handing out catalog handles backed by `pool`.
#[derive(Clone)]
pub struct DieselTenantCatalogFactory {
    pool: DbPool,
}

impl DieselTenantCatalogFactory {
    /// Factory checking catalog handles out of `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantCatalogFactory for DieselTenantCatalogFactory {
    async fn create_catalog(&self) -> Result<Box<dyn TenantCatalog>, TenantCatalogError> {
        let conn = self
            .pool
            .get_owned()
            .await
            .map_err(|err| TenantCatalogError::connection(err.into_message()))?;
        Ok(Box::new(DieselTenantCatalog { conn }))
    }
}

/// Catalog handle holding one checked-out connection.
pub struct DieselTenantCatalog {
    conn: PooledConnection<'static, AsyncPgConnection>,
}

#[async_trait]
impl TenantCatalog for DieselTenantCatalog {
    async fn add(&mut self, record: &TenantRecord) -> Result<(), TenantCatalogError> {
        let row = NewTenantRow {
            tenant_id: *record.tenant_id().as_uuid(),
            tenant_name: record.tenant_name(),
            service_plan: record.service_plan(),
        };

        diesel::insert_into(tenants::table)
            .values(&row)
            .execute(&mut self.conn)
            .await
            .map(|_| ())
            .map_err(|err| match classify_diesel_error(&err) {
                StoreFailure::UniqueViolation => {
                    TenantCatalogError::duplicate_tenant(record.tenant_id().clone())
                }
                other => map_failure(other),
            })
    }

    async fn get_by_id(
        &mut self,
        tenant_id: &TenantId,
    ) -> Result<Option<TenantRecord>, TenantCatalogError> {
        let row: Option<TenantRow> = tenants::table
            .filter(tenants::tenant_id.eq(tenant_id.as_uuid()))
            .select(TenantRow::as_select())
            .first(&mut self.conn)
            .await
            .optional()
            .map_err(|err| map_failure(classify_diesel_error(&err)))?;

        row.map(row_to_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uuid::Uuid;

    #[rstest]
    fn rows_convert_to_records() {
        let id = Uuid::new_v4();
        let record = row_to_record(TenantRow {
            tenant_id: id,
            tenant_name: "Harbour Bakery".to_owned(),
            service_plan: "standard".to_owned(),
        })
        .expect("valid row");

        assert_eq!(record.tenant_id().as_uuid(), &id);
        assert_eq!(record.service_plan(), "standard");
    }

    #[rstest]
    fn blank_rows_are_query_errors() {
        let error = row_to_record(TenantRow {
            tenant_id: Uuid::new_v4(),
            tenant_name: String::new(),
            service_plan: "standard".to_owned(),
        })
        .expect_err("blank name");

        assert!(matches!(error, TenantCatalogError::Query { .. }));
    }

    #[rstest]
    fn closed_connections_map_to_connection_errors() {
        let error = map_failure(StoreFailure::Connection("database connection error"));
        assert_eq!(
            error,
            TenantCatalogError::connection("database connection error")
        );
    }
}
