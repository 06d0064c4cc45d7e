//! Shared Diesel error classification for the store adapters.
//!
//! Adapters turn a [`StoreFailure`] into their port error. Unique violations
//! are kept distinct because the provisioning algorithm depends on them.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

/// Port-agnostic shape of a failed Diesel operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoreFailure {
    UniqueViolation,
    Connection(&'static str),
    Query(&'static str),
}

/// Classify a Diesel error, logging its kind at debug level.
pub(crate) fn classify_diesel_error(error: &DieselError) -> StoreFailure {
    match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => StoreFailure::Query("record not found"),
        DieselError::QueryBuilderError(_) => StoreFailure::Query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StoreFailure::UniqueViolation
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            StoreFailure::Connection("database connection error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            StoreFailure::Query("referenced record does not exist")
        }
        _ => StoreFailure::Query("database error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn database_error(kind: DatabaseErrorKind) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(String::from("constraint")))
    }

    #[rstest]
    #[case(database_error(DatabaseErrorKind::UniqueViolation), StoreFailure::UniqueViolation)]
    #[case(
        database_error(DatabaseErrorKind::ClosedConnection),
        StoreFailure::Connection("database connection error")
    )]
    #[case(
        database_error(DatabaseErrorKind::ForeignKeyViolation),
        StoreFailure::Query("referenced record does not exist")
    )]
    #[case(DieselError::NotFound, StoreFailure::Query("record not found"))]
    fn diesel_errors_are_classified(#[case] error: DieselError, #[case] expected: StoreFailure) {
        assert_eq!(classify_diesel_error(&error), expected);
    }
}
