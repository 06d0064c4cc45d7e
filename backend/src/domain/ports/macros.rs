//! Helper macro for declaring port error enums.
//!
//! Each variant gets a snake_case constructor whose field parameters accept
//! `impl Into<FieldType>`, so adapters can write
//! `ShardMapError::connection("pool exhausted")` without allocating by hand.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:literal
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@constructor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };

    (@constructor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@constructor $variant:ident { $($field:ident : $ty:ty),* }) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($field: impl Into<$ty>),*) -> Self {
                Self::$variant { $($field: $field.into()),* }
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Constructor generation checks.

    use crate::domain::{ShardLocation, TenantId};

    define_port_error! {
        pub enum SampleError {
            Offline => "store offline",
            Query { message: String } => "query failed: {message}",
            Taken { tenant_id: TenantId, location: ShardLocation } => "{tenant_id} taken at {location}",
        }
    }

    #[test]
    fn unit_variants_get_nullary_constructors() {
        assert_eq!(SampleError::offline().to_string(), "store offline");
    }

    #[test]
    fn string_fields_accept_str() {
        assert_eq!(
            SampleError::query("timeout").to_string(),
            "query failed: timeout"
        );
    }

    #[test]
    fn domain_fields_keep_their_types() {
        let tenant_id = TenantId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("valid id");
        let location = ShardLocation::tcp("db-1", "tenants", 5432);
        let err = SampleError::taken(tenant_id.clone(), location.clone());

        assert_eq!(
            err,
            SampleError::Taken {
                tenant_id,
                location
            }
        );
        assert_eq!(
            err.to_string(),
            "3fa85f64-5717-4562-b3fc-2c963f66afa6 taken at tcp://db-1:5432/tenants"
        );
    }
}
