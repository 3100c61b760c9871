//! Macro for reducing boilerplate when defining entities
//!
//! `impl_record!` generates the struct (base columns plus entity columns)
//! and the [`Record`](crate::core::record::Record) implementation. The
//! defining module must provide two free functions the macro wires up:
//!
//! - `fn schema() -> TableSchema` — the table definition
//! - `fn validation(op: Operation) -> ValidationConfig` — the rules

/// Create an entity struct with its automatic Record implementation
///
/// # Example
///
/// ```rust,ignore
/// impl_record!(
///     Currency,
///     "currency",
///     "currencies",
///     {
///         iso_code: String,
///         name: String,
///         symbol: String,
///         decimal_places: i64,
///         is_active: bool,
///     }
/// );
///
/// // Usage
/// let eur = Currency::new(
///     "EUR".to_string(),
///     "Euro".to_string(),
///     "€".to_string(),
///     2,
///     true,
/// );
/// ```
#[macro_export]
macro_rules! impl_record {
    (
        $type:ident,
        $singular:expr,
        $plural:expr,
        {
            $( $(#[$fmeta:meta])* $field:ident : $fty:ty ),* $(,)?
        }
    ) => {
        #[derive(Debug, Clone, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $type {
            /// Primary key, absent until the row is persisted
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub id: Option<i64>,

            /// 6-digit public identifier, assigned by the storage layer
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub guid: Option<i64>,

            /// When this row was created
            pub created_at: ::chrono::DateTime<::chrono::Utc>,

            /// When this row was last updated
            pub updated_at: ::chrono::DateTime<::chrono::Utc>,

            $( $(#[$fmeta])* pub $field : $fty, )*
        }

        impl $crate::core::record::Record for $type {
            fn table() -> &'static $crate::core::schema::TableSchema {
                static SCHEMA: ::std::sync::OnceLock<$crate::core::schema::TableSchema> =
                    ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(schema)
            }

            fn resource_name() -> &'static str {
                $plural
            }

            fn resource_name_singular() -> &'static str {
                $singular
            }

            fn validation(
                op: $crate::core::validation::Operation,
            ) -> $crate::core::validation::ValidationConfig {
                validation(op)
            }

            fn id(&self) -> Option<i64> {
                self.id
            }

            fn guid(&self) -> Option<i64> {
                self.guid
            }

            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated_at
            }
        }

        impl $type {
            /// Create a new unpersisted instance
            pub fn new( $( $field: $fty ),* ) -> Self {
                let now = ::chrono::Utc::now();
                Self {
                    id: None,
                    guid: None,
                    created_at: now,
                    updated_at: now,
                    $( $field, )*
                }
            }

            /// Update the updated_at timestamp to now
            pub fn touch(&mut self) {
                self.updated_at = ::chrono::Utc::now();
            }
        }
    };
}
