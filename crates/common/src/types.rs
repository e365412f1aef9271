use serde::{Deserialize, Serialize};

/// Defines an integer identity newtype.
///
/// Identifiers are plain `i64` values as assigned by the relational store.
/// Construction is unchecked: a non-positive value is representable so that
/// validators can reject it with a meaningful error.
macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from a raw value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }

            /// Returns true if the identifier can refer to a stored row.
            pub const fn is_positive(&self) -> bool {
                self.0 > 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

integer_id!(
    /// Identifier of an author row.
    AuthorId
);

integer_id!(
    /// Identifier of a book row (and of its stock ledger entry).
    BookId
);

integer_id!(
    /// Identifier of an order row, assigned by the store on insert.
    OrderId
);

integer_id!(
    /// Opaque identifier of the user placing an order.
    ///
    /// Users are not stored by this system; the id is only checked for
    /// positivity.
    UserId
);
