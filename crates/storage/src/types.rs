//! Identifier types shared by the stores.

/// Defines a newtype wrapper around `String` with standard trait
/// implementations.
///
/// Each generated type:
/// - Derives `Clone`, `Debug`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Serializes transparently as the inner string
/// - Implements `From<String>`, `From<&str>` and `Display`
macro_rules! define_string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_string_id!(
    /// Subscriber identifier, as assigned by the payment provider
    /// (e.g. `cus_123`).
    ///
    /// Tokens carry it as the `sub` claim and the subscription cache is keyed
    /// by it, so a value minted into a token always matches a cache lookup.
    ///
    /// # Examples
    ///
    /// ```
    /// use huddle_storage::SubscriberId;
    ///
    /// let id = SubscriberId::from("cus_123");
    /// assert_eq!(id.as_str(), "cus_123");
    /// assert_eq!(id.to_string(), "cus_123");
    /// ```
    SubscriberId
);
