//! Strongly-typed identifiers.
//!
//! Chat platforms hand out opaque string identifiers for users, channels,
//! guilds, messages and roles. Each gets its own newtype so a channel id can
//! never be passed where a message id is expected.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier, returning the raw string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifies a user account.
    UserId
);
define_id!(
    /// Identifies a text channel (or direct-message channel).
    ChannelId
);
define_id!(
    /// Identifies a guild (server).
    GuildId
);
define_id!(
    /// Identifies a single message within a channel.
    MessageId
);
define_id!(
    /// Identifies a guild role.
    RoleId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_id_conversions() {
        let a = MessageId::from("123");
        let b = MessageId::from(123u64);
        let c = MessageId::new(String::from("123"));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.to_string(), "123");
        assert_eq!(a.as_str(), "123");
    }

    #[test]
    fn test_id_borrow_lookup() {
        let mut map = HashMap::new();
        map.insert(RoleId::from("moderator"), 1);
        assert_eq!(map.get("moderator"), Some(&1));
    }

    #[test]
    fn test_id_serde_transparent() {
        let id = ChannelId::from("general");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"general\"");
        let back: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
