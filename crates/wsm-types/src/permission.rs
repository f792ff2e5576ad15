use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Access level a user, or the world, has on a workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "n")]
    None,
    #[serde(rename = "r")]
    Read,
    #[serde(rename = "w")]
    Write,
    #[serde(rename = "a")]
    Admin,
}

impl Permission {
    /// Single-letter code used in stored documents.
    pub fn code(self) -> &'static str {
        match self {
            Self::None => "n",
            Self::Read => "r",
            Self::Write => "w",
            Self::Admin => "a",
        }
    }

    /// Returns `true` for every level that grants read access.
    pub fn is_readable(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Permission {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "n" => Ok(Self::None),
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "a" => Ok(Self::Admin),
            other => Err(TypeError::UnknownPermission(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip_through_from_str() {
        for p in [Permission::None, Permission::Read, Permission::Write, Permission::Admin] {
            assert_eq!(p.code().parse::<Permission>().unwrap(), p);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(
            "x".parse::<Permission>(),
            Err(TypeError::UnknownPermission("x".into()))
        );
    }

    #[test]
    fn only_none_is_unreadable() {
        assert!(!Permission::None.is_readable());
        assert!(Permission::Read.is_readable());
        assert!(Permission::Write.is_readable());
        assert!(Permission::Admin.is_readable());
    }

    #[test]
    fn serde_uses_single_letters() {
        assert_eq!(serde_json::to_string(&Permission::Admin).unwrap(), "\"a\"");
        let p: Permission = serde_json::from_str("\"w\"").unwrap();
        assert_eq!(p, Permission::Write);
    }
}
