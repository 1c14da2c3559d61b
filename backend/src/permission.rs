//! Capability bits granted through a user's role.
//!
//! A role stores the union of its bits as a plain integer; a check passes
//! only when every requested bit is present.

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(i64);

impl Permission {
    pub const NONE: Self = Self(0);
    pub const FOLLOW: Self = Self(0x01);
    pub const COMMENT: Self = Self(0x02);
    pub const WRITE_ARTICLES: Self = Self(0x04);
    pub const MODERATE_COMMENTS: Self = Self(0x08);
    pub const ADMINISTER: Self = Self(0x80);
    pub const ALL: Self = Self(0xff);

    pub const fn from_bits(bits: i64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> i64 {
        self.0
    }

    /// `true` iff every bit of `required` is set in `self`.
    pub const fn contains(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }
}

impl BitOr for Permission {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permission {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

pub const USER_ROLE: &str = "User";
pub const ADMIN_ROLE: &str = "Administrator";

/// Seeded roles: (name, permissions, is_default).
pub fn default_roles() -> [(&'static str, Permission, bool); 2] {
    [
        (
            USER_ROLE,
            Permission::FOLLOW
                | Permission::COMMENT
                | Permission::WRITE_ARTICLES
                | Permission::MODERATE_COMMENTS,
            true,
        ),
        (ADMIN_ROLE, Permission::ALL, false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_requires_every_bit() {
        let mask = Permission::FOLLOW | Permission::COMMENT;
        assert!(mask.contains(Permission::FOLLOW));
        assert!(mask.contains(Permission::FOLLOW | Permission::COMMENT));
        assert!(!mask.contains(Permission::FOLLOW | Permission::WRITE_ARTICLES));
        assert!(!mask.contains(Permission::ADMINISTER));
    }

    #[test]
    fn empty_request_is_always_granted() {
        assert!(Permission::NONE.contains(Permission::NONE));
    }

    #[test]
    fn all_covers_every_named_bit() {
        for p in [
            Permission::FOLLOW,
            Permission::COMMENT,
            Permission::WRITE_ARTICLES,
            Permission::MODERATE_COMMENTS,
            Permission::ADMINISTER,
        ] {
            assert!(Permission::ALL.contains(p));
        }
    }

    #[test]
    fn user_role_is_default_and_not_admin() {
        let [(name, perms, is_default), (admin, admin_perms, admin_default)] = default_roles();
        assert_eq!(name, USER_ROLE);
        assert!(is_default);
        assert_eq!(perms.bits(), 0x0f);
        assert!(!perms.contains(Permission::ADMINISTER));

        assert_eq!(admin, ADMIN_ROLE);
        assert!(!admin_default);
        assert_eq!(admin_perms.bits(), 0xff);
    }

    #[test]
    fn bitor_assign_accumulates() {
        let mut mask = Permission::NONE;
        mask |= Permission::COMMENT;
        mask |= Permission::FOLLOW;
        assert_eq!(mask.bits(), 0x03);
    }
}
