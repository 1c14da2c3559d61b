use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{Role, User},
    permission::Permission,
};

/// The caller of a request, resolved together with their role.
#[derive(Debug, Clone)]
pub enum CurrentUser {
    Anonymous,
    User { user: User, role: Option<Role> },
}

impl CurrentUser {
    pub async fn load(pool: &SqlitePool, user: User) -> Result<Self, AppError> {
        let role = match user.role_id {
            Some(role_id) => {
                sqlx::query_as::<_, Role>(
                    "SELECT id, name, is_default, permissions FROM roles WHERE id = ?",
                )
                .bind(role_id)
                .fetch_optional(pool)
                .await?
            }
            None => None,
        };
        Ok(Self::User { user, role })
    }

    pub fn can(&self, permissions: Permission) -> bool {
        match self {
            Self::Anonymous => false,
            Self::User { role, .. } => role
                .as_ref()
                .is_some_and(|role| role.permissions().contains(permissions)),
        }
    }

    pub fn is_administrator(&self) -> bool {
        self.can(Permission::ADMINISTER)
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User { user, .. } => Some(user),
        }
    }

    /// Fails with 403 unless every bit of `permissions` is granted.
    pub fn require(&self, permissions: Permission) -> Result<&User, AppError> {
        match self.user() {
            Some(user) if self.can(permissions) => Ok(user),
            _ => Err(AppError::forbidden("Insufficient permissions")),
        }
    }

    /// Authors may act on their own records, administrators on everyone's.
    pub fn owns_or_administers(&self, owner_id: i64) -> bool {
        self.user().is_some_and(|u| u.id == owner_id) || self.is_administrator()
    }
}
