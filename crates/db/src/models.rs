//! Database models.

use cats_core::JwtSubject;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Role codes seeded by the initial migration.
pub mod roles {
    /// Assigned to every registered user.
    pub const USER: &str = "user";
    pub const SUPER_ADMIN: &str = "super-admin";
}

/// A cat as stored. `internal_notes` never leaves the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cat {
    pub id: i32,
    pub name: String,
    pub age: i32,
    pub breed: String,
    pub description: Option<String>,
    #[serde(skip)]
    pub internal_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert parameters for a cat.
#[derive(Debug, Clone)]
pub struct NewCat {
    pub name: String,
    pub age: i32,
    pub breed: String,
    pub description: Option<String>,
    pub internal_notes: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct CatPatch {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub breed: Option<String>,
    pub description: Option<String>,
}

impl CatPatch {
    /// Apply the patch in place, touching `updated_at`.
    pub fn apply(self, cat: &mut Cat, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            cat.name = name;
        }
        if let Some(age) = self.age {
            cat.age = age;
        }
        if let Some(breed) = self.breed {
            cat.breed = breed;
        }
        if let Some(description) = self.description {
            cat.description = Some(description);
        }
        cat.updated_at = now;
    }
}

/// A registered user. The password hash is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert parameters for a user. `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Role {
    pub id: i32,
    pub code: String,
    pub name: String,
}

/// User together with its role codes; the subject of access tokens.
#[derive(Debug, Clone)]
pub struct UserWithRoles {
    pub user: User,
    pub roles: Vec<String>,
}

impl JwtSubject for UserWithRoles {
    fn user_id(&self) -> i32 {
        self.user.id
    }

    fn email(&self) -> &str {
        &self.user.email
    }

    fn username(&self) -> &str {
        &self.user.username
    }

    fn roles(&self) -> &[String] {
        &self.roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat() -> Cat {
        let now = Utc::now();
        Cat {
            id: 1,
            name: "Luna".to_string(),
            age: 2,
            breed: "Siamese".to_string(),
            description: None,
            internal_notes: Some("vet notes".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn internal_notes_are_not_serialized() {
        let value = serde_json::to_value(cat()).unwrap();
        assert!(value.get("internalNotes").is_none());
        assert!(value.get("internal_notes").is_none());
        assert_eq!(value["name"], "Luna");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn patch_keeps_absent_fields() {
        let mut cat = cat();
        let later = cat.updated_at + chrono::Duration::seconds(5);
        CatPatch {
            age: Some(3),
            ..CatPatch::default()
        }
        .apply(&mut cat, later);
        assert_eq!(cat.age, 3);
        assert_eq!(cat.name, "Luna");
        assert_eq!(cat.updated_at, later);
    }

    #[test]
    fn user_password_is_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: 1,
            username: "tom".to_string(),
            email: "tom@example.com".to_string(),
            password: "$argon2id$...".to_string(),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(user).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["username"], "tom");
    }
}
