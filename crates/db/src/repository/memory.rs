//! In-memory repositories used when no database is configured, and by tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{Cat, CatPatch, CatRepository, DbError, NewCat, NewUser, Role, User, UserRepository, roles};

#[derive(Debug, Default)]
struct CatTable {
    next_id: i32,
    rows: BTreeMap<i32, Cat>,
}

impl CatTable {
    fn insert(&mut self, cat: NewCat) -> Cat {
        self.next_id += 1;
        let now = Utc::now();
        let cat = Cat {
            id: self.next_id,
            name: cat.name,
            age: cat.age,
            breed: cat.breed,
            description: cat.description,
            internal_notes: cat.internal_notes,
            created_at: now,
            updated_at: now,
        };
        self.rows.insert(cat.id, cat.clone());
        cat
    }

    /// Whether a cat other than `except` holds `name`.
    fn name_taken(&self, name: &str, except: Option<i32>) -> bool {
        self.rows
            .values()
            .any(|cat| cat.name == name && Some(cat.id) != except)
    }
}

/// [`CatRepository`] over a map guarded by an async lock.
#[derive(Debug, Default)]
pub struct MemoryCatRepository {
    table: RwLock<CatTable>,
}

impl MemoryCatRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository holding the same four sample cats as the initial migration.
    #[must_use]
    pub fn seeded() -> Self {
        let mut table = CatTable::default();
        for (name, age, breed, description) in [
            ("Whiskers", 3, "Persian", "A fluffy white cat"),
            ("Shadow", 5, "British Shorthair", "A grey cat that loves to play"),
            ("Luna", 2, "Siamese", "An elegant and vocal cat"),
            ("Mittens", 4, "Maine Coon", "A large and friendly cat"),
        ] {
            table.insert(NewCat {
                name: name.to_string(),
                age,
                breed: breed.to_string(),
                description: Some(description.to_string()),
                internal_notes: None,
            });
        }
        Self {
            table: RwLock::new(table),
        }
    }
}

#[async_trait]
impl CatRepository for MemoryCatRepository {
    async fn count(&self) -> Result<u64, DbError> {
        Ok(self.table.read().await.rows.len() as u64)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Cat>, DbError> {
        let skip = usize::try_from(offset).unwrap_or_default();
        let take = usize::try_from(limit).unwrap_or_default();
        Ok(self
            .table
            .read()
            .await
            .rows
            .values()
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Cat>, DbError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Cat>, DbError> {
        Ok(self
            .table
            .read()
            .await
            .rows
            .values()
            .find(|cat| cat.name == name)
            .cloned())
    }

    async fn create(&self, cat: NewCat) -> Result<Cat, DbError> {
        let mut table = self.table.write().await;
        if table.name_taken(&cat.name, None) {
            return Err(DbError::Duplicate("name"));
        }
        Ok(table.insert(cat))
    }

    async fn update(&self, id: i32, patch: CatPatch) -> Result<Option<Cat>, DbError> {
        let mut table = self.table.write().await;
        let clashes = patch
            .name
            .as_deref()
            .is_some_and(|name| table.rows.contains_key(&id) && table.name_taken(name, Some(id)));
        if clashes {
            return Err(DbError::Duplicate("name"));
        }
        Ok(table.rows.get_mut(&id).map(|cat| {
            patch.apply(cat, Utc::now());
            cat.clone()
        }))
    }

    async fn delete(&self, id: i32) -> Result<bool, DbError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
struct UserTable {
    next_id: i32,
    users: Vec<User>,
    roles: Vec<Role>,
    /// `(user_id, role_id)` pairs.
    links: Vec<(i32, i32)>,
}

/// [`UserRepository`] over vectors guarded by an async lock.
#[derive(Debug)]
pub struct MemoryUserRepository {
    table: RwLock<UserTable>,
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUserRepository {
    /// Repository with the `user` (1) and `super-admin` (2) roles seeded.
    #[must_use]
    pub fn new() -> Self {
        let roles = vec![
            Role {
                id: 1,
                code: roles::USER.to_string(),
                name: "User".to_string(),
            },
            Role {
                id: 2,
                code: roles::SUPER_ADMIN.to_string(),
                name: "Super administrator".to_string(),
            },
        ];
        Self {
            table: RwLock::new(UserTable {
                roles,
                ..UserTable::default()
            }),
        }
    }

    /// Repository without any role, so registration cannot assign a default.
    #[must_use]
    pub fn without_roles() -> Self {
        Self {
            table: RwLock::new(UserTable::default()),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let table = self.table.read().await;
        Ok(table.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let table = self.table.read().await;
        Ok(table.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_role_by_code(&self, code: &str) -> Result<Option<Role>, DbError> {
        let table = self.table.read().await;
        Ok(table.roles.iter().find(|r| r.code == code).cloned())
    }

    async fn create_with_role(&self, user: NewUser, role_id: i32) -> Result<User, DbError> {
        let mut table = self.table.write().await;
        if table.users.iter().any(|u| u.email == user.email) {
            return Err(DbError::Duplicate("email"));
        }
        if table.users.iter().any(|u| u.username == user.username) {
            return Err(DbError::Duplicate("username"));
        }
        table.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: table.next_id,
            username: user.username,
            email: user.email,
            password: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        table.users.push(user.clone());
        table.links.push((user.id, role_id));
        Ok(user)
    }

    async fn roles_for(&self, user_id: i32) -> Result<Vec<String>, DbError> {
        let table = self.table.read().await;
        Ok(table
            .links
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, rid)| table.roles.iter().find(|r| r.id == *rid))
            .map(|r| r.code.clone())
            .collect())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
