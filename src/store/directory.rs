use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use super::AccountStore;
use crate::authz::ResourceLookup;
use crate::error::StoreError;
use crate::types::{EntityId, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("School not found: {0}")]
    UnknownSchool(EntityId),

    #[error("Classroom not found: {0}")]
    UnknownClassroom(EntityId),

    #[error("Classroom {classroom} does not belong to school {school}")]
    SchoolMismatch { school: EntityId, classroom: EntityId },

    #[error("A student needs a schoolId or a classroomId")]
    MissingPlacement,

    #[error("Username or email already exists")]
    DuplicateAccount,

    #[error("School ID is required for school administrators")]
    MissingSchool,

    #[error("Superadmin registration is closed")]
    SuperadminExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct School {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub school_id: EntityId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub school_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classroom_id: Option<EntityId>,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone)]
struct Account {
    username: String,
    email: Option<String>,
    password_hash: Option<String>,
    principal: Principal,
}

/// Self-service registration; the password arrives already hashed
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub school_id: Option<EntityId>,
}

/// Public view of an account, as returned by register and login
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountProfile {
    pub id: EntityId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
}

/// Stored login material for one username
#[derive(Debug, Clone)]
pub struct Credentials {
    pub principal: Principal,
    pub profile: AccountProfile,
    pub password_hash: String,
}

impl Account {
    fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.principal.user_id().clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.principal.role(),
        }
    }
}

#[derive(Debug, Default)]
struct Directory {
    schools: HashMap<EntityId, School>,
    classrooms: HashMap<EntityId, Classroom>,
    students: HashMap<EntityId, Student>,
    accounts: HashMap<EntityId, Account>,
}

/// In-memory school/classroom/student directory and account table
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    inner: RwLock<Directory>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_school(&self, name: impl Into<String>) -> School {
        let school = School {
            id: EntityId::generate(),
            name: name.into(),
        };
        self.inner
            .write()
            .await
            .schools
            .insert(school.id.clone(), school.clone());
        school
    }

    pub async fn add_classroom(
        &self,
        school_id: &EntityId,
        name: impl Into<String>,
    ) -> Result<Classroom, DirectoryError> {
        let mut dir = self.inner.write().await;
        if !dir.schools.contains_key(school_id) {
            return Err(DirectoryError::UnknownSchool(school_id.clone()));
        }

        let classroom = Classroom {
            id: EntityId::generate(),
            school_id: school_id.clone(),
            name: name.into(),
        };
        dir.classrooms.insert(classroom.id.clone(), classroom.clone());
        Ok(classroom)
    }

    /// Enroll a student. A classroom placement determines the school.
    pub async fn add_student(
        &self,
        school_id: Option<&EntityId>,
        classroom_id: Option<&EntityId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Result<Student, DirectoryError> {
        let mut dir = self.inner.write().await;

        let school_id = match (school_id, classroom_id) {
            (requested, Some(classroom_id)) => {
                let classroom = dir
                    .classrooms
                    .get(classroom_id)
                    .ok_or_else(|| DirectoryError::UnknownClassroom(classroom_id.clone()))?;
                if let Some(requested) = requested {
                    if *requested != classroom.school_id {
                        return Err(DirectoryError::SchoolMismatch {
                            school: requested.clone(),
                            classroom: classroom_id.clone(),
                        });
                    }
                }
                classroom.school_id.clone()
            }
            (Some(school_id), None) => {
                if !dir.schools.contains_key(school_id) {
                    return Err(DirectoryError::UnknownSchool(school_id.clone()));
                }
                school_id.clone()
            }
            (None, None) => return Err(DirectoryError::MissingPlacement),
        };

        let student = Student {
            id: EntityId::generate(),
            school_id,
            classroom_id: classroom_id.cloned(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        };
        dir.students.insert(student.id.clone(), student.clone());
        Ok(student)
    }

    pub async fn add_superadmin(&self, username: impl Into<String>) -> Principal {
        let principal = Principal::superadmin(EntityId::generate());
        self.insert_account(username.into(), principal.clone()).await;
        principal
    }

    pub async fn add_school_admin(
        &self,
        username: impl Into<String>,
        school_id: &EntityId,
    ) -> Result<Principal, DirectoryError> {
        if self.school(school_id).await.is_none() {
            return Err(DirectoryError::UnknownSchool(school_id.clone()));
        }
        let principal = Principal::school_admin(EntityId::generate(), school_id.clone());
        self.insert_account(username.into(), principal.clone()).await;
        Ok(principal)
    }

    async fn insert_account(&self, username: String, principal: Principal) {
        tracing::debug!("Account '{}' registered as {}", username, principal.role());
        self.inner.write().await.accounts.insert(
            principal.user_id().clone(),
            Account {
                username,
                email: None,
                password_hash: None,
                principal,
            },
        );
    }

    /// Create a login-capable account. Usernames and emails are unique and a
    /// school admin must point at an existing school.
    pub async fn register_account(&self, new: NewAccount) -> Result<AccountProfile, DirectoryError> {
        let mut dir = self.inner.write().await;

        let taken = dir.accounts.values().any(|a| {
            a.username == new.username || a.email.as_deref() == Some(new.email.as_str())
        });
        if taken {
            return Err(DirectoryError::DuplicateAccount);
        }

        let user_id = EntityId::generate();
        let principal = match (new.role, new.school_id) {
            (Role::Superadmin, _) => {
                if dir.accounts.values().any(|a| a.principal.is_superadmin()) {
                    return Err(DirectoryError::SuperadminExists);
                }
                Principal::superadmin(user_id)
            }
            (Role::SchoolAdmin, Some(school_id)) => {
                if !dir.schools.contains_key(&school_id) {
                    return Err(DirectoryError::UnknownSchool(school_id));
                }
                Principal::school_admin(user_id, school_id)
            }
            (Role::SchoolAdmin, None) => return Err(DirectoryError::MissingSchool),
        };

        let account = Account {
            username: new.username,
            email: Some(new.email),
            password_hash: Some(new.password_hash),
            principal,
        };
        let profile = account.profile();
        tracing::debug!("Account '{}' registered as {}", profile.username, profile.role);
        dir.accounts.insert(profile.id.clone(), account);
        Ok(profile)
    }

    /// Login material for `username`; accounts seeded without a password have none
    pub async fn credentials(&self, username: &str) -> Option<Credentials> {
        let dir = self.inner.read().await;
        let account = dir.accounts.values().find(|a| a.username == username)?;
        Some(Credentials {
            principal: account.principal.clone(),
            profile: account.profile(),
            password_hash: account.password_hash.clone()?,
        })
    }

    pub async fn username(&self, user_id: &EntityId) -> Option<String> {
        self.inner
            .read()
            .await
            .accounts
            .get(user_id)
            .map(|a| a.username.clone())
    }

    pub async fn school(&self, id: &EntityId) -> Option<School> {
        self.inner.read().await.schools.get(id).cloned()
    }

    pub async fn classroom(&self, id: &EntityId) -> Option<Classroom> {
        self.inner.read().await.classrooms.get(id).cloned()
    }

    pub async fn student(&self, id: &EntityId) -> Option<Student> {
        self.inner.read().await.students.get(id).cloned()
    }
}

#[async_trait]
impl AccountStore for MemoryDirectory {
    async fn find_principal(&self, user_id: &EntityId) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .accounts
            .get(user_id)
            .map(|a| a.principal.clone()))
    }
}

#[async_trait]
impl ResourceLookup for MemoryDirectory {
    async fn school_of_classroom(
        &self,
        classroom_id: &EntityId,
    ) -> Result<Option<EntityId>, StoreError> {
        Ok(self.classroom(classroom_id).await.map(|c| c.school_id))
    }

    async fn school_of_student(&self, student_id: &EntityId) -> Result<Option<EntityId>, StoreError> {
        Ok(self.student(student_id).await.map(|s| s.school_id))
    }
}
