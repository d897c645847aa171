use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Canonical string form of an entity identifier.
///
/// Identifiers reach the pipeline as JSON strings, numbers, or Mongo
/// extended-JSON objects (`{"$oid": "..."}`). Every comparison happens on
/// this normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Normalize a raw string. Blank input is not an identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Normalize a JSON parameter value
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => Self::parse(&n.to_string()),
            Value::Object(map) => map.get("$oid").and_then(Self::from_value),
            _ => None,
        }
    }

    /// Fresh identifier for in-memory records
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "superadmin")]
    Superadmin,
    #[serde(rename = "schoolAdmin")]
    SchoolAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::SchoolAdmin => "schoolAdmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated caller, loaded once per request by the authentication stage.
///
/// `school_id` is present exactly when the role is `schoolAdmin`; the
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    user_id: EntityId,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    school_id: Option<EntityId>,
}

impl Principal {
    pub fn superadmin(user_id: EntityId) -> Self {
        Self {
            user_id,
            role: Role::Superadmin,
            school_id: None,
        }
    }

    pub fn school_admin(user_id: EntityId, school_id: EntityId) -> Self {
        Self {
            user_id,
            role: Role::SchoolAdmin,
            school_id: Some(school_id),
        }
    }

    pub fn user_id(&self) -> &EntityId {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn school_id(&self) -> Option<&EntityId> {
        self.school_id.as_ref()
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == Role::Superadmin
    }
}

/// Resource modules reachable under `/api/:moduleName`, excluding `auth`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceModule {
    School,
    Classroom,
    Student,
}

impl ResourceModule {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "school" => Some(Self::School),
            "classroom" => Some(Self::Classroom),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::School => "school",
            Self::Classroom => "classroom",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for ResourceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
