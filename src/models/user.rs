use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{audited, merge, merge_opt, Audit, Entity, Reference, Writable};
use crate::auth::hash_password;
use crate::error::ApiError;
use crate::filter::SortDirection;
use crate::listing::{ListSpec, ParamFilter, Populate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    Employee,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Employee => "employee",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Stored, never returned to clients
    pub password_hash: String,
    pub role: UserRole,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub outlet: Option<Uuid>,
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub audit: Audit,
}

static LIST: ListSpec = ListSpec {
    search: &["name", "email", "department", "position"],
    filters: &[
        ParamFilter::text("role", "role"),
        ParamFilter::text("department", "department"),
        ParamFilter::uuid("outlet", "outlet"),
    ],
    date_range: None,
    order: &[("name", SortDirection::Asc)],
    default_limit: None,
};

static POPULATE: [Populate; 1] = [Populate::field("outlet", "sales_outlets", &["code", "name"])];

impl Entity for User {
    const TABLE: &'static str = "users";
    const LABEL: &'static str = "User";
    const DUPLICATE_MESSAGE: &'static str = "User with this email already exists";

    audited!();

    fn list_spec() -> &'static ListSpec {
        &LIST
    }

    fn populate() -> &'static [Populate] {
        &POPULATE
    }

    fn to_api_value(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.remove("passwordHash");
        }
        value
    }
}

impl User {
    /// Account created outside the API (bootstrap admin)
    pub fn bootstrap(name: String, email: String, password: &str, role: UserRole) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            email: email.trim().to_lowercase(),
            password_hash: hash_password(password).map_err(ApiError::internal)?,
            role,
            department: None,
            phone: None,
            position: None,
            outlet: None,
            last_login_at: None,
            audit: Audit::new(None),
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateUser {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<UserRole>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub position: Option<String>,
    pub outlet: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    #[validate(length(max = 100))]
    pub department: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub position: Option<String>,
    pub outlet: Option<Uuid>,
}

impl Writable for User {
    type Create = CreateUser;
    type Update = UpdateUser;

    fn create(input: CreateUser, actor: Uuid) -> Result<Self, ApiError> {
        Ok(Self {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email.trim().to_lowercase(),
            password_hash: hash_password(&input.password).map_err(ApiError::internal)?,
            role: input.role.unwrap_or(UserRole::Employee),
            department: input.department,
            phone: input.phone,
            position: input.position,
            outlet: input.outlet,
            last_login_at: None,
            audit: Audit::new(Some(actor)),
        })
    }

    fn update(&mut self, input: UpdateUser) -> Result<(), ApiError> {
        merge(&mut self.name, input.name);
        merge(&mut self.email, input.email.map(|e| e.trim().to_lowercase()));
        if let Some(password) = input.password {
            self.password_hash = hash_password(&password).map_err(ApiError::internal)?;
        }
        merge(&mut self.role, input.role);
        merge_opt(&mut self.department, input.department);
        merge_opt(&mut self.phone, input.phone);
        merge_opt(&mut self.position, input.position);
        merge_opt(&mut self.outlet, input.outlet);
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        Reference::optional("sales_outlets", "Sales outlet", self.outlet)
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use serde_json::json;

    fn user() -> User {
        let input: CreateUser = serde_json::from_value(json!({
            "name": "Ana",
            "email": "Ana@Example.com",
            "password": "correct horse"
        }))
        .unwrap();
        User::create(input, Uuid::new_v4()).unwrap()
    }

    #[test]
    fn password_hash_never_reaches_clients() {
        let u = user();
        let wire = u.to_api_value();
        assert!(wire.get("passwordHash").is_none());
        assert_eq!(wire["email"], "ana@example.com");
        assert_eq!(wire["role"], "employee");
        // Storage still carries it
        assert!(serde_json::to_value(&u).unwrap().get("passwordHash").is_some());
    }

    #[test]
    fn password_is_hashed_and_rehashed() {
        let mut u = user();
        assert_ne!(u.password_hash, "correct horse");
        assert!(verify_password("correct horse", &u.password_hash));
        u.update(UpdateUser { password: Some("battery staple".into()), ..Default::default() })
            .unwrap();
        assert!(verify_password("battery staple", &u.password_hash));
    }

    #[test]
    fn short_password_fails_validation() {
        let input: CreateUser =
            serde_json::from_value(json!({ "name": "A", "email": "a@b.com", "password": "short" })).unwrap();
        assert!(input.validate().is_err());
    }
}
