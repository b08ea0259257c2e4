use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::engines::is_identifier_safe;

/// Field name -> message
pub type FieldErrors = HashMap<String, String>;

/// MySQL limits account names to 32 characters; apply it to both engines
pub const MAX_USER_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Body of a create request, as submitted
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDatabaseRequest {
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database_flavour_name: Option<String>,
    pub project_id: Option<String>,
}

/// Fully populated record data, validated again before anything touches a server
#[derive(Debug, Clone, PartialEq)]
pub struct NewDatabase {
    pub name: String,
    pub user: String,
    pub password: String,
    pub database_flavour_name: String,
    pub host: String,
    pub port: u16,
    pub project_id: Option<Uuid>,
}

impl CreateDatabaseRequest {
    /// Parse a JSON body into a request, reporting shape errors per field
    pub fn from_json(body: Value) -> Result<Self, FieldErrors> {
        if !body.is_object() {
            return Err(single("body", "request body must be a JSON object"));
        }
        serde_json::from_value(body).map_err(|e| single("body", &e.to_string()))
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        match self.database_flavour_name.as_deref() {
            None => {
                errors.insert("database_flavour_name".into(), "database_flavour_name is required".into());
            }
            Some(v) if is_blank(v) => {
                errors.insert(
                    "database_flavour_name".into(),
                    "database_flavour_name should be a valid string".into(),
                );
            }
            Some(_) => {}
        }
        if let Some(name) = &self.name {
            check_name(name, &mut errors);
        }
        if let Some(user) = &self.user {
            check_user(user, &mut errors);
        }
        if let Some(password) = &self.password {
            check_password(password, &mut errors);
        }
        if let Some(project_id) = &self.project_id {
            if Uuid::parse_str(project_id).is_err() {
                errors.insert("project_id".into(), format!("Invalid UUID format: {}", project_id));
            }
        }

        finish(errors)
    }

    pub fn project_uuid(&self) -> Option<Uuid> {
        self.project_id.as_deref().and_then(|s| Uuid::parse_str(s).ok())
    }
}

impl NewDatabase {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_name(&self.name, &mut errors);
        check_user(&self.user, &mut errors);
        check_password(&self.password, &mut errors);
        if is_blank(&self.database_flavour_name) {
            errors.insert(
                "database_flavour_name".into(),
                "database_flavour_name should be a valid string".into(),
            );
        }
        if is_blank(&self.host) {
            errors.insert("host".into(), "host is not configured for this flavour".into());
        }
        if self.port == 0 {
            errors.insert("port".into(), "port is not configured for this flavour".into());
        }
        finish(errors)
    }
}

fn check_name(name: &str, errors: &mut FieldErrors) {
    if is_blank(name) {
        errors.insert("name".into(), "name should be a valid string".into());
    } else if !is_identifier_safe(name) {
        errors.insert(
            "name".into(),
            "name must start with a letter or underscore and contain only letters, digits and underscores (max 63)"
                .into(),
        );
    }
}

fn check_user(user: &str, errors: &mut FieldErrors) {
    if is_blank(user) {
        errors.insert("user".into(), "user should be a valid string".into());
    } else if !is_identifier_safe(user) || user.len() > MAX_USER_LEN {
        errors.insert(
            "user".into(),
            format!(
                "user must start with a letter or underscore and contain only letters, digits and underscores (max {})",
                MAX_USER_LEN
            ),
        );
    }
}

fn check_password(password: &str, errors: &mut FieldErrors) {
    if is_blank(password) {
        errors.insert("password".into(), "password should be a valid string".into());
    } else if password.len() > MAX_PASSWORD_LEN {
        errors.insert(
            "password".into(),
            format!("password must be at most {} characters", MAX_PASSWORD_LEN),
        );
    } else if password.chars().any(char::is_control) {
        errors.insert("password".into(), "password must not contain control characters".into());
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn single(field: &str, message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), message.to_string());
    errors
}

fn finish(errors: FieldErrors) -> Result<(), FieldErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
