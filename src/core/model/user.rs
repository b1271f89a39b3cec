// flagflux_rust/src/core/model/user.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A user as seen by the evaluator and the event pipeline.
///
/// Only `key` is semantically required; evaluation of a keyless user yields
/// an error detail rather than a panic. The built-in attributes other than
/// `key` may carry any JSON value and are coerced to strings when the user
/// is serialized into an event payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous: Option<bool>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub private_attribute_names: Vec<String>,
}

impl User {
    /// Shortcut for the common case of a user with only a key.
    pub fn with_key(key: impl Into<String>) -> Self {
        User {
            key: Some(key.into()),
            ..User::default()
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Look up an attribute by name: built-ins first, then the custom map.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "key" => self.key.clone().map(Value::String),
            "secondary" => self.secondary.clone(),
            "ip" => self.ip.clone(),
            "country" => self.country.clone(),
            "email" => self.email.clone(),
            "firstName" => self.first_name.clone(),
            "lastName" => self.last_name.clone(),
            "avatar" => self.avatar.clone(),
            "name" => self.name.clone(),
            "anonymous" => self.anonymous.map(Value::Bool),
            _ => self.custom.get(name).cloned(),
        }
    }
}

/// Fluent construction of [`User`] values.
#[derive(Debug, Clone, Default)]
pub struct UserBuilder {
    user: User,
}

impl UserBuilder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            user: User::with_key(key),
        }
    }

    pub fn secondary(mut self, value: impl Into<Value>) -> Self {
        self.user.secondary = Some(value.into());
        self
    }

    pub fn ip(mut self, value: impl Into<Value>) -> Self {
        self.user.ip = Some(value.into());
        self
    }

    pub fn country(mut self, value: impl Into<Value>) -> Self {
        self.user.country = Some(value.into());
        self
    }

    pub fn email(mut self, value: impl Into<Value>) -> Self {
        self.user.email = Some(value.into());
        self
    }

    pub fn first_name(mut self, value: impl Into<Value>) -> Self {
        self.user.first_name = Some(value.into());
        self
    }

    pub fn last_name(mut self, value: impl Into<Value>) -> Self {
        self.user.last_name = Some(value.into());
        self
    }

    pub fn avatar(mut self, value: impl Into<Value>) -> Self {
        self.user.avatar = Some(value.into());
        self
    }

    pub fn name(mut self, value: impl Into<Value>) -> Self {
        self.user.name = Some(value.into());
        self
    }

    pub fn anonymous(mut self, value: bool) -> Self {
        self.user.anonymous = Some(value);
        self
    }

    pub fn custom(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.user.custom.insert(name.into(), value.into());
        self
    }

    /// Mark an attribute as private for this user only.
    pub fn private_attribute(mut self, name: impl Into<String>) -> Self {
        self.user.private_attribute_names.push(name.into());
        self
    }

    pub fn build(self) -> User {
        self.user
    }
}
