// flagflux_rust/src/core/event/user_filter.rs

use crate::core::config::EventsConfig;
use crate::core::model::User;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Applies private-attribute redaction when users are serialized into event
/// payloads. An attribute is private if the configuration says all of them
/// are, if it is named in the global private list, or if the user names it
/// in their own private list. `key` and `anonymous` are never redacted.
pub struct UserFilter {
    all_attributes_private: bool,
    private_attribute_names: HashSet<String>,
}

impl UserFilter {
    pub fn new(config: &EventsConfig) -> Self {
        Self {
            all_attributes_private: config.all_attributes_private,
            private_attribute_names: config.private_attribute_names.iter().cloned().collect(),
        }
    }

    /// Build the on-wire user object, replacing redacted attributes with a
    /// sorted `privateAttrs` name list.
    pub fn transform_user_props(&self, user: &User) -> Value {
        let mut out = Map::new();
        let mut removed: Vec<String> = Vec::new();

        if let Some(key) = &user.key {
            out.insert("key".to_string(), json!(key));
        }
        if let Some(anonymous) = user.anonymous {
            out.insert("anonymous".to_string(), json!(anonymous));
        }

        let built_ins: [(&str, &Option<Value>); 8] = [
            ("secondary", &user.secondary),
            ("ip", &user.ip),
            ("country", &user.country),
            ("email", &user.email),
            ("firstName", &user.first_name),
            ("lastName", &user.last_name),
            ("avatar", &user.avatar),
            ("name", &user.name),
        ];
        for (name, value) in built_ins {
            if let Some(value) = value {
                if self.is_private(user, name) {
                    removed.push(name.to_string());
                } else {
                    out.insert(name.to_string(), value.clone());
                }
            }
        }

        if !user.custom.is_empty() {
            let mut custom_out = Map::new();
            for (name, value) in &user.custom {
                if self.is_private(user, name) {
                    removed.push(name.clone());
                } else {
                    custom_out.insert(name.clone(), value.clone());
                }
            }
            out.insert("custom".to_string(), Value::Object(custom_out));
        }

        if !removed.is_empty() {
            removed.sort();
            removed.dedup();
            out.insert("privateAttrs".to_string(), json!(removed));
        }
        Value::Object(out)
    }

    fn is_private(&self, user: &User, name: &str) -> bool {
        self.all_attributes_private
            || self.private_attribute_names.contains(name)
            || user.private_attribute_names.iter().any(|n| n == name)
    }
}
