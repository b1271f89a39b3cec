// flagflux_rust/src/core/event/formatter.rs

use super::input::{
    AliasEventData, CustomEventData, EvalEventData, IdentifyEventData, InputEvent, OutboxEvent,
};
use super::summarizer::EventSummary;
use super::user_filter::UserFilter;
use crate::core::config::EventsConfig;
use crate::core::model::User;
use crate::core::util::value_to_plain_string;
use serde_json::{json, Map, Value};

/// Attributes coerced to strings on the wire, whatever they held in memory.
const STRING_ATTRIBUTES: [&str; 9] = [
    "key",
    "secondary",
    "ip",
    "country",
    "email",
    "firstName",
    "lastName",
    "avatar",
    "name",
];

/// Converts buffered events plus the summary into the on-wire JSON shapes.
///
/// Optional fields are omitted entirely when absent, never serialized as
/// null. The summary, when non-empty, is appended as the last element.
pub struct EventOutputFormatter {
    user_filter: UserFilter,
    inline_users: bool,
}

impl EventOutputFormatter {
    pub fn new(config: &EventsConfig) -> Self {
        Self {
            user_filter: UserFilter::new(config),
            inline_users: config.inline_users_in_events,
        }
    }

    pub fn make_output_events(&self, events: &[OutboxEvent], summary: &EventSummary) -> Vec<Value> {
        let mut out: Vec<Value> = events.iter().map(|e| self.make_output_event(e)).collect();
        if !summary.is_empty() {
            out.push(self.make_summary_event(summary));
        }
        out
    }

    fn make_output_event(&self, event: &OutboxEvent) -> Value {
        match event {
            OutboxEvent::Full(InputEvent::Eval(e)) => self.make_feature_event(e, false),
            OutboxEvent::Debug(e) => self.make_feature_event(e, true),
            OutboxEvent::Full(InputEvent::Identify(e)) => self.make_identify_event(e),
            OutboxEvent::Full(InputEvent::Custom(e)) => self.make_custom_event(e),
            OutboxEvent::Full(InputEvent::Alias(e)) => make_alias_event(e),
            OutboxEvent::Index { timestamp, user } => json!({
                "kind": "index",
                "creationDate": timestamp,
                "user": self.filtered_user(user),
            }),
        }
    }

    fn make_feature_event(&self, event: &EvalEventData, debug: bool) -> Value {
        let mut out = Map::new();
        out.insert(
            "kind".to_string(),
            json!(if debug { "debug" } else { "feature" }),
        );
        out.insert("creationDate".to_string(), json!(event.timestamp));
        out.insert("key".to_string(), json!(event.key));
        out.insert("value".to_string(), event.value.clone());
        if !event.default.is_null() {
            out.insert("default".to_string(), event.default.clone());
        }
        if let Some(variation) = event.variation {
            out.insert("variation".to_string(), json!(variation));
        }
        if let Some(version) = event.version {
            out.insert("version".to_string(), json!(version));
        }
        if let Some(prereq_of) = &event.prereq_of {
            out.insert("prereqOf".to_string(), json!(prereq_of));
        }
        set_opt_context_kind(&mut out, &event.user);
        if debug {
            // Debug events always carry the full user for troubleshooting.
            out.insert("user".to_string(), self.filtered_user(&event.user));
        } else {
            self.set_user_or_user_key(&mut out, &event.user);
        }
        if let Some(reason) = &event.reason {
            out.insert("reason".to_string(), reason.to_json());
        }
        Value::Object(out)
    }

    fn make_identify_event(&self, event: &IdentifyEventData) -> Value {
        json!({
            "kind": "identify",
            "creationDate": event.timestamp,
            "key": event.user.key.clone().unwrap_or_default(),
            "user": self.filtered_user(&event.user),
        })
    }

    fn make_custom_event(&self, event: &CustomEventData) -> Value {
        let mut out = Map::new();
        out.insert("kind".to_string(), json!("custom"));
        out.insert("creationDate".to_string(), json!(event.timestamp));
        out.insert("key".to_string(), json!(event.key));
        if let Some(data) = &event.data {
            out.insert("data".to_string(), data.clone());
        }
        self.set_user_or_user_key(&mut out, &event.user);
        if let Some(metric_value) = event.metric_value {
            out.insert("metricValue".to_string(), json!(metric_value));
        }
        set_opt_context_kind(&mut out, &event.user);
        Value::Object(out)
    }

    fn make_summary_event(&self, summary: &EventSummary) -> Value {
        let mut features: Map<String, Value> = Map::new();
        for (key, counter) in &summary.counters {
            let flag_entry = features.entry(key.key.clone()).or_insert_with(|| {
                json!({
                    "default": counter.default.clone(),
                    "counters": [],
                })
            });
            let mut counter_out = Map::new();
            counter_out.insert("value".to_string(), counter.value.clone());
            counter_out.insert("count".to_string(), json!(counter.count));
            if let Some(variation) = key.variation {
                counter_out.insert("variation".to_string(), json!(variation));
            }
            match key.version {
                Some(version) => {
                    counter_out.insert("version".to_string(), json!(version));
                }
                None => {
                    counter_out.insert("unknown".to_string(), json!(true));
                }
            }
            if let Some(Value::Array(counters)) = flag_entry.get_mut("counters") {
                counters.push(Value::Object(counter_out));
            }
        }
        json!({
            "kind": "summary",
            "startDate": summary.start_date,
            "endDate": summary.end_date,
            "features": features,
        })
    }

    fn set_user_or_user_key(&self, out: &mut Map<String, Value>, user: &User) {
        if self.inline_users {
            out.insert("user".to_string(), self.filtered_user(user));
        } else {
            out.insert(
                "userKey".to_string(),
                json!(user.key.clone().unwrap_or_default()),
            );
        }
    }

    fn filtered_user(&self, user: &User) -> Value {
        let mut value = self.user_filter.transform_user_props(user);
        coerce_string_attributes(&mut value);
        value
    }
}

fn make_alias_event(event: &AliasEventData) -> Value {
    json!({
        "kind": "alias",
        "creationDate": event.timestamp,
        "key": event.key,
        "contextKind": event.context_kind,
        "previousKey": event.previous_key,
        "previousContextKind": event.previous_context_kind,
    })
}

fn set_opt_context_kind(out: &mut Map<String, Value>, user: &User) {
    if user.anonymous == Some(true) {
        out.insert("contextKind".to_string(), json!("anonymousUser"));
    }
}

fn coerce_string_attributes(user_json: &mut Value) {
    if let Value::Object(map) = user_json {
        for attribute in STRING_ATTRIBUTES {
            if let Some(value) = map.get_mut(attribute) {
                if !value.is_string() {
                    *value = Value::String(value_to_plain_string(value));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EventsConfigBuilder;
    use crate::core::eval::EvaluationReason;
    use crate::core::event::summarizer::{CounterKey, SummaryCounter};
    use crate::core::model::UserBuilder;

    fn formatter(inline: bool) -> EventOutputFormatter {
        EventOutputFormatter::new(
            &EventsConfigBuilder::new()
                .with_inline_users_in_events(inline)
                .build(),
        )
    }

    fn eval_event() -> EvalEventData {
        EvalEventData {
            timestamp: 1000,
            user: User::with_key("u1"),
            key: "F".to_string(),
            version: Some(9),
            variation: Some(0),
            value: json!(true),
            default: json!(false),
            reason: None,
            track_events: true,
            debug_until: None,
            prereq_of: None,
        }
    }

    #[test]
    fn feature_event_with_user_key() {
        let out = formatter(false)
            .make_output_events(&[OutboxEvent::Full(InputEvent::Eval(eval_event()))], &EventSummary::default());
        assert_eq!(
            out,
            vec![json!({
                "kind": "feature",
                "creationDate": 1000,
                "key": "F",
                "value": true,
                "default": false,
                "variation": 0,
                "version": 9,
                "userKey": "u1",
            })]
        );
    }

    #[test]
    fn feature_event_inline_user_with_reason_and_context_kind() {
        let mut event = eval_event();
        event.user = UserBuilder::new("u1").anonymous(true).build();
        event.reason = Some(EvaluationReason::fallthrough(false));
        event.prereq_of = Some("parent".to_string());
        let out = formatter(true).make_output_event(&OutboxEvent::Full(InputEvent::Eval(event)));
        assert_eq!(
            out,
            json!({
                "kind": "feature",
                "creationDate": 1000,
                "key": "F",
                "value": true,
                "default": false,
                "variation": 0,
                "version": 9,
                "prereqOf": "parent",
                "contextKind": "anonymousUser",
                "user": {"key": "u1", "anonymous": true},
                "reason": {"kind": "FALLTHROUGH"},
            })
        );
    }

    #[test]
    fn optional_fields_are_omitted_not_null() {
        let mut event = eval_event();
        event.version = None;
        event.variation = None;
        event.default = Value::Null;
        let out = formatter(false).make_output_event(&OutboxEvent::Full(InputEvent::Eval(event)));
        let object = out.as_object().unwrap();
        assert!(!object.contains_key("version"));
        assert!(!object.contains_key("variation"));
        assert!(!object.contains_key("default"));
        assert!(!object.contains_key("prereqOf"));
        assert!(!object.contains_key("reason"));
        assert!(!object.contains_key("contextKind"));
    }

    #[test]
    fn debug_event_always_inlines_the_user() {
        let out = formatter(false).make_output_event(&OutboxEvent::Debug(eval_event()));
        assert_eq!(out["kind"], json!("debug"));
        assert_eq!(out["user"], json!({"key": "u1"}));
        assert!(out.get("userKey").is_none());
    }

    #[test]
    fn identify_event_shape() {
        let out = formatter(false).make_output_event(&OutboxEvent::Full(InputEvent::Identify(
            IdentifyEventData {
                timestamp: 2000,
                user: User::with_key("u2"),
            },
        )));
        assert_eq!(
            out,
            json!({
                "kind": "identify",
                "creationDate": 2000,
                "key": "u2",
                "user": {"key": "u2"},
            })
        );
    }

    #[test]
    fn custom_event_shape_with_metric_and_data() {
        let out = formatter(false).make_output_event(&OutboxEvent::Full(InputEvent::Custom(
            CustomEventData {
                timestamp: 3000,
                user: User::with_key("u3"),
                key: "search".to_string(),
                data: Some(json!({"query": "q"})),
                metric_value: Some(1.5),
            },
        )));
        assert_eq!(
            out,
            json!({
                "kind": "custom",
                "creationDate": 3000,
                "key": "search",
                "data": {"query": "q"},
                "userKey": "u3",
                "metricValue": 1.5,
            })
        );
    }

    #[test]
    fn alias_event_shape() {
        let out = formatter(false).make_output_event(&OutboxEvent::Full(InputEvent::Alias(
            AliasEventData {
                timestamp: 4000,
                key: "u".to_string(),
                context_kind: "user",
                previous_key: "anon".to_string(),
                previous_context_kind: "anonymousUser",
            },
        )));
        assert_eq!(
            out,
            json!({
                "kind": "alias",
                "creationDate": 4000,
                "key": "u",
                "contextKind": "user",
                "previousKey": "anon",
                "previousContextKind": "anonymousUser",
            })
        );
    }

    #[test]
    fn index_event_carries_the_full_user() {
        let user = UserBuilder::new("u1").email("e@example.com").build();
        let out = formatter(false).make_output_event(&OutboxEvent::Index {
            timestamp: 5000,
            user,
        });
        assert_eq!(
            out,
            json!({
                "kind": "index",
                "creationDate": 5000,
                "user": {"key": "u1", "email": "e@example.com"},
            })
        );
    }

    #[test]
    fn user_attributes_are_coerced_to_strings() {
        let user = UserBuilder::new("u1").ip(1234).country(true).build();
        let out = formatter(false).make_output_event(&OutboxEvent::Index {
            timestamp: 1,
            user,
        });
        assert_eq!(out["user"]["ip"], json!("1234"));
        assert_eq!(out["user"]["country"], json!("true"));
    }

    #[test]
    fn summary_event_shape_with_unknown_version() {
        let mut counters = EventSummary::default();
        counters.start_date = 100;
        counters.end_date = 300;
        counters.counters.insert(
            CounterKey {
                key: "F".to_string(),
                variation: Some(1),
                version: Some(7),
            },
            SummaryCounter {
                default: json!("d"),
                value: json!("x"),
                count: 3,
            },
        );
        counters.counters.insert(
            CounterKey {
                key: "F".to_string(),
                variation: None,
                version: None,
            },
            SummaryCounter {
                default: json!("d"),
                value: json!("d"),
                count: 1,
            },
        );
        let out = formatter(false).make_output_events(&[], &counters);
        assert_eq!(
            out,
            vec![json!({
                "kind": "summary",
                "startDate": 100,
                "endDate": 300,
                "features": {
                    "F": {
                        "default": "d",
                        "counters": [
                            {"value": "x", "count": 3, "variation": 1, "version": 7},
                            {"value": "d", "count": 1, "unknown": true},
                        ],
                    },
                },
            })]
        );
    }

    #[test]
    fn empty_summary_is_not_appended() {
        let out = formatter(false).make_output_events(&[], &EventSummary::default());
        assert!(out.is_empty());
    }
}
