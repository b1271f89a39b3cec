#[path = "common/mod.rs"]
mod common;
use common::{events_of_kind, new_processor, quiet_config, CapturingSender};
use flagflux_rust::core::model::{User, UserBuilder};
use flagflux_rust::core::util::current_time_millis;
use serde_json::{json, Value};

fn record_untracked_eval(
    processor: &flagflux_rust::core::event::processor::EventProcessor,
    user: User,
) {
    processor.record_eval_event(
        user,
        "F",
        Some(7),
        Some(1),
        json!("x"),
        None,
        json!("d"),
        false,
        None,
        None,
    );
}

#[test]
fn summary_aggregates_untracked_evals() {
    let sender = CapturingSender::new();
    let processor = new_processor(quiet_config().build(), sender.clone());

    // Keyless evaluations: nothing to index, nothing tracked.
    for _ in 0..3 {
        record_untracked_eval(&processor, User::default());
    }
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload.as_array().unwrap().len(), 1);
    assert!(events_of_kind(payload, "feature").is_empty());
    assert!(events_of_kind(payload, "index").is_empty());

    let summary = &events_of_kind(payload, "summary")[0];
    let counters = summary["features"]["F"]["counters"].as_array().unwrap();
    assert_eq!(
        counters,
        &vec![json!({"value": "x", "count": 3, "variation": 1, "version": 7})]
    );
    assert_eq!(summary["features"]["F"]["default"], json!("d"));
    assert!(summary["startDate"].as_u64().unwrap() <= summary["endDate"].as_u64().unwrap());

    processor.stop();
}

#[test]
fn tracked_eval_for_new_user_emits_index_then_feature_then_summary() {
    let sender = CapturingSender::new();
    let processor = new_processor(quiet_config().build(), sender.clone());

    processor.record_eval_event(
        User::with_key("u1"),
        "F",
        Some(9),
        Some(0),
        json!(true),
        None,
        json!(false),
        true,
        None,
        None,
    );
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    assert_eq!(payloads.len(), 1);
    let events = payloads[0].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["kind"], json!("index"));
    assert_eq!(events[0]["user"]["key"], json!("u1"));
    assert_eq!(events[1]["kind"], json!("feature"));
    assert_eq!(events[1]["key"], json!("F"));
    assert_eq!(events[1]["userKey"], json!("u1"));
    assert_eq!(events[1]["value"], json!(true));
    assert_eq!(events[1]["variation"], json!(0));
    assert_eq!(events[1]["version"], json!(9));
    assert_eq!(events[2]["kind"], json!("summary"));

    processor.stop();
}

#[test]
fn one_index_event_per_user_within_a_window() {
    let sender = CapturingSender::new();
    let processor = new_processor(quiet_config().build(), sender.clone());

    for _ in 0..3 {
        processor.record_eval_event(
            User::with_key("u1"),
            "F",
            Some(1),
            Some(0),
            json!(1),
            None,
            Value::Null,
            true,
            None,
            None,
        );
    }
    processor.record_custom_event(User::with_key("u1"), "click", None, None);
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    let index_events = events_of_kind(&payloads[0], "index");
    assert_eq!(index_events.len(), 1);
    assert_eq!(events_of_kind(&payloads[0], "feature").len(), 3);
    assert_eq!(events_of_kind(&payloads[0], "custom").len(), 1);

    processor.stop();
}

#[test]
fn identify_suppresses_the_index_event_but_not_later_dedup() {
    let sender = CapturingSender::new();
    let processor = new_processor(quiet_config().build(), sender.clone());

    processor.record_identify_event(User::with_key("u1"));
    processor.record_eval_event(
        User::with_key("u1"),
        "F",
        Some(1),
        Some(0),
        json!(1),
        None,
        Value::Null,
        true,
        None,
        None,
    );
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    // The identify already carried the full user, so no index for u1 at all.
    assert!(events_of_kind(&payloads[0], "index").is_empty());
    assert_eq!(events_of_kind(&payloads[0], "identify").len(), 1);
    assert_eq!(events_of_kind(&payloads[0], "feature").len(), 1);

    processor.stop();
}

#[test]
fn inline_users_suppress_index_events() {
    let sender = CapturingSender::new();
    let processor = new_processor(
        quiet_config().with_inline_users_in_events(true).build(),
        sender.clone(),
    );

    processor.record_eval_event(
        User::with_key("u1"),
        "F",
        Some(1),
        Some(0),
        json!(1),
        None,
        Value::Null,
        true,
        None,
        None,
    );
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    assert!(events_of_kind(&payloads[0], "index").is_empty());
    let feature = &events_of_kind(&payloads[0], "feature")[0];
    assert_eq!(feature["user"]["key"], json!("u1"));
    assert!(feature.get("userKey").is_none());

    processor.stop();
}

#[test]
fn inline_identify_still_suppresses_index_for_later_events() {
    let sender = CapturingSender::new();
    let processor = new_processor(
        quiet_config().with_inline_users_in_events(true).build(),
        sender.clone(),
    );

    // The identify carries the full user inline; the user must still be
    // noticed so the window remembers them.
    processor.record_identify_event(User::with_key("u1"));
    // A non-full eval for the same user would otherwise index them now.
    record_untracked_eval(&processor, User::with_key("u1"));
    // A full custom event inlines the user and needs no index either.
    processor.record_custom_event(User::with_key("u1"), "click", None, None);
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    assert_eq!(payloads.len(), 1);
    assert!(events_of_kind(&payloads[0], "index").is_empty());
    assert_eq!(events_of_kind(&payloads[0], "identify").len(), 1);
    assert_eq!(events_of_kind(&payloads[0], "custom").len(), 1);
    assert!(events_of_kind(&payloads[0], "feature").is_empty());
    let summary = &events_of_kind(&payloads[0], "summary")[0];
    assert_eq!(summary["features"]["F"]["counters"][0]["count"], json!(1));

    processor.stop();
}

#[test]
fn untracked_eval_appears_only_in_the_summary() {
    let sender = CapturingSender::new();
    let processor = new_processor(quiet_config().build(), sender.clone());

    record_untracked_eval(&processor, User::with_key("quiet-user"));
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    let events = payloads[0].as_array().unwrap();
    // The user still gets indexed, but the evaluation itself is summary-only.
    assert!(events_of_kind(&payloads[0], "feature").is_empty());
    assert!(events_of_kind(&payloads[0], "debug").is_empty());
    assert_eq!(events_of_kind(&payloads[0], "index").len(), 1);
    let summary = events.last().unwrap();
    assert_eq!(summary["kind"], json!("summary"));
    assert_eq!(summary["features"]["F"]["counters"][0]["count"], json!(1));

    processor.stop();
}

#[test]
fn debug_events_follow_the_debug_window() {
    let sender = CapturingSender::new();
    let processor = new_processor(quiet_config().build(), sender.clone());
    let now = current_time_millis();

    // Window open: debug copy plus summary, no feature event.
    processor.record_eval_event(
        User::default(),
        "F",
        Some(7),
        Some(1),
        json!("x"),
        None,
        json!("d"),
        false,
        Some(now + 60_000),
        None,
    );
    processor.flush();
    processor.wait_until_inactive();
    {
        let payloads = sender.event_payloads();
        let events = payloads[0].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["kind"], json!("debug"));
        assert_eq!(events[0]["key"], json!("F"));
        assert!(events_of_kind(&payloads[0], "feature").is_empty());
    }

    // Window already past: summary only.
    processor.record_eval_event(
        User::default(),
        "F",
        Some(7),
        Some(1),
        json!("x"),
        None,
        json!("d"),
        false,
        Some(now.saturating_sub(10_000)),
        None,
    );
    processor.flush();
    processor.wait_until_inactive();
    let payloads = sender.event_payloads();
    assert_eq!(payloads.len(), 2);
    let events = payloads[1].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["kind"], json!("summary"));

    processor.stop();
}

#[test]
fn server_time_gates_debug_events() {
    let sender = CapturingSender::new();
    let now = current_time_millis();
    // The server reports a clock far ahead of ours.
    sender.set_result(flagflux_rust::core::event::sender::EventSenderResult {
        success: true,
        must_shutdown: false,
        time_from_server_ms: Some(now + 3_600_000),
    });
    let processor = new_processor(quiet_config().build(), sender.clone());

    // First flush delivers the server time back to the dispatcher.
    processor.record_identify_event(User::with_key("u0"));
    processor.flush();
    processor.wait_until_inactive();

    // Locally the window looks open, but the server clock is already past it.
    processor.record_eval_event(
        User::default(),
        "F",
        Some(7),
        Some(1),
        json!("x"),
        None,
        json!("d"),
        false,
        Some(now + 60_000),
        None,
    );
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    assert_eq!(payloads.len(), 2);
    assert!(events_of_kind(&payloads[1], "debug").is_empty());

    processor.stop();
}

#[test]
fn alias_event_reports_context_kinds() {
    let sender = CapturingSender::new();
    let processor = new_processor(quiet_config().build(), sender.clone());

    let user = User::with_key("u");
    let previous = UserBuilder::new("anon").anonymous(true).build();
    processor.record_alias_event(&user, &previous);
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    let alias = &events_of_kind(&payloads[0], "alias")[0];
    assert_eq!(alias["key"], json!("u"));
    assert_eq!(alias["contextKind"], json!("user"));
    assert_eq!(alias["previousKey"], json!("anon"));
    assert_eq!(alias["previousContextKind"], json!("anonymousUser"));
    assert!(alias["creationDate"].as_u64().is_some());
    // Alias events carry no user object, so no index either.
    assert!(events_of_kind(&payloads[0], "index").is_empty());

    processor.stop();
}

#[test]
fn summary_counts_match_recorded_evals_exactly() {
    let sender = CapturingSender::new();
    let processor = new_processor(quiet_config().build(), sender.clone());

    let untracked: u64 = 7;
    let tracked: u64 = 4;
    for _ in 0..untracked {
        record_untracked_eval(&processor, User::with_key("u1"));
    }
    for _ in 0..tracked {
        processor.record_eval_event(
            User::with_key("u1"),
            "F",
            Some(7),
            Some(1),
            json!("x"),
            None,
            json!("d"),
            true,
            None,
            None,
        );
    }
    processor.flush();
    processor.wait_until_inactive();

    let payloads = sender.event_payloads();
    let feature_events = events_of_kind(&payloads[0], "feature");
    let summary = &events_of_kind(&payloads[0], "summary")[0];
    let total: u64 = summary["features"]["F"]["counters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["count"].as_u64().unwrap())
        .sum();
    assert_eq!(feature_events.len() as u64, tracked);
    assert_eq!(total, untracked + tracked);

    processor.stop();
}
