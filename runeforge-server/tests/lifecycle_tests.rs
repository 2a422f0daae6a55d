//! Lifecycle integration tests: load, reload, unload and event dispatch
//! against a live host thread and a directory-backed artifact repository.

#[path = "fixtures.rs"]
mod fixtures;

use fixtures::harness;
use runeforge_host::GameEvent;
use runeforge_resolver::ResolutionError;
use runeforge_runtime::ScriptIdentity;
use runeforge_server::{LifecycleError, ScriptState};
use std::time::Duration;

fn join_event(player: &str) -> GameEvent {
    GameEvent::PlayerJoin {
        player: player.to_string(),
    }
}

#[tokio::test]
async fn test_load_activates_script_and_handlers() {
    let h = harness();
    h.publish_artifact("org.example:util:1.0", r#"fn exclaim(s) { s + "!" }"#);
    h.write_script(
        "greeter.rhai",
        r#"
        on_event("player_join", "normal", "welcome");
        broadcast("greeter online");

        fn welcome(event) {
            import "util" as u;
            broadcast(u::exclaim("welcome " + event.player));
        }
        "#,
    );
    h.write_manifest("greeter", &["org.example:util:1.0"]);

    let identity = ScriptIdentity::new("greeter.rhai");
    h.controller.load(&identity).await.unwrap();

    let statuses = h.controller.list().await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].state, ScriptState::Active);
    assert_eq!(statuses[0].dependencies, 1);
    assert_eq!(statuses[0].handlers, 1);
    assert_eq!(h.chat_log().await, ["greeter online"]);

    let invoked = h.controller.fire_event(join_event("alice")).await;
    assert_eq!(invoked, 1);
    assert_eq!(
        h.chat_log().await,
        ["greeter online", "welcome alice!"]
    );

    h.bridge.shutdown();
}

#[tokio::test]
async fn test_unload_is_idempotent_and_releases_handlers() {
    let h = harness();
    let identity = ScriptIdentity::new("greeter.rhai");

    // Unloading a script that was never loaded is a no-op.
    h.controller.unload(&identity).await.unwrap();

    h.write_script(
        "greeter.rhai",
        r#"
        on_event("player_join", "normal", "welcome");

        fn welcome(event) { broadcast("hello"); }
        fn on_unload() { broadcast("bye"); }
        "#,
    );
    h.controller.load(&identity).await.unwrap();
    assert_eq!(h.controller.bus().len(), 1);

    h.controller.unload(&identity).await.unwrap();
    assert_eq!(h.controller.list().await[0].state, ScriptState::Unloaded);
    assert_eq!(h.controller.bus().len(), 0);
    assert_eq!(h.chat_log().await, ["bye"]);

    // Repeatable any number of times.
    h.controller.unload(&identity).await.unwrap();
    h.controller.unload(&identity).await.unwrap();

    assert_eq!(h.controller.fire_event(join_event("alice")).await, 0);
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_double_load_is_already_active() {
    let h = harness();
    h.write_script("solo.rhai", "let x = 1;");

    let identity = ScriptIdentity::new("solo.rhai");
    h.controller.load(&identity).await.unwrap();

    let err = h.controller.load(&identity).await.unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyActive(_)));
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_reload_is_atomic_on_checksum_mismatch() {
    let h = harness();
    h.publish_artifact("org.example:util:1.0", r#"fn greeting() { "hello from v1" }"#);
    h.write_script(
        "greeter.rhai",
        r#"
        on_event("player_join", "normal", "welcome");

        fn welcome(event) {
            import "util" as u;
            broadcast(u::greeting());
        }
        "#,
    );
    h.write_manifest("greeter", &["org.example:util:1.0"]);

    let identity = ScriptIdentity::new("greeter.rhai");
    h.controller.load(&identity).await.unwrap();
    h.controller.fire_event(join_event("alice")).await;
    assert_eq!(h.chat_log().await, ["hello from v1"]);

    // The new version's published checksum is corrupted.
    h.publish_artifact("org.example:util:2.0", r#"fn greeting() { "hello from v2" }"#);
    h.corrupt_checksum("org.example:util:2.0");
    h.write_manifest("greeter", &["org.example:util:2.0"]);

    let err = h.controller.reload(&identity).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Resolution(ResolutionError::ChecksumMismatch { .. })
    ));
    assert!(!err.is_retryable());

    // The old context is untouched: still active, still on v1.
    let statuses = h.controller.list().await;
    assert_eq!(statuses[0].state, ScriptState::Active);
    assert_eq!(statuses[0].handlers, 1);

    h.controller.fire_event(join_event("bob")).await;
    assert_eq!(h.chat_log().await, ["hello from v1", "hello from v1"]);

    h.controller.unload(&identity).await.unwrap();
    assert_eq!(h.controller.list().await[0].state, ScriptState::Unloaded);
    assert_eq!(h.controller.bus().len(), 0);
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_reload_swaps_in_new_behavior() {
    let h = harness();
    h.write_script(
        "echo.rhai",
        r#"
        on_event("chat_message", "normal", "echo");
        fn echo(event) { broadcast("v1: " + event.message); }
        "#,
    );

    let identity = ScriptIdentity::new("echo.rhai");
    h.controller.load(&identity).await.unwrap();

    h.write_script(
        "echo.rhai",
        r#"
        on_event("chat_message", "normal", "echo");
        fn echo(event) { broadcast("v2: " + event.message); }
        "#,
    );
    h.controller.reload(&identity).await.unwrap();

    assert_eq!(h.controller.bus().len(), 1);
    h.controller
        .fire_event(GameEvent::ChatMessage {
            player: "alice".to_string(),
            message: "hi".to_string(),
        })
        .await;
    assert_eq!(h.chat_log().await, ["v2: hi"]);
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_concurrent_loads_yield_one_active_context() {
    let h = harness();
    h.write_script(
        "solo.rhai",
        r#"on_event("player_join", "normal", "noop"); fn noop(event) { }"#,
    );

    let identity = ScriptIdentity::new("solo.rhai");
    let mut attempts = Vec::new();
    for _ in 0..8 {
        let controller = h.controller.clone();
        let identity = identity.clone();
        attempts.push(tokio::spawn(async move { controller.load(&identity).await }));
    }

    let mut succeeded = 0;
    let mut already_active = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(LifecycleError::AlreadyActive(_)) => already_active += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(already_active, 7);
    assert_eq!(h.controller.registry().active_count().await, 1);
    assert_eq!(h.controller.bus().len(), 1);
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_identical_coordinates_stay_isolated() {
    let h = harness();
    // The artifact shadows the base `text` module for scripts that declare
    // it; scripts without it keep the base behavior.
    h.publish_artifact("org.example:text:1.0", r#"fn upper(s) { "shadowed" }"#);

    h.write_script(
        "a.rhai",
        r#"
        on_event("player_join", "normal", "shout");
        fn shout(event) {
            import "text" as t;
            broadcast(t::upper("hi"));
        }
        "#,
    );
    h.write_manifest("a", &["org.example:text:1.0"]);

    h.write_script(
        "b.rhai",
        r#"
        on_event("player_join", "normal", "shout");
        fn shout(event) {
            import "text" as t;
            broadcast(t::upper("hi"));
        }
        "#,
    );

    h.controller.load(&ScriptIdentity::new("a.rhai")).await.unwrap();
    h.controller.load(&ScriptIdentity::new("b.rhai")).await.unwrap();

    let invoked = h.controller.fire_event(join_event("alice")).await;
    assert_eq!(invoked, 2);

    let mut log = h.chat_log().await;
    log.sort();
    assert_eq!(log, ["HI", "shadowed"]);
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_failed_load_rolls_back_and_allows_retry() {
    let h = harness();
    h.write_script("broken.rhai", "fn (");

    let identity = ScriptIdentity::new("broken.rhai");
    assert!(h.controller.load(&identity).await.is_err());

    let statuses = h.controller.list().await;
    assert_eq!(statuses[0].state, ScriptState::Failed);
    assert_eq!(statuses[0].dependencies, 0);
    assert_eq!(h.controller.bus().len(), 0);

    // Failed is terminal only until the next explicit load attempt.
    h.write_script("broken.rhai", "let fixed = true;");
    h.controller.load(&identity).await.unwrap();
    assert_eq!(h.controller.list().await[0].state, ScriptState::Active);
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_load_of_missing_script_is_not_found() {
    let h = harness();
    let err = h
        .controller
        .load(&ScriptIdentity::new("ghost.rhai"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_malformed_manifest_entry_rejected_while_resolving() {
    let h = harness();
    h.write_script("greeter.rhai", "let x = 1;");
    h.write_manifest("greeter", &["not-a-coordinate"]);

    let err = h
        .controller
        .load(&ScriptIdentity::new("greeter.rhai"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Resolution(ResolutionError::MalformedCoordinate(_))
    ));
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_reload_resolves_from_cache_without_repository() {
    let h = harness();
    h.publish_artifact("org.example:util:1.0", "fn id(x) { x }");
    h.write_script("cached.rhai", "let x = 1;");
    h.write_manifest("cached", &["org.example:util:1.0"]);

    let identity = ScriptIdentity::new("cached.rhai");
    h.controller.load(&identity).await.unwrap();

    // The repository disappears; the cache alone must satisfy the reload.
    h.remove_artifact("org.example:util:1.0");
    h.controller.reload(&identity).await.unwrap();
    assert_eq!(h.controller.list().await[0].state, ScriptState::Active);
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_reload_requires_active_script() {
    let h = harness();
    let identity = ScriptIdentity::new("greeter.rhai");

    let err = h.controller.reload(&identity).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(_)));

    h.write_script("greeter.rhai", "let x = 1;");
    h.controller.load(&identity).await.unwrap();
    h.controller.unload(&identity).await.unwrap();

    let err = h.controller.reload(&identity).await.unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_scheduled_task_stops_at_unload() {
    let h = harness();
    h.write_script(
        "pulse.rhai",
        r#"
        schedule_repeating(50, "pulse");
        fn pulse() { broadcast("pulse"); }
        "#,
    );

    let identity = ScriptIdentity::new("pulse.rhai");
    h.controller.load(&identity).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    h.controller.unload(&identity).await.unwrap();

    let pulses = h.chat_log().await.len();
    assert!(pulses >= 1, "expected at least one pulse");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        h.chat_log().await.len(),
        pulses,
        "no pulses may arrive after unload"
    );
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_unload_all_on_shutdown() {
    let h = harness();
    h.write_script(
        "a.rhai",
        r#"on_event("player_join", "normal", "f"); fn f(event) { }"#,
    );
    h.write_script(
        "b.rhai",
        r#"on_event("player_quit", "normal", "f"); fn f(event) { }"#,
    );

    assert_eq!(h.controller.load_all().await.unwrap(), 2);
    assert_eq!(h.controller.registry().active_count().await, 2);

    h.controller.unload_all().await;
    assert_eq!(h.controller.registry().active_count().await, 0);
    assert!(h.controller.bus().is_empty());
    h.bridge.shutdown();
}
