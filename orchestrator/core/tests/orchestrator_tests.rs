// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

mod common;

use std::sync::Arc;
use std::time::Duration;

use clyde_core::domain::gateway::{ChatRequest, GatewayError, GatewayResult, ResponseCode};
use clyde_core::domain::gateway_config::RateLimitPolicy;
use clyde_core::domain::normalizer::ResponseNormalizer;
use clyde_core::domain::provider::{AttemptOutcome, GenerationLimits};
use tokio_util::sync::CancellationToken;

use common::{orchestrator, orchestrator_with_images, provider, settings, ScriptedAdapter, StaticImageLoader};

fn request(prompt: &str) -> ChatRequest {
    ChatRequest::new("u1", prompt).with_mode("g4f")
}

#[tokio::test]
async fn test_falls_over_to_third_provider() {
    let a = ScriptedAdapter::new("a", vec![AttemptOutcome::transient("a", "HTTP 502")]);
    let b = ScriptedAdapter::new("b", vec![AttemptOutcome::transient("b", "connection reset")]);
    let c = ScriptedAdapter::new("c", vec![AttemptOutcome::Success("Hello".into())]);

    let orch = orchestrator(
        vec![
            provider("a", &["g4f"], a.clone()),
            provider("b", &["g4f"], b.clone()),
            provider("c", &["g4f"], c.clone()),
        ],
        settings(),
    );

    let reply = orch.handle(request("hi")).await.unwrap();
    assert_eq!(reply.message, "hello");
    assert_eq!(reply.provider, "c");
    assert_eq!(reply.attempts, 3);
    assert_eq!(reply.errors.len(), 2);
    assert!(reply.errors[0].starts_with("TransientProviderError (a)"));

    let result = GatewayResult::from(Ok(reply));
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        serde_json::json!({ "message": "hello", "code": 0 })
    );
}

#[tokio::test]
async fn test_every_provider_failing_exhausts() {
    let a = ScriptedAdapter::new("a", vec![AttemptOutcome::transient("a", "boom")]);
    let b = ScriptedAdapter::new("b", vec![AttemptOutcome::quota_exhausted("b", "quota marker")]);
    let c = ScriptedAdapter::new("c", vec![AttemptOutcome::empty_reply("c")]);

    let orch = orchestrator(
        vec![
            provider("a", &["g4f"], a.clone()),
            provider("b", &["g4f"], b.clone()),
            provider("c", &["g4f"], c.clone()),
        ],
        settings(),
    );

    let err = orch.handle(request("hi")).await.unwrap_err();
    let attempted = a.calls() + b.calls() + c.calls();
    match &err {
        GatewayError::Exhausted { errors } => assert_eq!(errors.len(), attempted),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(attempted, 3);

    let result = GatewayResult::from(Err(err));
    assert_eq!(result.code(), ResponseCode::ProviderFailure);
}

#[tokio::test]
async fn test_rate_limit_aborts_loop() {
    let a = ScriptedAdapter::new("a", vec![AttemptOutcome::rate_limited("a", "HTTP 429")]);
    let b = ScriptedAdapter::new("b", vec![AttemptOutcome::Success("fine".into())]);

    let orch = orchestrator(
        vec![provider("a", &["g4f"], a.clone()), provider("b", &["g4f"], b.clone())],
        settings(),
    );

    let err = orch.handle(request("hi")).await.unwrap_err();
    assert_eq!(b.calls(), 0);
    assert_eq!(err.diagnostics(), vec!["RateLimited (a): HTTP 429".to_string()]);
    assert_eq!(err.code(), ResponseCode::ProviderFailure);
}

#[tokio::test]
async fn test_rate_limit_skips_provider_when_configured() {
    let a = ScriptedAdapter::new("a", vec![AttemptOutcome::rate_limited("a", "HTTP 429")]);
    let b = ScriptedAdapter::new("b", vec![AttemptOutcome::Success("fine".into())]);

    let mut settings = settings();
    settings.rate_limit_policy = RateLimitPolicy::SkipProvider;
    let orch = orchestrator(
        vec![provider("a", &["g4f"], a.clone()), provider("b", &["g4f"], b.clone())],
        settings,
    );

    let reply = orch.handle(request("hi")).await.unwrap();
    assert_eq!(reply.message, "fine");
    assert_eq!(reply.errors, vec!["RateLimited (a): HTTP 429".to_string()]);
}

#[tokio::test]
async fn test_unknown_mode_invokes_nothing() {
    let a = ScriptedAdapter::new("a", vec![AttemptOutcome::Success("x".into())]);
    let orch = orchestrator(vec![provider("a", &["g4f"], a.clone())], settings());

    let err = orch
        .handle(ChatRequest::new("u1", "hi").with_mode("bard"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::UnsupportedMode { ref mode, with_image: false } if mode == "bard"));
    assert_eq!(a.calls(), 0);
    assert!(orch.store().snapshot("u1").await.is_empty());
}

#[tokio::test]
async fn test_image_requires_capable_provider() {
    let text_only = ScriptedAdapter::new("text", vec![AttemptOutcome::Success("x".into())]);
    let vision = ScriptedAdapter::new("vision", vec![AttemptOutcome::Success("a cat".into())]);

    let mut vision_spec = provider("vision", &["gemini"], vision.clone());
    vision_spec.supports_image = true;

    let orch = orchestrator(
        vec![provider("text", &["g4f", "gemini"], text_only.clone()), vision_spec],
        settings(),
    );

    let err = orch
        .handle(request("what is this").with_image("http://img/cat.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnsupportedMode { with_image: true, .. }));

    let reply = orch
        .handle(
            ChatRequest::new("u2", "what is this")
                .with_mode("gemini")
                .with_image("http://img/cat.png"),
        )
        .await
        .unwrap();
    assert_eq!(reply.provider, "vision");
    assert_eq!(text_only.calls(), 0);

    let seen = vision.contexts();
    let image = seen[0].image.as_ref().unwrap();
    assert_eq!(image.source_url, "http://img/cat.png");
}

#[tokio::test]
async fn test_image_load_failure_is_reported() {
    let vision = ScriptedAdapter::new("vision", vec![AttemptOutcome::Success("x".into())]);
    let mut spec = provider("vision", &["gemini"], vision.clone());
    spec.supports_image = true;

    let orch = orchestrator_with_images(vec![spec], settings(), StaticImageLoader::failing());
    let err = orch
        .handle(ChatRequest::new("u1", "look").with_mode("gemini").with_image("http://img/gone.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::ImageUnavailable { .. }));
    assert_eq!(vision.calls(), 0);
}

#[tokio::test]
async fn test_setup_error_surfaces_code_two() {
    let a = ScriptedAdapter::new("Gemini", vec![AttemptOutcome::setup("Gemini", "API key is not configured")]);
    let b = ScriptedAdapter::new("b", vec![AttemptOutcome::Success("x".into())]);

    let orch = orchestrator(
        vec![provider("Gemini", &["g4f"], a.clone()), provider("b", &["g4f"], b.clone())],
        settings(),
    );

    let err = orch.handle(request("hi")).await.unwrap_err();
    assert_eq!(err.code(), ResponseCode::SetupError);
    assert_eq!(err.public_message(), "Gemini hasn't been set up.");
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_other_fatal_failure_stops_loop() {
    let a = ScriptedAdapter::new("a", vec![AttemptOutcome::unsupported("a", "ProviderNotFoundError")]);
    let b = ScriptedAdapter::new("b", vec![AttemptOutcome::Success("x".into())]);

    let orch = orchestrator(
        vec![provider("a", &["g4f"], a.clone()), provider("b", &["g4f"], b.clone())],
        settings(),
    );

    let err = orch.handle(request("hi")).await.unwrap_err();
    match err {
        GatewayError::Fatal { failure, errors } => {
            assert_eq!(failure.provider, "a");
            assert_eq!(errors.len(), 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_reply_blank_after_normalization_moves_on() {
    let a = ScriptedAdapter::new("a", vec![AttemptOutcome::Success("User: hijacked turn".into())]);
    let b = ScriptedAdapter::new("b", vec![AttemptOutcome::Success("Clyde: Sup".into())]);

    let orch = orchestrator(
        vec![provider("a", &["g4f"], a.clone()), provider("b", &["g4f"], b.clone())],
        settings(),
    );

    let reply = orch.handle(request("hi")).await.unwrap();
    assert_eq!(reply.message, "sup");
    assert_eq!(reply.errors.len(), 1);
    assert!(reply.errors[0].starts_with("EmptyReply (a)"));
}

#[tokio::test]
async fn test_attempt_budget_cycles_providers() {
    let a = ScriptedAdapter::new("a", vec![]);
    let b = ScriptedAdapter::new("b", vec![]);

    let mut settings = settings();
    settings.max_attempts = Some(5);
    let orch = orchestrator(
        vec![provider("a", &["g4f"], a.clone()), provider("b", &["g4f"], b.clone())],
        settings,
    );

    let err = orch.handle(request("hi")).await.unwrap_err();
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 2);
    assert_eq!(err.diagnostics().len(), 5);
}

#[tokio::test]
async fn test_slow_provider_times_out_and_falls_over() {
    let slow = ScriptedAdapter::with_delay(
        "slow",
        vec![AttemptOutcome::Success("too late".into())],
        Duration::from_secs(30),
    );
    let fast = ScriptedAdapter::new("fast", vec![AttemptOutcome::Success("quick".into())]);

    let mut settings = settings();
    settings.limits = GenerationLimits {
        max_output_tokens: 256,
        timeout: Duration::from_millis(50),
    };
    let orch = orchestrator(
        vec![provider("slow", &["g4f"], slow.clone()), provider("fast", &["g4f"], fast.clone())],
        settings,
    );

    let reply = tokio::time::timeout(Duration::from_secs(5), orch.handle(request("hi")))
        .await
        .expect("timeout must bound the slow provider")
        .unwrap();
    assert_eq!(reply.message, "quick");
    assert!(reply.errors[0].starts_with("TransientProviderError (slow): no reply within"));
}

#[tokio::test]
async fn test_cancellation_abandons_attempt_without_recording() {
    let slow = ScriptedAdapter::with_delay(
        "slow",
        vec![AttemptOutcome::Success("never".into())],
        Duration::from_secs(30),
    );
    let backup = ScriptedAdapter::new("backup", vec![AttemptOutcome::Success("nope".into())]);
    let orch = orchestrator(
        vec![provider("slow", &["g4f"], slow.clone()), provider("backup", &["g4f"], backup.clone())],
        settings(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        orch.handle_with_cancellation(request("hi"), cancel),
    )
    .await
    .expect("cancellation must end the orchestration")
    .unwrap_err();

    assert_eq!(err, GatewayError::Cancelled);
    assert_eq!(backup.calls(), 0);

    let history = orch.store().snapshot("u1").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].as_str(), "User:\nhi\nAssistant:");
}

#[tokio::test]
async fn test_history_round_trip() {
    let a = ScriptedAdapter::new(
        "a",
        vec![
            AttemptOutcome::Success("Clyde: Hey There".into()),
            AttemptOutcome::Success("doing good".into()),
        ],
    );
    let orch = orchestrator(vec![provider("a", &["g4f"], a.clone())], settings());

    orch.handle(request("hello")).await.unwrap();
    orch.handle(request("how are you")).await.unwrap();

    let entries: Vec<String> = orch
        .store()
        .snapshot("u1")
        .await
        .iter()
        .map(|e| e.as_str().to_string())
        .collect();
    assert_eq!(
        entries,
        vec![
            "User:\nhello\nAssistant:",
            "hey there",
            "User:\nhow are you\nAssistant:",
            "doing good",
        ]
    );

    let second_context = &a.contexts()[1].text;
    assert_eq!(
        second_context,
        "SYS User:\nhello\nAssistant:\nhey there\nUser:\nhow are you\nAssistant:"
    );
}

#[tokio::test]
async fn test_history_disabled_sends_single_turn() {
    let a = ScriptedAdapter::new("a", vec![AttemptOutcome::Success("ok".into())]);
    let mut settings = settings();
    settings.history_enabled = false;
    let orch = orchestrator(vec![provider("a", &["g4f"], a.clone())], settings);

    orch.handle(request("ping")).await.unwrap();

    assert_eq!(a.contexts()[0].text, "SYS \nping");
    assert_eq!(orch.store().user_count(), 0);
}

#[tokio::test]
async fn test_default_mode_applies_when_type_missing() {
    let a = ScriptedAdapter::new("a", vec![AttemptOutcome::Success("ok".into())]);
    let orch = orchestrator(vec![provider("a", &["g4f"], a.clone())], settings());

    let reply = orch.handle(ChatRequest::new("u1", "hi")).await.unwrap();
    assert_eq!(reply.provider, "a");
}

#[tokio::test]
async fn test_last_line_normalization_per_provider() {
    let a = ScriptedAdapter::new(
        "gemini",
        vec![AttemptOutcome::Success("User:\nhi\nAssistant:\nHey  Whats Up".into())],
    );
    let mut spec = provider("gemini", &["g4f"], a.clone());
    spec.normalizer = ResponseNormalizer::last_line();
    let orch = orchestrator(vec![spec], settings());

    let reply = orch.handle(request("hi")).await.unwrap();
    assert_eq!(reply.message, "Hey\nWhats Up");
}

#[tokio::test]
async fn test_same_user_requests_do_not_interleave() {
    let a = ScriptedAdapter::with_delay(
        "a",
        vec![
            AttemptOutcome::Success("first reply".into()),
            AttemptOutcome::Success("second reply".into()),
        ],
        Duration::from_millis(50),
    );
    let orch = Arc::new(orchestrator(vec![provider("a", &["g4f"], a.clone())], settings()));

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.handle(request("one")).await })
    };
    let second = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.handle(request("two")).await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let entries: Vec<String> = orch
        .store()
        .snapshot("u1")
        .await
        .iter()
        .map(|e| e.as_str().to_string())
        .collect();
    assert_eq!(entries.len(), 4);
    assert!(entries[0].starts_with("User:\n"));
    assert_eq!(entries[1], "first reply");
    assert!(entries[2].starts_with("User:\n"));
    assert_eq!(entries[3], "second reply");
}

#[tokio::test]
async fn test_other_users_are_not_blocked() {
    let slow = ScriptedAdapter::with_delay(
        "slow",
        vec![AttemptOutcome::Success("late".into())],
        Duration::from_millis(500),
    );
    let fast = ScriptedAdapter::new("fast", vec![AttemptOutcome::Success("quick".into())]);

    let orch = Arc::new(orchestrator(
        vec![provider("slow", &["slow"], slow.clone()), provider("fast", &["fast"], fast.clone())],
        settings(),
    ));

    let blocked = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.handle(ChatRequest::new("u1", "hi").with_mode("slow")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let reply = tokio::time::timeout(
        Duration::from_millis(200),
        orch.handle(ChatRequest::new("u2", "hi").with_mode("fast")),
    )
    .await
    .expect("u2 must not wait for u1")
    .unwrap();
    assert_eq!(reply.message, "quick");

    blocked.await.unwrap().unwrap();
}
