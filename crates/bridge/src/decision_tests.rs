use super::*;

#[test]
fn parses_json_prefixed_line_inline() {
    let reply = "I see a person near the door.\nJSON: {\"risk\":\"medium\",\"type\":\"unknown_person\",\"confidence\":0.8,\"action\":\"notify_and_save_clip\",\"reason\":\"dark figure\"}";
    let (d, text) = parse_decision(reply);
    assert_eq!(d.risk, RiskLevel::Medium);
    assert_eq!(d.decision_type, "unknown_person");
    assert_eq!(d.action, AllowedAction::NotifyAndSaveClip);
    assert_eq!(text, "I see a person near the door.");
}

#[test]
fn parses_json_prefixed_line_on_next_line() {
    let reply = "Scene description.\nJSON:\n{\"risk\":\"high\",\"type\":\"other\",\"confidence\":0.9,\"action\":\"notify_and_light\",\"reason\":\"climbing fence\"}";
    let (d, text) = parse_decision(reply);
    assert_eq!(d.risk, RiskLevel::High);
    assert_eq!(d.action, AllowedAction::NotifyAndLight);
    assert_eq!(text, "Scene description.");
}

#[test]
fn parses_fenced_json_block() {
    let reply = "Here is my answer:\n```json\n{\"risk\":\"low\",\"type\":\"delivery\",\"confidence\":0.6,\"action\":\"notify_only\",\"reason\":\"package\"}\n```";
    let (d, text) = parse_decision(reply);
    assert_eq!(d.risk, RiskLevel::Low);
    assert_eq!(d.decision_type, "delivery");
    assert_eq!(text, "Here is my answer:");
}

#[test]
fn parses_standalone_brace_line() {
    let reply = "description text\n{\"risk\":\"critical\",\"type\":\"other\",\"confidence\":0.95,\"action\":\"notify_and_alarm\",\"reason\":\"forcing door\"}\nmore text";
    let (d, text) = parse_decision(reply);
    assert_eq!(d.risk, RiskLevel::Critical);
    assert_eq!(text, "description text\nmore text");
}

#[test]
fn parses_via_regex_fallback_embedded_in_prose() {
    let reply = "The model said the following internally {\"risk\":\"medium\",\"type\":\"loitering\",\"confidence\":0.5,\"action\":\"notify_and_save_clip\",\"reason\":\"lingering\"} before continuing.";
    let (d, _text) = parse_decision(reply);
    assert_eq!(d.risk, RiskLevel::Medium);
    assert_eq!(d.decision_type, "loitering");
}

#[test]
fn flattens_structured_shape() {
    let reply = "JSON:{\"risk\":{\"level\":\"high\",\"confidence\":0.85,\"reason\":\"suspicious\"},\"type\":\"unknown_person\",\"behavior\":\"lurking\",\"action\":\"notify_and_light\"}";
    let (d, _text) = parse_decision(reply);
    assert_eq!(d.risk, RiskLevel::High);
    assert_eq!(d.reason, "suspicious");
    assert_eq!(d.behavior.as_deref(), Some("lurking"));
}

#[test]
fn heuristic_extracts_risk_from_threat_line() {
    let reply = "Scene looks calm. THREAT: HIGH due to unfamiliar person at night.";
    let (d, _text) = parse_decision(reply);
    assert_eq!(d.risk, RiskLevel::High);
    assert_eq!(d.action, AllowedAction::NotifyAndLight);
}

#[test]
fn heuristic_classifies_delivery() {
    let reply = "A person carrying a package approaches the door, no threat indicated.";
    let (d, _text) = parse_decision(reply);
    assert_eq!(d.decision_type, "delivery");
}

#[test]
fn unparseable_reply_falls_back_to_low_notify_only() {
    let (d, _text) = parse_decision("");
    assert_eq!(d.risk, RiskLevel::Low);
    assert_eq!(d.action, AllowedAction::NotifyOnly);
}

#[test]
fn confidence_percent_is_normalized() {
    let reply = "JSON:{\"risk\":\"medium\",\"type\":\"other\",\"confidence\":85,\"action\":\"notify_and_save_clip\",\"reason\":\"x\"}";
    let (d, _text) = parse_decision(reply);
    assert!((d.confidence - 0.85).abs() < 1e-9);
}

#[test]
fn low_risk_forces_notify_only_even_if_action_said_otherwise() {
    let reply = "JSON:{\"risk\":\"low\",\"type\":\"other\",\"confidence\":0.5,\"action\":\"notify_and_alarm\",\"reason\":\"x\"}";
    let (d, _text) = parse_decision(reply);
    assert_eq!(d.action, AllowedAction::NotifyOnly);
}

#[test]
fn sanitizer_is_idempotent() {
    let (mut d, _text) = parse_decision("JSON:{\"risk\":\"high\",\"type\":\"other\",\"confidence\":150,\"action\":\"bogus_action\",\"reason\":\"x\"}");
    let once = d.clone();
    d.sanitize();
    assert_eq!(once.confidence, d.confidence);
    assert_eq!(once.action, d.action);
}

#[test]
fn clean_text_strips_media_lines() {
    let reply = "A person walks up the driveway.\nMEDIA:ai-snapshots/E1.jpg\nJSON:{\"risk\":\"low\",\"type\":\"other\",\"confidence\":0.4,\"action\":\"notify_only\",\"reason\":\"x\"}";
    let (_d, text) = parse_decision(reply);
    assert_eq!(text, "A person walks up the driveway.");
}

proptest::proptest! {
    #[test]
    fn confidence_always_in_unit_range(raw in -1000.0f64..1000.0f64) {
        let sanitized = crate::types::sanitize_confidence(raw);
        proptest::prop_assert!((0.0..=1.0).contains(&sanitized));
    }

    #[test]
    fn sanitize_is_idempotent_for_arbitrary_confidence(raw in -1000.0f64..1000.0f64) {
        let mut d = AiDecision::unavailable();
        d.confidence = raw;
        d.sanitize();
        let once = d.confidence;
        d.sanitize();
        proptest::prop_assert_eq!(once, d.confidence);
    }
}
