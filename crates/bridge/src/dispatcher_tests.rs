use super::*;
use crate::types::TimeOfDay;

fn policy() -> PolicyContext {
    PolicyContext {
        time_of_day: TimeOfDay::Day,
        home_mode: "home".to_string(),
        known_faces_present: false,
        camera_context: "front porch".to_string(),
        camera_zone: "entry".to_string(),
        recent_events_count: 0,
        recent_events_last_ts: None,
        history_summary: "- none in last 30 minutes".to_string(),
    }
}

fn event() -> IncomingEvent {
    IncomingEvent { event_type: "new".to_string(), camera: "GarageCam".to_string(), label: "person".to_string(), event_id: "E1".to_string() }
}

#[test]
fn known_face_excluded_decision_matches_spec_shape() {
    let decision = known_face_excluded_decision();
    assert_eq!(decision.risk, RiskLevel::Low);
    assert_eq!(decision.decision_type, "known_person");
    assert_eq!(decision.action, AllowedAction::NotifyOnly);
}

#[test]
fn payload_media_decisions_scale_with_risk() {
    let mut decision = AiDecision {
        risk: RiskLevel::Critical,
        decision_type: "unknown_person".to_string(),
        confidence: 0.9,
        action: AllowedAction::NotifyAndAlarm,
        reason: "x".to_string(),
        behavior: None,
        subject: None,
    };
    let payload = build_payload(&event(), &decision, &policy(), "ai-snapshots/E1.jpg", Some("clips/E1.mp4"), "");
    assert_eq!(payload["media_clip_length"], 60);
    assert_eq!(payload["media_monitoring"], true);

    decision.risk = RiskLevel::Low;
    let payload = build_payload(&event(), &decision, &policy(), "ai-snapshots/E1.jpg", None, "");
    assert_eq!(payload["media_clip_length"], 0);
    assert_eq!(payload["media_monitoring"], false);
    assert_eq!(payload["media_clip"], false);
}

#[test]
fn payload_contains_expected_keys() {
    let decision = AiDecision {
        risk: RiskLevel::Medium,
        decision_type: "unknown_person".to_string(),
        confidence: 0.7,
        action: AllowedAction::NotifyAndSaveClip,
        reason: "x".to_string(),
        behavior: Some("reaching".to_string()),
        subject: None,
    };
    let payload = build_payload(&event(), &decision, &policy(), "ai-snapshots/E1.jpg", None, "note");
    for key in [
        "camera", "label", "analysis", "risk", "type", "confidence", "action", "reason", "behavior", "subject_identity",
        "subject_description", "camera_zone", "home_mode", "time_of_day", "media_snapshot", "media_clip",
        "media_clip_length", "media_monitoring", "tts", "timestamp", "event_id", "snapshot_path", "clip_url",
    ] {
        assert!(payload.get(key).is_some(), "missing key {key}");
    }
}

#[test]
fn tts_includes_risk_and_reason() {
    let decision = AiDecision {
        risk: RiskLevel::High,
        decision_type: "other".to_string(),
        confidence: 0.5,
        action: AllowedAction::NotifyAndLight,
        reason: "climbing fence".to_string(),
        behavior: None,
        subject: None,
    };
    let tts = tts_for(&decision);
    assert!(tts.contains("high"));
    assert!(tts.contains("climbing fence"));
}
