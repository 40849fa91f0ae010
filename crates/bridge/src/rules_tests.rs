use super::*;
use crate::types::RiskLevel;

fn base_decision() -> AiDecision {
    AiDecision {
        risk: RiskLevel::Low,
        decision_type: "person".to_string(),
        confidence: 0.7,
        action: AllowedAction::NotifyOnly,
        reason: "x".to_string(),
        behavior: None,
        subject: None,
    }
}

fn base_policy() -> PolicyContext {
    PolicyContext {
        time_of_day: TimeOfDay::Day,
        home_mode: "home".to_string(),
        known_faces_present: false,
        camera_context: "no notes".to_string(),
        camera_zone: "backyard".to_string(),
        recent_events_count: 0,
        recent_events_last_ts: None,
        history_summary: "- none in last 30 minutes".to_string(),
    }
}

#[test]
fn delivery_package_daytime_home_scores_low() {
    let mut decision = base_decision();
    decision.decision_type = "delivery".to_string();
    let policy = base_policy();
    assert_eq!(risk_for_score(score(&decision, &policy)), RiskLevel::Low);
}

#[test]
fn away_mode_night_looking_around_scores_critical() {
    let mut decision = base_decision();
    decision.decision_type = "unknown_person".to_string();
    decision.behavior = Some("looking around".to_string());
    let mut policy = base_policy();
    policy.time_of_day = TimeOfDay::Night;
    policy.home_mode = "away".to_string();
    policy.camera_zone = "terrace".to_string();
    // unknown_person(+2) + night(+2) + zone(+1) + away(+3) + weak behavior(+2) = 10 -> critical
    assert_eq!(risk_for_score(score(&decision, &policy)), RiskLevel::Critical);
}

#[test]
fn known_face_subtracts_three_once() {
    let mut decision = base_decision();
    decision.decision_type = "known_person".to_string();
    let mut policy = base_policy();
    policy.known_faces_present = true;
    // known_faces_present and type containing "known" share one -3 rule, not two.
    assert_eq!(score(&decision, &policy), -3);
}

#[test]
fn score_buckets_match_thresholds() {
    assert_eq!(risk_for_score(2), RiskLevel::Low);
    assert_eq!(risk_for_score(3), RiskLevel::Medium);
    assert_eq!(risk_for_score(4), RiskLevel::Medium);
    assert_eq!(risk_for_score(5), RiskLevel::High);
    assert_eq!(risk_for_score(6), RiskLevel::High);
    assert_eq!(risk_for_score(7), RiskLevel::Critical);
}

#[test]
fn apply_overrides_vlm_risk_and_remaps_action() {
    let mut decision = base_decision();
    decision.risk = RiskLevel::Low;
    decision.action = AllowedAction::NotifyOnly;
    decision.decision_type = "unknown_person".to_string();
    decision.behavior = Some("climbing the fence".to_string());
    let mut policy = base_policy();
    policy.time_of_day = TimeOfDay::Night;
    policy.home_mode = "away".to_string();

    apply(&mut decision, &policy);
    assert_eq!(decision.risk, RiskLevel::Critical);
    assert_eq!(decision.action, AllowedAction::NotifyAndAlarm);
}

#[test]
fn apply_is_noop_when_verdict_matches_vlm_risk() {
    let mut decision = base_decision();
    decision.risk = RiskLevel::Low;
    decision.action = AllowedAction::NotifyOnly;
    let policy = base_policy();
    apply(&mut decision, &policy);
    assert_eq!(decision.risk, RiskLevel::Low);
    assert_eq!(decision.action, AllowedAction::NotifyOnly);
}

#[test]
fn recent_events_add_one() {
    let decision = base_decision();
    let mut policy = base_policy();
    policy.recent_events_count = 3;
    assert_eq!(score(&decision, &policy), 1);
}
