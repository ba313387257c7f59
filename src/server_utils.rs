use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{MATCH_CODE_LEN, MAX_NAME_LEN, MAX_PLAYERS, MIN_PLAYERS};
use crate::engine::GameEngineOptions;
use crate::objectives::ObjectivePolicy;

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

pub fn normalize_match_id(raw: &str) -> Option<String> {
    let normalized = raw.trim().to_ascii_uppercase();
    let valid = normalized.len() == MATCH_CODE_LEN
        && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
    valid.then_some(normalized)
}

pub fn normalize_player_count(value: Option<i64>) -> usize {
    value
        .unwrap_or(MAX_PLAYERS as i64)
        .clamp(MIN_PLAYERS as i64, MAX_PLAYERS as i64) as usize
}

pub fn normalize_max_rounds(value: Option<i64>) -> Option<u32> {
    value.map(|rounds| rounds.clamp(1, 100) as u32)
}

pub fn normalize_win_points(value: Option<i64>) -> Option<i32> {
    value.map(|points| points.clamp(1, 1_000) as i32)
}

pub fn normalize_turn_duration_ms(value: Option<i64>) -> Option<u64> {
    value.map(|seconds| seconds.clamp(5, 600) as u64 * 1_000)
}

pub fn build_engine_options(
    max_rounds: Option<i64>,
    win_points: Option<i64>,
    turn_seconds: Option<i64>,
    policy: Option<ObjectivePolicy>,
) -> GameEngineOptions {
    GameEngineOptions {
        max_rounds_override: normalize_max_rounds(max_rounds),
        win_points_override: normalize_win_points(win_points),
        turn_duration_ms_override: normalize_turn_duration_ms(turn_seconds),
        objective_policy: policy.unwrap_or_default(),
    }
}
