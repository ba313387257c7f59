use clap::Parser;
use prism_wars_server::constants::{beam_step_budget, player_color, MAX_PLAYERS, MIN_PLAYERS};
use prism_wars_server::engine::{GameEngine, GameEngineOptions};
use prism_wars_server::light::compute_territory;
use prism_wars_server::objectives::ObjectivePolicy;
use prism_wars_server::rng::Rng;
use prism_wars_server::server_utils::{build_engine_options, now_ms};
use prism_wars_server::types::{
    GameOverReason, Inventory, MatchResult, PieceType, StartPlayer,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_MAX_ACTIONS: usize = 2_000;
const SIM_ACTION_MS: u64 = 1_000;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    players: Option<i64>,
    #[arg(long)]
    matches: Option<u32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_actions: Option<usize>,
    #[arg(long)]
    win_points: Option<i64>,
    #[arg(long)]
    rounds: Option<i64>,
    #[arg(long)]
    policy: Option<String>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    players: usize,
    seed: u32,
    #[serde(rename = "maxActions")]
    max_actions: usize,
    #[serde(rename = "winPoints")]
    win_points: Option<i64>,
    rounds: Option<i64>,
    policy: ObjectivePolicy,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    players: usize,
    policy: ObjectivePolicy,
    reason: Option<GameOverReason>,
    result: Option<MatchResult>,
    rounds: u32,
    actions: usize,
    placements: usize,
    pickups: usize,
    passes: usize,
    timeouts: usize,
    rejected: usize,
    disconnected: usize,
    #[serde(rename = "finalScores")]
    final_scores: Vec<i32>,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    action: usize,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageActions")]
    average_actions: usize,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<usize>,
    details: Value,
}

#[derive(Default)]
struct ActionCounters {
    placements: usize,
    pickups: usize,
    passes: usize,
    timeouts: usize,
    rejected: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let run_started_at_ms = now_ms();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, run_started_at_ms));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_actions = 0usize;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "players": scenario.players,
                "maxActions": scenario.max_actions,
                "policy": scenario.policy,
            }),
        );
        let scenario_run = run_scenario(&scenario);

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.action),
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        total_actions += scenario_run.result.actions;
        *reason_counts
            .entry(game_over_reason_key(scenario_run.result.reason))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.result.actions),
            json!({
                "reason": scenario_run.result.reason,
                "rounds": scenario_run.result.rounds,
                "finalScores": scenario_run.result.final_scores,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(error) => emit_log(
                "error",
                "result_serialize_failed",
                &match_id,
                Some(&scenario.name),
                Some(scenario.seed),
                None,
                json!({ "error": error.to_string() }),
            ),
        }
        scenario_results.push(scenario_run.result);
    }

    let run_finished_at_ms = now_ms();
    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        run_finished_at_ms,
        scenario_results,
        reason_counts,
        total_anomalies,
        total_actions,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &match_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageActions": summary.average_actions,
            "reasonCounts": summary.reason_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn make_start_players(count: usize) -> Vec<StartPlayer> {
    (0..count)
        .map(|idx| StartPlayer {
            id: format!("bot_{}", idx + 1),
            name: format!("BOT-{:02}", idx + 1),
            color: player_color(idx).to_string(),
        })
        .collect()
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut counters = ActionCounters::default();

    let options = build_engine_options(
        scenario.rounds,
        scenario.win_points,
        None,
        Some(scenario.policy),
    );
    let match_id = format!("SIM{:03}", scenario.seed % 1_000);
    let mut engine = match GameEngine::start(
        match_id,
        make_start_players(scenario.players),
        scenario.seed,
        options,
        0,
    ) {
        Ok(engine) => engine,
        Err(error) => {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                0,
                format!("match failed to start: {error}"),
            );
            return ScenarioRunResult {
                result: build_result_line(scenario, None, &counters, 0, anomalies),
                anomaly_records,
            };
        }
    };

    for message in collect_engine_anomalies(&engine) {
        push_anomaly(&mut anomalies, &mut anomaly_records, &mut anomaly_seen, 0, message);
    }

    // Bot choices come from a stream separate from the engine's setup seed.
    let mut rng = Rng::new(scenario.seed ^ 0x9e37_79b9);
    let mut clock_ms = 0u64;
    let mut actions = 0usize;

    while !engine.is_finished() {
        if actions >= scenario.max_actions {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                actions,
                "action safety limit exceeded".to_string(),
            );
            break;
        }
        actions += 1;
        clock_ms += SIM_ACTION_MS;

        let inventories_before = collect_inventories(&engine);
        let disconnected_before = engine.disconnected().clone();
        for message in play_random_action(&mut engine, &mut rng, &mut clock_ms, &mut counters) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                actions,
                message,
            );
        }

        let mut messages = collect_engine_anomalies(&engine);
        for (player, (before, after)) in inventories_before
            .iter()
            .zip(collect_inventories(&engine))
            .enumerate()
        {
            let grew = PieceType::ALL
                .iter()
                .any(|piece_type| after.remaining(*piece_type) > before.remaining(*piece_type));
            if grew {
                messages.push(format!("inventory grew for player {player}"));
            }
        }
        if !engine.disconnected().is_superset(&disconnected_before) {
            messages.push("disconnected player became active again".to_string());
        }
        for message in messages {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                actions,
                message,
            );
        }
    }

    ScenarioRunResult {
        result: build_result_line(scenario, Some(&engine), &counters, actions, anomalies),
        anomaly_records,
    }
}

fn play_random_action(
    engine: &mut GameEngine,
    rng: &mut Rng,
    clock_ms: &mut u64,
    counters: &mut ActionCounters,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    let player = engine.current_turn();
    let roll = rng.int(0, 99);

    if roll < 6 {
        *clock_ms = engine.turn_deadline_ms() + 1;
        if engine.tick_timeout_check(*clock_ms).is_none() {
            anomalies.push("expired turn was not timed out".to_string());
        }
        counters.timeouts += 1;
        return anomalies;
    }

    if roll < 16 {
        match engine.pass_turn(player, *clock_ms) {
            Ok(_) => counters.passes += 1,
            Err(error) => anomalies.push(format!("pass rejected for current player: {error}")),
        }
        return anomalies;
    }

    if roll < 22 {
        let owned: Vec<(i32, i32)> = engine
            .board()
            .pieces()
            .filter(|(_, _, piece)| piece.player == player)
            .map(|(x, y, _)| (x, y))
            .collect();
        if !owned.is_empty() {
            let (x, y) = owned[rng.pick_index(owned.len())];
            let before = engine.to_document();
            match engine.pickup_piece(player, x, y) {
                Ok(_) => counters.pickups += 1,
                Err(_) => {
                    counters.rejected += 1;
                    if engine.to_document() != before {
                        anomalies.push("rejected pickup mutated the match".to_string());
                    }
                }
            }
            return anomalies;
        }
    }

    let Some(inventory) = engine.inventory(player) else {
        anomalies.push(format!("current player {player} has no inventory"));
        return anomalies;
    };
    let available: Vec<PieceType> = PieceType::ALL
        .into_iter()
        .filter(|piece_type| inventory.remaining(*piece_type) > 0)
        .collect();
    if available.is_empty() {
        if let Err(error) = engine.pass_turn(player, *clock_ms) {
            anomalies.push(format!("pass rejected for current player: {error}"));
        }
        counters.passes += 1;
        return anomalies;
    }

    let size = engine.config.board_size;
    let piece_type = available[rng.pick_index(available.len())];
    let x = rng.int(0, size - 1);
    let y = rng.int(0, size - 1);
    let rotation = rng.int(0, 3) * 90;
    let before = engine.to_document();
    match engine.place_piece(player, x, y, piece_type, rotation, *clock_ms) {
        Ok(_) => counters.placements += 1,
        Err(_) => {
            counters.rejected += 1;
            if engine.to_document() != before {
                anomalies.push("rejected placement mutated the match".to_string());
            }
        }
    }
    anomalies
}

fn collect_inventories(engine: &GameEngine) -> Vec<Inventory> {
    (0..engine.player_count())
        .filter_map(|player| engine.inventory(player))
        .collect()
}

fn collect_engine_anomalies(engine: &GameEngine) -> Vec<String> {
    let mut anomalies = Vec::new();
    let snapshot = engine.build_snapshot(None);
    let territory = engine.territory();
    let disconnected = engine.disconnected();
    let active_count = engine.player_count() - disconnected.len();
    let size = engine.config.board_size;

    for y in 0..size {
        for x in 0..size {
            let claimants = territory.claimants(x, y);
            if claimants.len() > active_count {
                anomalies.push(format!("cell ({x},{y}) has more claimants than active players"));
            }
            if claimants.iter().any(|player| disconnected.contains(player)) {
                anomalies.push(format!("disconnected player still lights ({x},{y})"));
            }
            if territory.controller(x, y).is_some() != (claimants.len() == 1) {
                anomalies.push(format!("contested cell ({x},{y}) reported as controlled"));
            }
        }
    }

    let recomputed = compute_territory(engine.board(), &snapshot.light_sources, disconnected);
    if &recomputed != territory {
        anomalies.push("territory differs from a fresh trace of the same board".to_string());
    }

    let budget = beam_step_budget(size) as i32;
    for segment in &snapshot.beams {
        let length = (segment.to.x - segment.from.x).abs() + (segment.to.y - segment.from.y).abs();
        if length > budget {
            anomalies.push(format!("beam segment longer than step budget: {length}"));
        }
    }

    for score in engine.scores() {
        if disconnected.contains(&score.player) && (score.total != 0 || score.active) {
            anomalies.push(format!("disconnected player {} still scores", score.player));
        }
    }

    if engine.round() > engine.config.max_rounds + 1 {
        anomalies.push(format!("round {} overran the limit", engine.round()));
    }
    if engine.is_finished() && (engine.result().is_none() || engine.end_reason().is_none()) {
        anomalies.push("finished match has no result".to_string());
    }

    let document = engine.to_document();
    match GameEngine::from_document(document.clone()) {
        Ok(restored) => {
            if restored.scores() != engine.scores() {
                anomalies.push("re-evaluated scores differ from committed scores".to_string());
            }
            if restored.to_document() != document {
                anomalies.push("document round trip changed the match".to_string());
            }
        }
        Err(error) => anomalies.push(format!("document rejected on reload: {error}")),
    }
    anomalies
}

fn build_result_line(
    scenario: &Scenario,
    engine: Option<&GameEngine>,
    counters: &ActionCounters,
    actions: usize,
    anomalies: Vec<String>,
) -> ScenarioResultLine {
    ScenarioResultLine {
        scenario: scenario.name.clone(),
        seed: scenario.seed,
        players: scenario.players,
        policy: scenario.policy,
        reason: engine.and_then(GameEngine::end_reason),
        result: engine.and_then(|engine| engine.result().cloned()),
        rounds: engine.map(GameEngine::round).unwrap_or(0),
        actions,
        placements: counters.placements,
        pickups: counters.pickups,
        passes: counters.passes,
        timeouts: counters.timeouts,
        rejected: counters.rejected,
        disconnected: engine.map(|engine| engine.disconnected().len()).unwrap_or(0),
        final_scores: engine
            .map(|engine| engine.scores().iter().map(|score| score.total).collect())
            .unwrap_or_default(),
        anomalies,
    }
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(now_ms));
    let max_actions = cli.max_actions.unwrap_or(DEFAULT_MAX_ACTIONS).max(1);
    let policy = cli
        .policy
        .as_deref()
        .and_then(ObjectivePolicy::parse)
        .unwrap_or_default();

    if cli.players.is_some() || cli.matches.is_some() {
        let players = clamp_players(cli.players.unwrap_or(2));
        let matches = cli.matches.unwrap_or(1).max(1);
        return (0..matches)
            .map(|idx| Scenario {
                name: format!("custom-p{players}-{}", idx + 1),
                players,
                seed: seed.wrapping_add(idx),
                max_actions,
                win_points: cli.win_points,
                rounds: cli.rounds,
                policy,
            })
            .collect();
    }

    [("duel-p2", 2usize), ("skirmish-p3", 3), ("full-table-p4", 4)]
        .into_iter()
        .enumerate()
        .map(|(idx, (name, players))| Scenario {
            name: name.to_string(),
            players,
            seed: seed.wrapping_add(idx as u32),
            max_actions,
            win_points: cli.win_points,
            rounds: cli.rounds,
            policy,
        })
        .collect()
}

fn clamp_players(value: i64) -> usize {
    value.clamp(MIN_PLAYERS as i64, MAX_PLAYERS as i64) as usize
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    action: usize,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        action,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    scenarios: Vec<ScenarioResultLine>,
    reason_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_actions: usize,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_actions = if scenario_count == 0 {
        0
    } else {
        total_actions / scenario_count
    };
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        scenario_count,
        anomaly_count,
        average_actions,
        reason_counts,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    action: Option<usize>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        action,
        details,
    };
    if let Ok(text) = serde_json::to_string(&log_line) {
        eprintln!("{text}");
    }
}

fn game_over_reason_key(reason: Option<GameOverReason>) -> String {
    match reason {
        Some(GameOverReason::RoundLimit) => "round_limit",
        Some(GameOverReason::PointThreshold) => "point_threshold",
        Some(GameOverReason::Forfeit) => "forfeit",
        None => "unfinished",
    }
    .to_string()
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_scenario(players: usize, seed: u32) -> Scenario {
        Scenario {
            name: "test".to_string(),
            players,
            seed,
            max_actions: DEFAULT_MAX_ACTIONS,
            win_points: None,
            rounds: Some(6),
            policy: ObjectivePolicy::Independent,
        }
    }

    fn make_scenario_result(reason: Option<GameOverReason>, actions: usize) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            players: 2,
            policy: ObjectivePolicy::Independent,
            reason,
            result: None,
            rounds: 3,
            actions,
            placements: 0,
            pickups: 0,
            passes: 0,
            timeouts: 0,
            rejected: 0,
            disconnected: 0,
            final_scores: vec![0, 0],
            anomalies: Vec::new(),
        }
    }

    fn parse_cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("simulate").chain(args.iter().copied()))
            .expect("cli should parse")
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_actions() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![
                make_scenario_result(Some(GameOverReason::RoundLimit), 60),
                make_scenario_result(Some(GameOverReason::Forfeit), 90),
            ],
            BTreeMap::from([
                ("forfeit".to_string(), 1usize),
                ("round_limit".to_string(), 1usize),
            ]),
            1,
            150,
        );
        assert_eq!(summary.average_actions, 75);
        assert_eq!(summary.scenario_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("missing").join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            1,
            2,
            vec![make_scenario_result(Some(GameOverReason::RoundLimit), 10)],
            BTreeMap::from([("round_limit".to_string(), 1usize)]),
            0,
            10,
        );
        let result = write_summary(&target, &summary);
        assert!(result.is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            10,
            "same anomaly".to_string(),
        );
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            11,
            "same anomaly".to_string(),
        );

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, 10);
        assert_eq!(records[1].action, 11);
    }

    #[test]
    fn default_scenarios_cover_every_table_size() {
        let scenarios = resolve_scenarios(&parse_cli(&["--seed", "7"]));
        let sizes: Vec<usize> = scenarios.iter().map(|scenario| scenario.players).collect();
        assert_eq!(sizes, vec![2, 3, 4]);
        assert_eq!(scenarios[2].seed, 9);
    }

    #[test]
    fn custom_scenarios_clamp_players_and_parse_policy() {
        let scenarios = resolve_scenarios(&parse_cli(&[
            "--players", "9", "--matches", "2", "--seed", "1", "--policy", "exclusive",
        ]));
        assert_eq!(scenarios.len(), 2);
        assert!(scenarios.iter().all(|scenario| scenario.players == 4));
        assert!(scenarios
            .iter()
            .all(|scenario| scenario.policy == ObjectivePolicy::Exclusive));
        assert_eq!(scenarios[1].seed, 2);
    }

    #[test]
    fn seeded_scenarios_finish_without_anomalies() {
        for players in 2..=4 {
            let run = run_scenario(&make_scenario(players, 20 + players as u32));
            assert!(
                run.result.anomalies.is_empty(),
                "anomalies: {:?}",
                run.result.anomalies
            );
            assert!(run.result.reason.is_some());
            assert!(run.result.rounds <= 7);
        }
    }

    #[test]
    fn same_seed_replays_identically() {
        let first = run_scenario(&make_scenario(3, 77));
        let second = run_scenario(&make_scenario(3, 77));
        assert_eq!(first.result.final_scores, second.result.final_scores);
        assert_eq!(first.result.actions, second.result.actions);
        assert_eq!(first.result.reason, second.result.reason);
    }

    #[test]
    fn reason_keys_cover_unfinished_runs() {
        assert_eq!(game_over_reason_key(None), "unfinished");
        assert_eq!(
            game_over_reason_key(Some(GameOverReason::PointThreshold)),
            "point_threshold"
        );
    }
}
