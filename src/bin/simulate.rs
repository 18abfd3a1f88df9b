use chrono::{SecondsFormat, Utc};
use clap::Parser;
use ghost_maze_server::constants::{CELL_SIZE, TICK_MS};
use ghost_maze_server::engine::{GameEngine, GameEngineOptions};
use ghost_maze_server::maze::Maze;
use ghost_maze_server::rng::Rng;
use ghost_maze_server::types::{Direction, GameOverReason, RuntimeEvent, Snapshot};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    seconds: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    seconds: u64,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    seconds: u64,
    reason: GameOverReason,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    ticks: u64,
    score: i32,
    #[serde(rename = "livesLeft")]
    lives_left: i32,
    #[serde(rename = "dotsEaten")]
    dots_eaten: i32,
    #[serde(rename = "ghostsEaten")]
    ghosts_eaten: i32,
    releases: i32,
    catches: i32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
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
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "reasonCounts")]
    reason_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    timestamp: String,
    level: String,
    event: String,
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

fn main() {
    let cli = Cli::parse();
    let scenarios = resolve_scenarios(&cli);
    let started_at = timestamp();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(seed_hint, now_ms()));

    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut reason_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration_ms = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({ "seconds": scenario.seconds }),
        );
        let scenario_run = run_scenario(&scenario);

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &run_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.tick),
                json!({ "message": anomaly.message }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        total_duration_ms += scenario_run.result.duration_ms;
        *reason_counts
            .entry(game_over_reason_key(scenario_run.result.reason))
            .or_insert(0) += 1;

        emit_log(
            "info",
            "scenario_finished",
            &run_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.result.ticks),
            json!({
                "reason": scenario_run.result.reason,
                "durationMs": scenario_run.result.duration_ms,
                "score": scenario_run.result.score,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        println!(
            "{}",
            serde_json::to_string(&scenario_run.result).expect("scenario result should serialize")
        );
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        run_id.clone(),
        started_at,
        timestamp(),
        scenario_results,
        reason_counts,
        total_anomalies,
        total_duration_ms,
    );

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &run_id,
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
    }

    emit_log(
        "info",
        "run_finished",
        &run_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageDurationMs": summary.average_duration_ms,
            "reasonCounts": summary.reason_counts,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn run_scenario(scenario: &Scenario) -> ScenarioRunResult {
    let mut engine = GameEngine::new(
        Maze::default_level(),
        scenario.seed,
        GameEngineOptions {
            time_limit_ms: Some(scenario.seconds * 1_000),
            debug_paths: true,
        },
    );

    // Drunken-walk input driver so pickups, power windows and collisions
    // all get exercised; separate stream from the engine's own rng.
    let mut input_rng = Rng::new(scenario.seed.wrapping_mul(31).wrapping_add(7));
    let mut think_at = 0u64;

    let mut releases = 0;
    let mut catches = 0;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut tick_safety = 0usize;

    while !engine.is_ended() {
        let snapshot_now = engine.build_snapshot(false).now_ms;
        if snapshot_now >= think_at {
            think_at = snapshot_now + 200 + input_rng.int(0, 400) as u64;
            engine.set_desired_dir(random_direction(&mut input_rng));
        }

        engine.step(TICK_MS);
        let snapshot = engine.build_snapshot(true);

        for message in collect_snapshot_anomalies(&engine, &snapshot) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }

        let mut releases_this_tick = 0;
        for event in &snapshot.events {
            match event {
                RuntimeEvent::GhostReleased { .. } => {
                    releases += 1;
                    releases_this_tick += 1;
                }
                RuntimeEvent::PlayerCaught { .. } => catches += 1,
                _ => {}
            }
        }
        if releases_this_tick > 1 {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                format!("{releases_this_tick} releases in one tick"),
            );
        }

        tick_safety += 1;
        if tick_safety > 20 * 60 * 60 {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "tick safety limit exceeded".to_string(),
            );
            break;
        }
    }

    let summary = engine.build_summary();
    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            seconds: scenario.seconds,
            reason: summary.reason,
            duration_ms: summary.duration_ms,
            ticks: summary.ticks,
            score: summary.score,
            lives_left: summary.lives_left,
            dots_eaten: summary.dots_eaten,
            ghosts_eaten: summary.ghosts_eaten,
            releases,
            catches,
            anomalies,
        },
        anomaly_records,
    }
}

fn collect_snapshot_anomalies(engine: &GameEngine, snapshot: &Snapshot) -> Vec<String> {
    let mut anomalies = Vec::new();
    let extent = CELL_SIZE as f32;

    if snapshot.lives < 0 {
        anomalies.push(format!("negative lives: {}", snapshot.lives));
    }
    if snapshot.score < 0 {
        anomalies.push(format!("negative score: {}", snapshot.score));
    }
    if !engine.maze.is_walkable(snapshot.player.x, snapshot.player.y) {
        anomalies.push(format!(
            "player inside a wall at ({}, {})",
            snapshot.player.x, snapshot.player.y
        ));
    }

    for ghost in &snapshot.ghosts {
        if ghost.delta_x.abs() >= extent || ghost.delta_y.abs() >= extent {
            anomalies.push(format!(
                "ghost displacement overflow: {} ({}, {})",
                ghost.id, ghost.delta_x, ghost.delta_y
            ));
        }
        if ghost.trapped && ghost.fearful {
            anomalies.push(format!("trapped ghost is fearful: {}", ghost.id));
        }
        if ghost.trapped && ghost.path.is_some() {
            anomalies.push(format!("trapped ghost holds a path: {}", ghost.id));
        }
    }

    anomalies
}

fn random_direction(rng: &mut Rng) -> Direction {
    match rng.int(0, 3) {
        0 => Direction::Up,
        1 => Direction::Down,
        2 => Direction::Left,
        _ => Direction::Right,
    }
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(now_ms));

    if cli.single || cli.seconds.is_some() {
        let seconds = cli.seconds.unwrap_or(120).clamp(10, 3_600);
        return vec![Scenario {
            name: format!("custom-{seconds}s"),
            seconds,
            seed,
        }];
    }

    vec![
        Scenario {
            name: "quick-check".to_string(),
            seconds: 120,
            seed,
        },
        Scenario {
            name: "soak-check".to_string(),
            seconds: 300,
            seed: normalize_seed(seed as u64 + 1),
        },
    ]
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_run_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    run_id: String,
    started_at: String,
    finished_at: String,
    scenarios: Vec<ScenarioResultLine>,
    reason_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_duration_ms: u64,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_duration_ms = if scenario_count == 0 {
        0
    } else {
        total_duration_ms / scenario_count as u64
    };
    RunSummary {
        run_id,
        started_at,
        finished_at,
        scenario_count,
        anomaly_count,
        average_duration_ms,
        reason_counts,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    run_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp: timestamp(),
        level: level.to_string(),
        event: event.to_string(),
        run_id: run_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        tick,
        details,
    };
    eprintln!(
        "{}",
        serde_json::to_string(&log_line).expect("structured log should serialize")
    );
}

fn game_over_reason_key(reason: GameOverReason) -> String {
    match reason {
        GameOverReason::Cleared => "cleared",
        GameOverReason::OutOfLives => "out_of_lives",
        GameOverReason::Timeout => "timeout",
    }
    .to_string()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).expect("run summary should serialize");
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_scenario_result(reason: GameOverReason, duration_ms: u64) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            seconds: 120,
            reason,
            duration_ms,
            ticks: duration_ms / TICK_MS,
            score: 0,
            lives_left: 3,
            dots_eaten: 0,
            ghosts_eaten: 0,
            releases: 0,
            catches: 0,
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn default_run_id_contains_seed_and_timestamp() {
        assert_eq!(default_run_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_duration() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            "start".to_string(),
            "finish".to_string(),
            vec![
                make_scenario_result(GameOverReason::Timeout, 60_000),
                make_scenario_result(GameOverReason::Cleared, 90_000),
            ],
            BTreeMap::from([
                ("timeout".to_string(), 1usize),
                ("cleared".to_string(), 1usize),
            ]),
            1,
            150_000,
        );
        assert_eq!(summary.average_duration_ms, 75_000);
        assert_eq!(summary.scenario_count, 2);
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
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("ghost-maze-missing-{}", now_ms()))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            "start".to_string(),
            "finish".to_string(),
            vec![make_scenario_result(GameOverReason::Timeout, 60_000)],
            BTreeMap::from([("timeout".to_string(), 1usize)]),
            0,
            60_000,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn short_scenario_runs_clean_and_terminates() {
        let scenario = Scenario {
            name: "unit".to_string(),
            seconds: 20,
            seed: 4242,
        };
        let run = run_scenario(&scenario);
        assert!(run.result.anomalies.is_empty(), "{:?}", run.result.anomalies);
        assert!(run.result.duration_ms <= 21_000);
    }
}
