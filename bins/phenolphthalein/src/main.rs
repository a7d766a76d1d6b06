use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use phenolphthalein_config::RunConfig;
use phenolphthalein_engine::{RunOutcome, Runner};
use tracing::info;
use tracing_subscriber::EnvFilter;

const FLAGS: &[&str] = &[
    "iterations",
    "period",
    "sync",
    "permute",
    "check",
    "output-type",
];

fn parse_args(args: &[String]) -> anyhow::Result<(String, Option<String>, HashMap<String, String>)> {
    let mut test_name = "sb".to_string();
    let mut config_path = None;
    let mut overrides = HashMap::new();

    for arg in args {
        let Some(rest) = arg.strip_prefix("--") else {
            anyhow::bail!("unrecognised argument '{arg}', expected --flag=value");
        };
        let Some((flag, value)) = rest.split_once('=') else {
            anyhow::bail!("malformed flag '{arg}', expected --flag=value");
        };
        match flag {
            "test" => test_name = value.to_string(),
            "config" => config_path = Some(value.to_string()),
            _ if FLAGS.contains(&flag) => {
                overrides.insert(flag.to_string(), value.to_string());
            }
            other => anyhow::bail!("unrecognised flag '--{other}'"),
        }
    }

    Ok((test_name, config_path, overrides))
}

/// Renders a state as `x=1, y=0, 0:r0=1`, the manifest's cell names in
/// declaration order, rather than `State`'s bare `Debug` output.
fn named_state(report: &phenolphthalein_engine::RunReport, state: &phenolphthalein_core::State) -> String {
    report
        .manifest
        .named_values(state)
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_histogram(report: &phenolphthalein_engine::RunReport) {
    println!("{:>10}  {:<10}  state", "count", "outcome");
    for (state, (count, outcome)) in &report.histogram {
        println!("{count:>10}  {:<10}  {}", outcome.as_str(), named_state(report, state));
    }
    println!("total: {}", report.total);
    if let RunOutcome::PolicyStop { triggering_state } = &report.outcome {
        println!("policy stop triggered by: {}", named_state(report, triggering_state));
    }
}

fn render_json(report: &phenolphthalein_engine::RunReport) {
    let named_state_object = |state: &phenolphthalein_core::State| -> serde_json::Value {
        report
            .manifest
            .named_values(state)
            .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
            .collect::<serde_json::Map<_, _>>()
            .into()
    };

    let entries: Vec<serde_json::Value> = report
        .histogram
        .iter()
        .map(|(state, (count, outcome))| {
            serde_json::json!({
                "state": named_state_object(state),
                "count": count,
                "outcome": outcome.as_str(),
            })
        })
        .collect();

    let fatal_state = match &report.outcome {
        RunOutcome::PolicyStop { triggering_state } => named_state_object(triggering_state),
        _ => serde_json::Value::Null,
    };

    let output = serde_json::json!({
        "entries": entries,
        "total": report.total,
        "fatal_state": fatal_state,
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap());
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (test_name, config_path, overrides) = parse_args(&args)?;

    let mut config = match config_path {
        Some(path) => RunConfig::load(&path)?,
        None => RunConfig::default(),
    };
    for (flag, value) in &overrides {
        config.apply_override(flag, value)?;
    }

    let module = litmus_tests_demo::by_name(&test_name).ok_or_else(|| {
        anyhow::anyhow!(
            "unrecognised --test={test_name}, expected one of {:?}",
            litmus_tests_demo::NAMES
        )
    })?;

    info!(
        test = test_name,
        iterations = config.iterations,
        period = config.period,
        sync = ?config.sync,
        permute = ?config.permute,
        check = ?config.check,
        "starting run"
    );

    let runner = Runner::new(
        module,
        config.sync,
        config.permute,
        config.check,
        config.iterations,
        config.period,
    )?;

    let cancellation = runner.cancellation_handle();
    ctrlc::set_handler(move || {
        cancellation.store(true, Ordering::Relaxed);
    })?;

    let report = runner.run()?;

    match config.output {
        phenolphthalein_config::OutputKind::Histogram => render_histogram(&report),
        phenolphthalein_config::OutputKind::Json => render_json(&report),
    }

    Ok(ExitCode::SUCCESS)
}
