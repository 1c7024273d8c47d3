//! hta-runner: headless caller of the HTA engine.
//!
//! Usage:
//!   hta-runner --request dossier.json [--db audit.db] [--config engine.json] [--rules-dir dir] [--seed 42]
//!   hta-runner --ipc-mode [--db audit.db] [--config engine.json] [--rules-dir dir]

mod store;

use anyhow::{Context, Result};
use hta_core::{
    config::EngineConfig,
    engine::{DossierAssessment, DossierRequest, Engine, SensitivityRequest},
    error::{EngineError, EngineResult},
    parameters::{ComparatorArms, RawParameterSet},
    registry::RuleRegistry,
    snapshot::DossierSnapshot,
    types::FrameworkId,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use store::AuditStore;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    ValidateParameters {
        parameters: RawParameterSet,
    },
    ComputeEconomics {
        parameters: RawParameterSet,
        arms:       ComparatorArms,
    },
    RunSensitivity {
        parameters: RawParameterSet,
        arms:       ComparatorArms,
        request:    SensitivityRequest,
    },
    EvaluateCompliance {
        snapshot:     DossierSnapshot,
        framework_id: FrameworkId,
        #[serde(default)]
        version:      Option<String>,
    },
    AssessDossier {
        request: DossierRequest,
    },
    ListFrameworks,
    SubmissionTimeline {
        framework_id: FrameworkId,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let request_path = arg_value(&args, "--request");
    let db = arg_value(&args, "--db");
    let config_path = arg_value(&args, "--config");
    let rules_dir = arg_value(&args, "--rules-dir");
    let seed: Option<u64> = arg_value(&args, "--seed").and_then(|s| s.parse().ok());

    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let registry: &'static RuleRegistry = match rules_dir {
        // Lives for the whole process, like the builtin registry.
        Some(dir) => Box::leak(Box::new(RuleRegistry::builtin_with_dir(Path::new(dir))?)),
        None => RuleRegistry::builtin()?,
    };
    let engine = Engine::new(config, registry)?;

    let store = match db {
        Some(path) => {
            let store = AuditStore::open(path)?;
            store.migrate()?;
            Some(store)
        }
        None => None,
    };

    if ipc_mode {
        return run_ipc_loop(&engine, store.as_ref());
    }

    let Some(request_path) = request_path else {
        anyhow::bail!("either --request <file> or --ipc-mode is required");
    };
    println!("HTA engine: hta-runner");
    println!("  request:    {request_path}");
    println!("  db:         {}", db.unwrap_or("(none)"));
    println!("  config:     {}", config_path.unwrap_or("(defaults)"));
    println!("  frameworks: {}", engine.list_frameworks().len());
    println!();

    let content = std::fs::read_to_string(request_path)
        .with_context(|| format!("Cannot read {request_path}"))?;
    let mut request: DossierRequest = serde_json::from_str(&content)
        .with_context(|| format!("Cannot parse {request_path}"))?;
    if let (Some(seed), Some(p)) = (seed, request.probabilistic.as_mut()) {
        p.seed = seed;
    }

    let assessment = engine.assess_dossier(&request)?;
    print_summary(&assessment);

    if let Some(store) = &store {
        let id = store.record(&assessment)?;
        let history = store.history(&assessment.dossier_id)?;
        println!();
        println!("  recorded as {id} ({} assessments in ledger)", store.count()?);
        // The row just written is last; the one before it is the prior run.
        if let Some(prev) = history.iter().rev().nth(1) {
            println!(
                "  previous:   {} {} {} score {:.1} at {}",
                prev.framework_id,
                prev.rule_set_version,
                prev.overall_status,
                prev.compliance_score,
                prev.recorded_at
            );
        }
    }
    Ok(())
}

fn run_ipc_loop(engine: &Engine, store: Option<&AuditStore>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string(), "kind": "malformed_command" });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let reply = match handle_command(engine, store, cmd) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("command failed: {e}");
                serde_json::json!({ "error": e.to_string(), "kind": e.kind() })
            }
        };
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(
    engine: &Engine,
    store: Option<&AuditStore>,
    cmd: IpcCommand,
) -> EngineResult<serde_json::Value> {
    let value = match cmd {
        IpcCommand::ValidateParameters { parameters } => {
            let set = engine.validate_parameters(&parameters)?;
            serde_json::to_value(&set)?
        }
        IpcCommand::ComputeEconomics { parameters, arms } => {
            let set = engine.validate_parameters(&parameters)?;
            serde_json::to_value(engine.compute_economics(&set, &arms)?)?
        }
        IpcCommand::RunSensitivity { parameters, arms, request } => {
            let set = engine.validate_parameters(&parameters)?;
            serde_json::to_value(engine.run_sensitivity(&set, &arms, &request)?)?
        }
        IpcCommand::EvaluateCompliance { snapshot, framework_id, version } => {
            let report = engine.evaluate_compliance_pinned(&snapshot, &framework_id, version.as_deref())?;
            serde_json::to_value(report)?
        }
        IpcCommand::AssessDossier { request } => {
            let assessment = engine.assess_dossier(&request)?;
            let assessment_id = match store {
                Some(store) => Some(store.record(&assessment).map_err(EngineError::Other)?),
                None => None,
            };
            serde_json::json!({ "assessment_id": assessment_id, "assessment": assessment })
        }
        IpcCommand::ListFrameworks => serde_json::to_value(engine.list_frameworks())?,
        IpcCommand::SubmissionTimeline { framework_id } => {
            serde_json::to_value(engine.submission_timeline(&framework_id)?)?
        }
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(value)
}

fn print_summary(a: &DossierAssessment) {
    let e = &a.economics;
    println!("=== ECONOMICS ({} {}) ===", a.parameters.model_type.name(), e.currency);
    println!("  dossier:            {}", a.dossier_id);
    println!("  horizon:            {} years", a.parameters.time_horizon_years);
    println!("  incremental cost:   {:.2}", e.incremental_cost);
    println!("  incremental effect: {:.4}", e.incremental_effect);
    match (e.icer, e.dominance) {
        (Some(icer), _) => println!("  ICER:               {icer:.0}"),
        (None, Some(d)) => println!("  ICER:               undefined ({})", d.name()),
        (None, None) => println!("  ICER:               undefined"),
    }

    println!();
    println!("=== ONE-WAY (±{:.0}%) ===", a.one_way.variation_pct * 100.0);
    for entry in a.one_way.entries.iter().take(5) {
        match entry.icer_swing {
            Some(swing) => println!("  {:<24} swing {swing:.0}", entry.parameter),
            None => println!("  {:<24} swing undefined", entry.parameter),
        }
    }

    if let Some(p) = &a.probabilistic {
        let s = &p.summary;
        println!();
        println!("=== PROBABILISTIC (n={}, seed={}) ===", p.n_samples, p.seed);
        println!(
            "  Δcost 95% interval:   [{:.2}, {:.2}]",
            s.incremental_cost_interval.lower, s.incremental_cost_interval.upper
        );
        println!(
            "  Δeffect 95% interval: [{:.4}, {:.4}]",
            s.incremental_effect_interval.lower, s.incremental_effect_interval.upper
        );
        println!(
            "  P(cost-effective @ {:.0}): {:.3}",
            p.wtp_threshold, s.probability_cost_effective
        );
    }

    if let Some(b) = &a.budget_impact {
        println!();
        println!("=== BUDGET IMPACT ({}) ===", b.currency);
        for year in &b.annual {
            println!(
                "  year {:>2} | uptake {:>5.1}% | patients {:>7} | net {:.0}",
                year.year,
                year.uptake_rate * 100.0,
                year.treated_patients,
                year.net_impact
            );
        }
        println!("  cumulative net impact: {:.0}", b.cumulative_net_impact);
    }

    let c = &a.compliance;
    println!();
    println!(
        "=== COMPLIANCE ({} {}) === {} | score {:.1}",
        c.framework_id,
        c.rule_set_version,
        c.overall_status.name(),
        c.compliance_score
    );
    for o in &c.outcomes {
        let mark = if o.passed { "pass" } else { "FAIL" };
        println!("  [{mark}] {:<28} {:<8} {}", o.rule_id, o.severity.name(), o.message);
    }
    for r in &c.recommendations {
        println!("  -> {r}");
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO_REQUEST: &str = include_str!("../../demos/nice_dossier.json");

    fn engine() -> Engine {
        Engine::new(EngineConfig::default_test(), RuleRegistry::builtin().unwrap()).unwrap()
    }

    #[test]
    fn demo_request_assesses_and_records() {
        let request: DossierRequest = serde_json::from_str(DEMO_REQUEST).unwrap();
        let store = AuditStore::in_memory().unwrap();
        store.migrate().unwrap();

        let reply = handle_command(&engine(), Some(&store), IpcCommand::AssessDossier { request }).unwrap();
        assert!(reply["assessment_id"].is_string());
        assert_eq!(store.count().unwrap(), 1);

        let history = store.history("demo-nice-001").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].framework_id, "nice");
        assert_eq!(history[0].seed, Some(20240501));
    }

    #[test]
    fn unknown_framework_replies_with_error_kind() {
        let cmd: IpcCommand =
            serde_json::from_str(r#"{"type":"submission_timeline","framework_id":"xyz"}"#).unwrap();
        let err = handle_command(&engine(), None, cmd).unwrap_err();
        assert_eq!(err.kind(), "unknown_framework");
    }

    #[test]
    fn list_frameworks_reply_is_an_array() {
        let reply = handle_command(&engine(), None, IpcCommand::ListFrameworks).unwrap();
        assert_eq!(reply.as_array().map(|a| a.len()), Some(6));
    }

    #[test]
    fn arg_value_reads_flag_pairs() {
        let args: Vec<String> = ["hta-runner", "--db", "a.db"].iter().map(|s| s.to_string()).collect();
        assert_eq!(arg_value(&args, "--db"), Some("a.db"));
        assert_eq!(arg_value(&args, "--config"), None);
    }
}
