// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Burst throughput tool.
//!
//! Builds a synthetic network (ring topology with a fixed fan-out, 1% power neurons),
//! runs it either for a fixed number of bursts or under the real-time burst loop, and
//! prints a summary (or JSON with `--json`).

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::info;

use feagi_burst::burst_engine::{
    BurstLoopConfig, BurstLoopRunner, DynamicNPU, NpuConfig, TelemetrySink, TelemetrySnapshot,
    TracingRwLock,
};
use feagi_burst::config::{apply_cli_overrides, load_config, validate_config, FeagiConfig};
use feagi_burst::neural::types::SynapseType;
use feagi_burst::neural::LIFParameters;
use feagi_burst::observability::{debug_flags_help, init_logging, parse_debug_flags};

struct Args {
    config_path: Option<PathBuf>,
    overrides: HashMap<String, String>,
    neurons: usize,
    fanout: usize,
    bursts: u64,
    loop_seconds: Option<f64>,
    json: bool,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: burst_bench [--config <path>] [--neurons N] [--fanout K] [--bursts B]\n\
         \x20                  [--loop-seconds S] [--precision fp32|int8] [--backend auto|cpu|wgpu]\n\
         \x20                  [--set key=value]... [--json]\n\n\
         Defaults: 10000 neurons, fan-out 100, 1000 bursts\n\n{}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config_path: None,
        overrides: HashMap::new(),
        neurons: 10_000,
        fanout: 100,
        bursts: 1_000,
        loop_seconds: None,
        json: false,
    };

    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().with_context(|| format!("{} needs a value", name));
        match arg.as_str() {
            "--config" => args.config_path = Some(PathBuf::from(value("--config")?)),
            "--neurons" => args.neurons = value("--neurons")?.parse()?,
            "--fanout" => args.fanout = value("--fanout")?.parse()?,
            "--bursts" => args.bursts = value("--bursts")?.parse()?,
            "--loop-seconds" => args.loop_seconds = Some(value("--loop-seconds")?.parse()?),
            "--precision" => {
                args.overrides.insert("precision".into(), value("--precision")?);
            }
            "--backend" => {
                args.overrides.insert("backend".into(), value("--backend")?);
            }
            "--set" => {
                let pair = value("--set")?;
                let (key, v) = pair
                    .split_once('=')
                    .with_context(|| format!("--set expects key=value, got '{}'", pair))?;
                args.overrides.insert(key.to_string(), v.to_string());
            }
            "--json" => args.json = true,
            "-h" | "--help" => usage_and_exit(),
            // Consumed by parse_debug_flags
            other if other.starts_with("--debug-") || other == "--trace-npu" => {}
            other => bail!("Unknown argument: {}", other),
        }
    }

    if args.neurons < 2 {
        bail!("--neurons must be at least 2");
    }
    Ok(args)
}

fn resolve_config(args: &Args) -> Result<FeagiConfig> {
    match &args.config_path {
        Some(path) => Ok(load_config(Some(path), Some(&args.overrides))?),
        None => {
            let mut config = FeagiConfig::default();
            apply_cli_overrides(&mut config, &args.overrides)?;
            validate_config(&config)?;
            Ok(config)
        }
    }
}

/// Ring topology: neuron `i` projects to the next `fanout` neurons
fn build_network(npu: &mut DynamicNPU, neurons: usize, fanout: usize) -> Result<usize> {
    let params = vec![LIFParameters::with_threshold(20_000.0); neurons];
    let areas: Vec<u32> = (0..neurons).map(|i| (i % 4) as u32).collect();
    let coords: Vec<(u32, u32, u32)> = (0..neurons as u32).map(|i| (i, 0, 0)).collect();
    let ids = npu.add_neurons_batch(&params, &areas, &coords)?;

    let fanout = fanout.min(neurons - 1);
    let total = neurons * fanout;
    let mut sources = Vec::with_capacity(total);
    let mut targets = Vec::with_capacity(total);
    let mut types = Vec::with_capacity(total);
    for (i, source) in ids.iter().enumerate() {
        for k in 1..=fanout {
            sources.push(source.0);
            targets.push(ids[(i + k) % neurons].0);
            types.push(if k % 5 == 0 {
                SynapseType::Inhibitory
            } else {
                SynapseType::Excitatory
            });
        }
    }
    npu.add_synapses_batch(&sources, &targets, &vec![200; total], &vec![150; total], &types)?;

    for id in ids.iter().step_by(100) {
        npu.add_power_neuron(*id)?;
    }
    npu.set_power_amount(25_000.0);
    Ok(total)
}

/// Counts snapshots; the bench only cares that telemetry keeps up
#[derive(Default)]
struct CountingSink {
    snapshots: AtomicU64,
    neurons: AtomicU64,
}

impl TelemetrySink for CountingSink {
    fn publish(&self, snapshot: TelemetrySnapshot) -> Result<(), String> {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
        self.neurons
            .fetch_add(snapshot.total_neurons as u64, Ordering::Relaxed);
        Ok(())
    }
}

fn run_fixed(npu: &mut DynamicNPU, bursts: u64) -> Result<serde_json::Value> {
    let start = Instant::now();
    let mut fired_total = 0usize;
    for _ in 0..bursts {
        fired_total += npu.process_burst()?.neuron_count();
    }
    let elapsed = start.elapsed();

    let stats = npu.stats();
    Ok(json!({
        "mode": "fixed",
        "bursts": bursts,
        "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
        "bursts_per_second": bursts as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        "avg_burst_us": stats.avg_processing_time_us(),
        "max_burst_us": stats.max_processing_time_us,
        "avg_fired": fired_total as f64 / bursts.max(1) as f64,
    }))
}

fn run_loop(npu: DynamicNPU, config: &FeagiConfig, seconds: f64) -> Result<serde_json::Value> {
    let npu = Arc::new(TracingRwLock::new(npu, "npu"));
    let sink = Arc::new(CountingSink::default());
    let loop_config = BurstLoopConfig::from_feagi_config(config)?;
    let target_hz = loop_config.frequency_hz;

    let mut runner = BurstLoopRunner::new(npu.clone(), sink.clone(), loop_config)?;
    runner.start()?;
    std::thread::sleep(Duration::from_secs_f64(seconds));
    runner.stop();

    if let Some(err) = runner.last_error() {
        bail!("Burst loop stopped on error: {}", err);
    }

    let bursts = runner.get_burst_count();
    let stats = npu.read().stats().clone();
    Ok(json!({
        "mode": "loop",
        "target_hz": target_hz,
        "achieved_hz": bursts as f64 / seconds,
        "bursts": bursts,
        "avg_burst_us": stats.avg_processing_time_us(),
        "max_burst_us": stats.max_processing_time_us,
        "snapshots": sink.snapshots.load(Ordering::Relaxed),
        "snapshot_neurons": sink.neurons.load(Ordering::Relaxed),
    }))
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let config = resolve_config(&args)?;
    let _log_guard = init_logging(&config.logging, &parse_debug_flags())?;

    let mut npu_config = NpuConfig::from_feagi_config(&config)?;
    let synapse_total = args.neurons * args.fanout.min(args.neurons - 1);
    npu_config.neuron_capacity = npu_config.neuron_capacity.max(args.neurons);
    npu_config.synapse_capacity = npu_config.synapse_capacity.max(synapse_total);

    let mut npu = DynamicNPU::new(npu_config)?;
    let synapses = build_network(&mut npu, args.neurons, args.fanout)?;
    let decision = npu.finalize_network()?;
    info!(
        "Network ready: {} neurons, {} synapses, backend {} ({})",
        args.neurons, synapses, decision.backend_type, decision.reason
    );

    let mut report = match args.loop_seconds {
        Some(seconds) => run_loop(npu, &config, seconds)?,
        None => run_fixed(&mut npu, args.bursts)?,
    };
    report["neurons"] = json!(args.neurons);
    report["synapses"] = json!(synapses);
    report["precision"] = json!(config.npu.precision);
    report["backend"] = json!(decision.backend_type.to_string());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("burst_bench");
        if let Some(fields) = report.as_object() {
            for (key, value) in fields {
                println!("  {:<20} {}", key, value);
            }
        }
    }
    Ok(())
}
