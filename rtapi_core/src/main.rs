//! # RTAPI Simulator
//!
//! Runs the periodic tasks listed in the configuration on the simulated
//! RTAPI scheduler. Each task counts its runs into an optional shared
//! memory segment and stashes a debug message; messages are flushed to
//! the log after every tick.
//!
//! # Usage
//!
//! ```bash
//! # Run until Ctrl-C
//! rtapi_sim --config config/rtapi_sim.toml
//!
//! # 1000 ticks with task messages visible
//! rtapi_sim --ticks 1000 -v
//!
//! # Process-local segments instead of SysV IPC
//! rtapi_sim --local-shmem
//! ```

#![deny(warnings)]

use clap::Parser;
use rtapi_common::config::{ConfigError, ConfigLoader, LogLevel, RtapiConfig, SimTaskConfig};
use rtapi_common::consts::DEFAULT_CONFIG_PATH;
use rtapi_common::error::RtapiError;
use rtapi_common::level::MsgLevel;
use rtapi_core::clock::MonotonicClock;
use rtapi_core::msg::Messenger;
use rtapi_core::rt::{rt_enabled, rt_setup};
use rtapi_core::rtapi::Rtapi;
use rtapi_core::task::{TaskEntry, wait};
use rtapi_shmem::{HeapProvider, SegmentProvider, ShmemId, SysvProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, error, info, warn};
use tracing_subscriber::layer::{Layer, Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Handle used to narrow the filter once the configured level is known.
type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Owner id of every task the simulator installs.
const SIM_OWNER: i32 = 1;

/// RTAPI Simulator - cooperative periodic tasks on a non-RT host
#[derive(Parser, Debug)]
#[command(name = "rtapi_sim")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Run periodic tasks on the simulated RTAPI scheduler")]
#[command(long_about = None)]
struct Args {
    /// Path to the runtime configuration
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Stop after this many base ticks (default: run until Ctrl-C)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// CPU core to pin the scheduler to (`rt` feature)
    #[arg(long, default_value_t = 0)]
    cpu_core: usize,

    /// SCHED_FIFO priority (`rt` feature)
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Use process-local segments instead of SysV shared memory
    #[arg(long)]
    local_shmem: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("rtapi_sim failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = setup_tracing(&args);
    let (config, found) = load_config(&args.config)?;
    if !args.verbose {
        filter.modify(|f| *f = env_filter(level_of(config.shared.log_level)))?;
    }

    info!("RTAPI Simulator v{} starting...", env!("CARGO_PKG_VERSION"));
    if found {
        info!("Loaded configuration from {}", args.config.display());
    } else {
        warn!(
            "{} not found, using built-in defaults",
            args.config.display()
        );
    }
    config.validate()?;
    info!(
        "Service '{}': {} task(s) configured",
        config.shared.service_name,
        config.tasks.len()
    );

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    rt_setup(args.cpu_core, args.rt_priority)?;
    if rt_enabled() {
        info!(
            "RT setup done: core {}, SCHED_FIFO {}",
            args.cpu_core, args.rt_priority
        );
    }

    if args.local_shmem {
        simulate(HeapProvider::new(), &config, &args, &running)
    } else {
        simulate(SysvProvider::new(), &config, &args, &running)
    }
}

/// Load the configuration, falling back to defaults if the file is missing.
///
/// Returns whether the file was found.
fn load_config(path: &Path) -> Result<(RtapiConfig, bool), ConfigError> {
    match RtapiConfig::load(path) {
        Ok(config) => Ok((config, true)),
        Err(ConfigError::FileNotFound) => Ok((RtapiConfig::default(), false)),
        Err(e) => Err(e),
    }
}

fn simulate<P: SegmentProvider>(
    provider: P,
    config: &RtapiConfig,
    args: &Args,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rtapi = Rtapi::new(MonotonicClock, provider, config);
    if args.verbose {
        rtapi.set_msg_level(MsgLevel::All)?;
    }
    let base = rtapi.clock_set_period(config.scheduler.base_period_ns)?;
    info!("Base period: {} ns", base);

    let mut segments = Vec::new();
    for task in &config.tasks {
        if let Some(seg) = install(&mut rtapi, task)? {
            segments.push(seg);
        }
    }

    let ticks = rtapi.run(running, args.ticks)?;
    log_stats(&rtapi, ticks);

    for seg in segments {
        rtapi.shmem_delete(seg)?;
    }
    rtapi.flush()?;
    info!("RTAPI Simulator shutdown complete");
    Ok(())
}

/// Install and start one demo task. Returns its segment, if any.
fn install<P: SegmentProvider>(
    rtapi: &mut Rtapi<MonotonicClock, P>,
    task: &SimTaskConfig,
) -> Result<Option<ShmemId>, RtapiError> {
    let (segment, counter) = match task.shmem_key {
        Some(key) => {
            let id = rtapi.shmem_new(key, size_of::<u64>())?;
            let ptr = rtapi.shmem_getptr(id)?.cast::<u64>();
            (Some(id), Some(ptr))
        }
        None => (None, None),
    };

    let entry = TaskEntry::from_async(demo_task, (rtapi.messenger(), task.name.clone(), counter));
    let id = rtapi.task_new(entry, task.priority, SIM_OWNER, task.stack_size)?;
    rtapi.task_start(id, task.period_ns)?;

    let info = rtapi.task_info(id)?;
    info!(
        "Task '{}' as {}: period {} ns (every {} ticks), priority {}",
        task.name, id, info.period_ns, info.ratio, info.priority
    );
    Ok(segment)
}

/// Count runs and report each one at debug level.
async fn demo_task((msg, name, counter): (Messenger, String, Option<*mut u64>)) {
    let mut runs: u64 = 0;
    loop {
        runs += 1;
        if let Some(counter) = counter {
            // Segment stays mapped until after the scheduler stops.
            unsafe { counter.write_volatile(runs) };
        }
        let _ = msg.print_msg(MsgLevel::Dbg, "%s: run %lu\n", &[name.as_str().into(), runs.into()]);
        wait().await;
    }
}

fn log_stats<P: SegmentProvider>(rtapi: &Rtapi<MonotonicClock, P>, ticks: u64) {
    let stats = rtapi.stats();
    info!(
        "Ran {} ticks, {} resumptions, {} resyncs",
        ticks, stats.resumptions, stats.resyncs
    );
    if stats.ticks > 0 {
        info!(
            "Step time: min {} ns, avg {} ns, max {} ns, {} overruns; max wake latency {} ns",
            stats.min_step_ns,
            stats.avg_step_ns(),
            stats.max_step_ns,
            stats.overruns,
            stats.max_latency_ns
        );
    }
    match rtapi.messenger().dropped() {
        Ok(0) => {}
        Ok(dropped) => warn!("{} messages dropped (stash full)", dropped),
        Err(e) => warn!("Dropped-message count unavailable: {}", e),
    }
}

/// Setup tracing subscriber at INFO, or DEBUG with `-v`.
///
/// Installed before the configuration is read so that load errors are
/// reported; the returned handle applies the configured level afterwards.
fn setup_tracing(args: &Args) -> FilterHandle {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let (filter, handle) = reload::Layer::new(env_filter(level));

    let output: Box<dyn Layer<Layered<reload::Layer<EnvFilter, Registry>, Registry>> + Send + Sync> =
        if args.json {
            fmt::layer().json().boxed()
        } else {
            fmt::layer().with_target(false).boxed()
        };

    tracing_subscriber::registry().with(filter).with(output).init();
    handle
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}

fn level_of(configured: LogLevel) -> Level {
    match configured {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}
