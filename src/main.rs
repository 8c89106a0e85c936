use anyhow::{bail, Context};
use clap::Parser;
use dmutex::channel::local::LocalGroup;
use dmutex::config::{self, Config};
use dmutex::sync::{CsEvent, MutexProcess, Role, StopSignal};
use dmutex::time::SystemClock;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Runs a group of mutex peers on threads of this process.
#[derive(Parser, Debug)]
#[command(name = "dmutex", version)]
struct Cli {
    /// Peers that request the critical section
    #[arg(long, default_value_t = 3)]
    active: usize,
    /// Peers that only answer requests
    #[arg(long, default_value_t = 0)]
    passive: usize,
    /// How long the simulation runs
    #[arg(long, default_value_t = 30)]
    seconds: u64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Name of the group every peer joins
    #[arg(long, default_value = config::GROUP)]
    group: String,
    /// Stop the peer with this index halfway through to exercise failure detection
    #[arg(long)]
    crash: Option<usize>,
    #[arg(long, default_value_t = config::RECEIVE_TIMEOUT.as_millis() as u64)]
    receive_timeout_ms: u64,
    #[arg(long, default_value_t = config::FAILURE_TIMEOUT.as_millis() as u64)]
    failure_timeout_ms: u64,
    #[arg(long, default_value_t = config::MAX_DWELL.as_millis() as u64)]
    max_dwell_ms: u64,
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let n_procs = cli.active + cli.passive;
    if n_procs < 2 {
        bail!("need at least two peers, got {n_procs}");
    }
    if cli.crash.is_some_and(|i| i >= n_procs) {
        bail!("crash index out of range for {n_procs} peers");
    }

    let config = Config::default()
        .with_group(cli.group.as_str())
        .with_receive_timeout(Duration::from_millis(cli.receive_timeout_ms))
        .with_failure_timeout(Duration::from_millis(cli.failure_timeout_ms))
        .with_max_dwell(Duration::from_millis(cli.max_dwell_ms));

    // Everybody joins before anybody reads the membership
    let group = LocalGroup::new();
    let mut peers = (0..n_procs)
        .map(|i| {
            let rng = StdRng::seed_from_u64(cli.seed.wrapping_add(i as u64));
            MutexProcess::new(group.channel(), config.clone(), rng, SystemClock)
                .with_context(|| format!("peer {i} failed to join"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let entries: Vec<_> = (0..n_procs).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    for (i, p) in peers.iter_mut().enumerate() {
        let role = if i < cli.active {
            Role::Active
        } else {
            Role::Passive
        };
        p.init(format!("peer-{i}"), role)
            .with_context(|| format!("peer {i} failed to initialise"))?;
        let count = entries[i].clone();
        p.on_critical_section(move |e| {
            if let CsEvent::Entered { .. } = e {
                count.fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    let stop = StopSignal::new();
    let crash_stop = StopSignal::new();
    let ths = peers
        .into_iter()
        .enumerate()
        .map(|(i, mut p)| {
            let stop = if cli.crash == Some(i) {
                crash_stop.clone()
            } else {
                stop.clone()
            };
            let id = p.id();
            (id, std::thread::spawn(move || p.run(&stop)))
        })
        .collect::<Vec<_>>();

    let total = Duration::from_secs(cli.seconds);
    if cli.crash.is_some() {
        std::thread::sleep(total / 2);
        info!("crashing peer {:?}", cli.crash);
        crash_stop.stop();
        std::thread::sleep(total - total / 2);
    } else {
        std::thread::sleep(total);
    }
    stop.stop();
    crash_stop.stop();

    let mut failed = 0;
    for (i, (id, th)) in ths.into_iter().enumerate() {
        match th.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(%id, error = %e, fatal = e.is_consistency_violation(), "peer aborted");
                failed += 1;
            }
            Err(_) => {
                error!(%id, "peer thread panicked");
                failed += 1;
            }
        }
        println!("{id} (peer-{i}): {} CS entries", entries[i].load(Ordering::Relaxed));
    }
    if failed > 0 {
        bail!("{failed} peer(s) aborted");
    }
    Ok(())
}
