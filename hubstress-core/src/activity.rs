//! Activity simulation: sustained heartbeat traffic plus a latency prober

use hubstress_http::{ActivityPayload, HubApi};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Placeholder sample recorded instead of a measurement in dry-run mode
pub const DRY_RUN_SAMPLE: Duration = Duration::from_millis(1);

/// Reduction of one category of timing samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingStats {
    pub count: usize,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl TimingStats {
    /// Reduce a sample list to (mean, min, max); None for an empty list
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        let first = *samples.first()?;
        let mut min = first;
        let mut max = first;
        let mut total = Duration::ZERO;
        for &sample in samples {
            min = min.min(sample);
            max = max.max(sample);
            total += sample;
        }
        Some(Self {
            count: samples.len(),
            mean: total / samples.len() as u32,
            min,
            max,
        })
    }
}

/// Timing statistics for one activity-simulation run
#[derive(Debug, Clone)]
pub struct ActivityReport {
    /// Stats over all workers' activity-POST timings
    pub activity: Option<TimingStats>,
    /// Stats over the prober's GET timings
    pub probe: Option<TimingStats>,
}

/// Simulate concurrent heartbeat traffic from `workers` workers over the
/// given users, while a prober continuously samples GET latency on the
/// first user
///
/// The user list is cut into `len / workers` contiguous chunks, one per
/// worker; the remainder is dropped from chunking. Whether that is
/// load-shedding or an accident is an open question, so the truncation is
/// kept as-is. Each worker sleeps a uniformly random sub-second jitter
/// before every POST to avoid thundering-herd synchronization.
pub async fn simulate_activity(
    client: Arc<dyn HubApi>,
    usernames: &[String],
    workers: usize,
    dry_run: bool,
) -> ActivityReport {
    let start = Instant::now();

    if usernames.is_empty() {
        warn!("No users to simulate activity for");
        return ActivityReport {
            activity: None,
            probe: None,
        };
    }

    let mut workers = workers.max(1);
    if usernames.len() < workers {
        warn!(
            users = usernames.len(),
            workers, "Fewer users than workers, clamping worker count"
        );
        workers = usernames.len();
    }
    let chunk_size = usernames.len() / workers;
    let assigned = workers * chunk_size;
    if assigned < usernames.len() {
        debug!(
            dropped = usernames.len() - assigned,
            "Chunking drops remainder users"
        );
    }
    info!(
        users = assigned,
        workers, chunk_size, dry_run, "Starting activity simulation"
    );

    // The prober runs for the lifetime of the worker pool and is told to
    // stop cooperatively; it observes the flag at the top of each iteration,
    // so at most one in-flight probe call delays its exit.
    let stop_probing = Arc::new(AtomicBool::new(false));
    let prober = tokio::spawn(probe_loop(
        Arc::clone(&client),
        usernames[0].clone(),
        Arc::clone(&stop_probing),
        dry_run,
    ));

    let mut pool = JoinSet::new();
    for chunk in usernames[..assigned].chunks(chunk_size) {
        pool.spawn(run_worker(Arc::clone(&client), chunk.to_vec(), dry_run));
    }

    let mut activity_samples = Vec::with_capacity(assigned);
    while let Some(result) = pool.join_next().await {
        match result {
            Ok(samples) => activity_samples.extend(samples),
            Err(err) => warn!(error = %err, "Activity worker panicked"),
        }
    }

    stop_probing.store(true, Ordering::Release);
    let probe_samples = match prober.await {
        Ok(samples) => samples,
        Err(err) => {
            warn!(error = %err, "Prober panicked");
            Vec::new()
        }
    };

    let report = ActivityReport {
        activity: TimingStats::from_samples(&activity_samples),
        probe: TimingStats::from_samples(&probe_samples),
    };

    if let Some(stats) = &report.activity {
        info!(
            count = stats.count,
            mean_secs = format!("{:.3}", stats.mean.as_secs_f64()),
            min_secs = format!("{:.3}", stats.min.as_secs_f64()),
            max_secs = format!("{:.3}", stats.max.as_secs_f64()),
            "Activity POST timings"
        );
    }
    if let Some(stats) = &report.probe {
        info!(
            count = stats.count,
            mean_secs = format!("{:.3}", stats.mean.as_secs_f64()),
            min_secs = format!("{:.3}", stats.min.as_secs_f64()),
            max_secs = format!("{:.3}", stats.max.as_secs_f64()),
            "Probe GET timings"
        );
    }
    info!(
        elapsed_secs = format!("{:.3}", start.elapsed().as_secs_f64()),
        "Finished activity simulation"
    );

    report
}

/// One worker: iterate the chunk, jitter, POST activity, record elapsed
///
/// The samples are owned by the worker and handed back on completion, so no
/// collection is mutated concurrently. Failed calls are logged and not
/// recorded.
async fn run_worker(client: Arc<dyn HubApi>, chunk: Vec<String>, dry_run: bool) -> Vec<Duration> {
    let mut samples = Vec::with_capacity(chunk.len());
    for name in &chunk {
        sleep(Duration::from_secs_f64(fastrand::f64())).await;
        let payload = ActivityPayload::upcoming();
        let start = Instant::now();
        match client.post_activity(name, &payload).await {
            Ok(resp) if resp.success => {
                samples.push(if dry_run { DRY_RUN_SAMPLE } else { start.elapsed() });
            }
            Ok(resp) => {
                warn!(
                    username = %name,
                    status = resp.status,
                    body = %resp.body,
                    "Failed to post activity"
                );
            }
            Err(err) => {
                warn!(username = %name, error = %err, "Failed to post activity");
            }
        }
    }
    samples
}

/// The prober: tight GET loop against one user until told to stop
async fn probe_loop(
    client: Arc<dyn HubApi>,
    name: String,
    stop: Arc<AtomicBool>,
    dry_run: bool,
) -> Vec<Duration> {
    let mut samples = Vec::new();
    while !stop.load(Ordering::Acquire) {
        let start = Instant::now();
        match client.get_user(&name).await {
            Ok(resp) if resp.success => {
                samples.push(if dry_run { DRY_RUN_SAMPLE } else { start.elapsed() });
            }
            Ok(resp) => {
                warn!(username = %name, status = resp.status, "Probe GET failed");
            }
            Err(err) => {
                warn!(username = %name, error = %err, "Probe GET failed");
            }
        }
    }
    debug!(samples = samples.len(), "Prober stopped");
    samples
}
