//! Stress tests for shared namespaces.
//!
//! Several handles on one namespace, each driven by its own thread. Every
//! handle takes the cross-process lock for each operation, so this is the
//! same contention two processes would see.

use crate::fixtures::TestNamespace;
use shmns_core::Container;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per handle.
    pub operations: usize,
    /// Number of handles, one thread each.
    pub handles: usize,
    /// Namespace capacity.
    pub capacity: usize,
    /// Size of each value in bytes.
    pub value_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 500,
            handles: 4,
            capacity: 64,
            value_size: 64,
        }
    }
}

/// Each handle sets, reads back and removes its own keys.
///
/// Keys are private to one handle, so every read must return what that
/// handle wrote no matter how the others interleave. A read that does not
/// counts as a failed operation.
pub fn stress_private_keys(fixture: &TestNamespace, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();

    let workers: Vec<_> = (0..config.handles)
        .map(|worker| {
            let ns = fixture.open(config.capacity);
            let config = config.clone();
            thread::spawn(move || {
                let mut ok = 0;
                let mut failed = 0;
                for i in 0..config.operations {
                    let key = format!("w{worker}-{}", i % 4);
                    let value = vec![(worker + i) as u8; config.value_size];

                    let round = ns.set(&key, &value).unwrap_or(false)
                        && ns.get(&key).ok().flatten().as_deref() == Some(&value[..])
                        && ns.remove(&key).unwrap_or(false);
                    if round {
                        ok += 1;
                    } else {
                        failed += 1;
                    }
                }
                ns.close().expect("Failed to close handle");
                (ok, failed)
            })
        })
        .collect();

    let (ok, failed) = join_counts(workers);
    StressTestResult::new(ok, failed, start.elapsed())
}

/// All threads share one handle and add to the same table until it fills.
///
/// Returns the result and the namespace size afterwards, which must equal
/// the number of successful adds.
pub fn stress_shared_handle_fill(
    fixture: &TestNamespace,
    config: &StressConfig,
) -> (StressTestResult, usize) {
    let ns = Arc::new(fixture.open(config.capacity));
    let start = Instant::now();

    let workers: Vec<_> = (0..config.handles)
        .map(|worker| {
            let ns = Arc::clone(&ns);
            let operations = config.operations;
            thread::spawn(move || {
                let mut ok = 0;
                let mut failed = 0;
                for i in 0..operations {
                    match ns.add(&format!("w{worker}-{i}"), b"x") {
                        Ok(true) => ok += 1,
                        _ => failed += 1,
                    }
                }
                (ok, failed)
            })
        })
        .collect();

    let (ok, failed) = join_counts(workers);
    let result = StressTestResult::new(ok, failed, start.elapsed());
    let size = ns.size().expect("Failed to read size");
    (result, size)
}

fn join_counts(workers: Vec<thread::JoinHandle<(usize, usize)>>) -> (usize, usize) {
    workers
        .into_iter()
        .map(|worker| worker.join().expect("Worker panicked"))
        .fold((0, 0), |(ok, failed), (o, f)| (ok + o, failed + f))
}

/// Opens a handle per thread and closes them all, many times over.
///
/// Returns how many rounds ended with the namespace destroyed, which must be
/// every round.
pub fn stress_open_close(fixture: &TestNamespace, rounds: usize, handles: usize) -> usize {
    let mut destroyed = 0;
    for round in 0..rounds {
        let workers: Vec<_> = (0..handles)
            .map(|_| {
                let name = fixture.name().to_string();
                let config = fixture.config().clone();
                thread::spawn(move || {
                    let ns = Container::open_with_config(&name, 8, config)
                        .expect("Failed to open namespace");
                    ns.set("round", round.to_string().as_bytes())
                        .expect("Failed to set");
                    ns.close().expect("Failed to close")
                })
            })
            .collect();

        let last_closed = workers
            .into_iter()
            .map(|worker| worker.join().expect("Worker panicked"))
            .filter(|outcome| *outcome == shmns_core::CloseOutcome::LastClosed)
            .count();

        // Threads may not overlap, so a round can tear down more than once.
        if last_closed >= 1 {
            let check = fixture.open(8);
            if check.size().expect("Failed to read size") == 0 {
                destroyed += 1;
            }
            check.close().expect("Failed to close check handle");
        }
    }
    destroyed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_rates() {
        let result = StressTestResult::new(30, 10, Duration::from_secs(2));
        assert_eq!(result.total_ops, 40);
        assert!((result.ops_per_second - 20.0).abs() < f64::EPSILON);

        let instant = StressTestResult::new(5, 0, Duration::ZERO);
        assert_eq!(instant.ops_per_second, 0.0);
    }

    #[test]
    fn test_stress_private_keys() {
        let fixture = TestNamespace::new();
        let config = StressConfig {
            operations: 100,
            ..StressConfig::default()
        };

        let result = stress_private_keys(&fixture, &config);
        result.print_summary("private keys");

        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 400);
        assert_eq!(result.total_ops, 400);
        assert!(result.duration > Duration::ZERO);
        assert!(result.ops_per_second > 0.0);
    }

    #[test]
    fn test_stress_shared_handle_fill() {
        let fixture = TestNamespace::new();
        let config = StressConfig {
            operations: 50,
            handles: 4,
            capacity: 120,
            value_size: 1,
        };

        let (result, size) = stress_shared_handle_fill(&fixture, &config);
        result.print_summary("shared handle fill");
        assert_eq!(result.successful_ops, 120);
        assert_eq!(result.failed_ops, 80);
        assert_eq!(size, 120);
    }

    #[test]
    fn test_stress_open_close() {
        let fixture = TestNamespace::new();
        assert_eq!(stress_open_close(&fixture, 10, 4), 10);
    }
}
