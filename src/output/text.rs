//! Human-readable text output

use super::STAT_TARGET;
use crate::coordinator::RunSummary;
use crate::stats::Report;
use crate::util::time::{format_duration, format_throughput};
use std::time::Duration;

/// Log every line of a report at STAT level
pub fn log_report(report: &Report) {
    for line in report.lines() {
        log::info!(target: STAT_TARGET, "{}", line);
    }
}

/// One-line result per worker plus the overall verdict
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::with_capacity(summary.workers.len() + 2);
    for w in &summary.workers {
        let mut line = format!("Thread {}: {} writes, {} reads", w.id, w.writes, w.reads);
        if let Some(kind) = w.last_failure {
            line.push_str(&format!(", last failure: {}", kind));
        }
        if w.failed {
            line.push_str(" (failed)");
        }
        lines.push(line);
    }

    let elapsed = Duration::from_secs_f64(summary.elapsed_secs);
    let secs = summary.elapsed_secs.max(1.0);
    lines.push(format!(
        "{} transfers, {} in {}",
        summary.totals.total_ops(),
        format_throughput(summary.totals.total_bytes() as f64 / secs),
        format_duration(elapsed)
    ));
    lines.push(format!(
        "{}: {}",
        summary.device.display(),
        if summary.passed { "PASSED" } else { "FAILED" }
    ));
    lines
}

/// Print the end-of-run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    for line in summary_lines(summary) {
        println!("{}", line);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::TestConfig;
    use crate::error::FailureKind;
    use crate::stats::{ReportKind, StatBlock};
    use crate::worker::WorkerSummary;
    use std::path::PathBuf;

    pub(crate) fn sample_summary(passed: bool) -> RunSummary {
        RunSummary {
            device: PathBuf::from("/dev/sdx"),
            passed,
            cycles: 1,
            elapsed_secs: 2.0,
            config: TestConfig::default(),
            totals: StatBlock {
                wbytes: 4096,
                wcount: 4,
                rbytes: 4096,
                rcount: 4,
                ..Default::default()
            },
            report: Report {
                kind: ReportKind::Total,
                read: None,
                write: None,
                runtime_secs: Some(2),
            },
            workers: vec![
                WorkerSummary {
                    id: 0,
                    writes: 4,
                    reads: 4,
                    ..Default::default()
                },
                WorkerSummary {
                    id: 1,
                    failed: !passed,
                    last_failure: (!passed).then_some(FailureKind::Miscompare),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_summary_lines() {
        let lines = summary_lines(&sample_summary(true));
        assert_eq!(lines[0], "Thread 0: 4 writes, 4 reads");
        assert_eq!(lines[2], "8 transfers, 4.00 KB/s in 2.00s");
        assert_eq!(lines[3], "/dev/sdx: PASSED");
    }

    #[test]
    fn test_failed_worker_is_flagged() {
        let lines = summary_lines(&sample_summary(false));
        assert_eq!(lines[1], "Thread 1: 0 writes, 0 reads, last failure: data miscompare (failed)");
        assert_eq!(lines[3], "/dev/sdx: FAILED");
    }
}
