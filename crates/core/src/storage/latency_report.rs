//! Encode-latency analysis over a capture directory.
//!
//! Each output file name carries the measured encode+persist latency of its
//! frame. This module collects those values, drops IQR outliers and
//! summarises the rest.

use std::fs;
use std::path::{Path, PathBuf};

use super::frame_file_name;

/// Outlier fence distance in interquartile ranges.
const IQR_FENCE: f64 = 1.5;

#[derive(Clone, Debug, PartialEq)]
pub struct LatencySummary {
    /// Samples before outlier removal.
    pub total: usize,
    pub outliers: usize,
    pub mean_ms: f64,
    pub median_ms: f64,
    /// Population standard deviation.
    pub std_dev_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub p95_ms: f64,
}

impl LatencySummary {
    /// Summarises `samples` after removing values outside
    /// `[Q1 - 1.5*IQR, Q3 + 1.5*IQR]`. Returns `None` for no samples.
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = samples.iter().map(|&v| v as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = percentile(&sorted, 25.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        let (lower, upper) = (q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr);

        let kept: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|v| (lower..=upper).contains(v))
            .collect();

        let n = kept.len() as f64;
        let mean = kept.iter().sum::<f64>() / n;
        let variance = kept.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            total: samples.len(),
            outliers: samples.len() - kept.len(),
            mean_ms: mean,
            median_ms: percentile(&kept, 50.0),
            std_dev_ms: variance.sqrt(),
            min_ms: kept[0] as u64,
            max_ms: kept[kept.len() - 1] as u64,
            p95_ms: percentile(&kept, 95.0),
        })
    }

    pub fn kept(&self) -> usize {
        self.total - self.outliers
    }
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Latencies collected from one capture directory.
#[derive(Clone, Debug)]
pub struct LatencyReport {
    pub dir: PathBuf,
    pub samples: Vec<u64>,
    /// Entries that were not final frame files (temporaries, foreign files).
    pub skipped: usize,
}

impl LatencyReport {
    pub fn from_directory(dir: &Path) -> std::io::Result<Self> {
        let mut samples = Vec::new();
        let mut skipped = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            match name.to_str().and_then(frame_file_name::parse) {
                Some(parsed) => samples.push(parsed.latency_ms),
                None => skipped += 1,
            }
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            samples,
            skipped,
        })
    }

    pub fn summary(&self) -> Option<LatencySummary> {
        LatencySummary::from_samples(&self.samples)
    }

    /// Human-readable report, or `None` when the directory held no frames.
    pub fn summary_string(&self) -> Option<String> {
        let s = self.summary()?;
        let lines = [
            format!("{}", self.dir.display()),
            format!("  Total frames: {}", s.total),
            format!("  Outliers removed: {}", s.outliers),
            format!("  Valid frames: {}", s.kept()),
            format!("  Mean latency: {:.2}ms", s.mean_ms),
            format!("  Median latency: {:.2}ms", s.median_ms),
            format!("  Std deviation: {:.2}ms", s.std_dev_ms),
            format!("  P95 latency: {:.2}ms", s.p95_ms),
            format!("  Min latency: {}ms", s.min_ms),
            format!("  Max latency: {}ms", s.max_ms),
        ];
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_samples() {
        assert!(LatencySummary::from_samples(&[]).is_none());
    }

    #[test]
    fn test_single_sample() {
        let s = LatencySummary::from_samples(&[18]).unwrap();
        assert_eq!(s.total, 1);
        assert_eq!(s.outliers, 0);
        assert_relative_eq!(s.mean_ms, 18.0);
        assert_relative_eq!(s.median_ms, 18.0);
        assert_relative_eq!(s.std_dev_ms, 0.0);
        assert_eq!((s.min_ms, s.max_ms), (18, 18));
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [10.0, 20.0, 30.0, 40.0];
        assert_relative_eq!(percentile(&v, 50.0), 25.0);
        assert_relative_eq!(percentile(&v, 25.0), 17.5);
        assert_relative_eq!(percentile(&v, 100.0), 40.0);
        assert_relative_eq!(percentile(&v, 0.0), 10.0);
    }

    #[test]
    fn test_outlier_removed() {
        // Q1 = 11.5, Q3 = 13.5, IQR = 2 -> fence [8.5, 16.5]
        let s = LatencySummary::from_samples(&[10, 11, 12, 12, 13, 14, 250]).unwrap();
        assert_eq!(s.total, 7);
        assert_eq!(s.outliers, 1);
        assert_eq!(s.max_ms, 14);
        assert_relative_eq!(s.mean_ms, 12.0);
        assert_relative_eq!(s.median_ms, 12.0);
    }

    #[test]
    fn test_population_std_dev() {
        let s = LatencySummary::from_samples(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(s.outliers, 0);
        assert_relative_eq!(s.mean_ms, 3.0);
        assert_relative_eq!(s.std_dev_ms, 2f64.sqrt());
    }

    #[test]
    fn test_from_directory_reads_final_names_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "2025.11.27_09.02.48.803_HW_700000000_18ms.jpg",
            "2025.11.27_09.02.48.836_HW_733333333_22ms.jpg",
            "2025.11.27_09.02.48.870_ERR_1764234168870000000_20ms.jpg",
            "2025.11.27_09.02.48.900_HW_1.5.tmp",
            "README.txt",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let report = LatencyReport::from_directory(dir.path()).unwrap();
        let mut samples = report.samples.clone();
        samples.sort();
        assert_eq!(samples, vec![18, 20, 22]);
        assert_eq!(report.skipped, 2);

        let text = report.summary_string().unwrap();
        assert!(text.contains("Total frames: 3"));
        assert!(text.contains("Mean latency: 20.00ms"));
    }

    #[test]
    fn test_from_missing_directory_errors() {
        assert!(LatencyReport::from_directory(Path::new("/nonexistent/capture")).is_err());
    }

    #[test]
    fn test_summary_string_none_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let report = LatencyReport::from_directory(dir.path()).unwrap();
        assert!(report.summary_string().is_none());
    }
}
