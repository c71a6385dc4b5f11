use std::collections::BTreeMap;

use crate::models::{GradeRecord, GradeStatistics, ScoreBand, Subject};

/// Aggregates a filtered record set into a [`GradeStatistics`] value.
///
/// Single pass, no I/O, deterministic for a given input sequence. Sums and
/// counts are order-independent; band assignment is per record. Pass
/// `subject_filter_active = true` when the originating filter already pins a
/// single subject so the per-subject breakdown is suppressed.
pub fn compute(records: &[GradeRecord], subject_filter_active: bool) -> GradeStatistics {
    let mut stats = GradeStatistics::default();
    if records.is_empty() {
        return stats;
    }

    let mut sum = 0.0f64;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut subject_sums: BTreeMap<Subject, (f64, usize)> = BTreeMap::new();

    for record in records {
        if !(0.0..=100.0).contains(&record.score) {
            tracing::warn!(
                student = %record.student_name,
                score = record.score,
                "score outside [0,100]; counting with clamped band"
            );
        }

        sum += record.score;
        max = max.max(record.score);
        min = min.min(record.score);

        let band = ScoreBand::from_score(record.score);
        *stats.score_distribution.entry(band).or_insert(0) += 1;

        if !subject_filter_active {
            let entry = subject_sums.entry(record.subject).or_insert((0.0, 0));
            entry.0 += record.score;
            entry.1 += 1;
        }
    }

    stats.total_count = records.len();
    stats.average = sum / records.len() as f64;
    stats.max_score = max;
    stats.min_score = min;

    let band_count = |band: ScoreBand| -> usize {
        stats.score_distribution.get(&band).copied().unwrap_or(0)
    };
    stats.fail_count = band_count(ScoreBand::Fail);
    stats.pass_count = stats.total_count - stats.fail_count;
    stats.excellent_count = band_count(ScoreBand::Excellent);
    stats.good_count = band_count(ScoreBand::Good);
    stats.medium_count = band_count(ScoreBand::Medium);

    if stats.total_count > 0 {
        stats.pass_rate = stats.pass_count as f64 * 100.0 / stats.total_count as f64;
        stats.excellent_rate = stats.excellent_count as f64 * 100.0 / stats.total_count as f64;
    }

    stats.subject_averages = subject_sums
        .into_iter()
        .map(|(subject, (total, count))| (subject, total / count as f64))
        .collect();

    stats
}
