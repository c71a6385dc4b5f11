use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{
    DistributionSlice, GradeRecord, GradeStatistics, Subject, TrendPoint, TrendSeries,
};

fn earliest_exam_date(records: &[GradeRecord]) -> Option<NaiveDate> {
    records.iter().map(|r| r.exam_date).min()
}

fn day_offset(date: NaiveDate, anchor: NaiveDate) -> i64 {
    date.signed_duration_since(anchor).num_days()
}

/// Per-subject score lines for a matched record set, typically one
/// student's records. The x axis is the day offset from the earliest
/// matching exam date, so it always starts at zero. An empty match set
/// yields no series; the caller renders its own "no data" state.
pub fn student_trend_series(records: &[GradeRecord]) -> Vec<TrendSeries> {
    let Some(anchor) = earliest_exam_date(records) else {
        return Vec::new();
    };

    let mut by_subject: BTreeMap<Subject, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for record in records {
        by_subject
            .entry(record.subject)
            .or_default()
            .push((record.exam_date, record.score));
    }

    by_subject
        .into_iter()
        .map(|(subject, mut scores)| {
            scores.sort_by_key(|(date, _)| *date);
            TrendSeries {
                name: subject.to_string(),
                points: scores
                    .into_iter()
                    .map(|(date, score)| TrendPoint {
                        day_offset: day_offset(date, anchor),
                        score,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Same shape as [`student_trend_series`], but each point is the average
/// score per (subject, exam date) pair, for class-level trends.
pub fn class_trend_series(records: &[GradeRecord]) -> Vec<TrendSeries> {
    let Some(anchor) = earliest_exam_date(records) else {
        return Vec::new();
    };

    let mut sums: BTreeMap<(Subject, NaiveDate), (f64, usize)> = BTreeMap::new();
    for record in records {
        let entry = sums.entry((record.subject, record.exam_date)).or_insert((0.0, 0));
        entry.0 += record.score;
        entry.1 += 1;
    }

    // Key order is (subject, date) ascending, so each series comes out
    // date-sorted without a second pass.
    let mut by_subject: BTreeMap<Subject, Vec<TrendPoint>> = BTreeMap::new();
    for ((subject, date), (sum, count)) in sums {
        by_subject.entry(subject).or_default().push(TrendPoint {
            day_offset: day_offset(date, anchor),
            score: sum / count as f64,
        });
    }

    by_subject
        .into_iter()
        .map(|(subject, points)| TrendSeries {
            name: subject.to_string(),
            points,
        })
        .collect()
}

/// One slice per non-empty band for a category or pie view, each carrying
/// its share of the total for display.
pub fn distribution_slices(stats: &GradeStatistics) -> Vec<DistributionSlice> {
    if stats.total_count == 0 {
        return Vec::new();
    }

    stats
        .score_distribution
        .iter()
        .filter(|(_, &count)| count > 0)
        .map(|(band, &count)| DistributionSlice {
            label: band.label().to_string(),
            count,
            percentage: count as f64 * 100.0 / stats.total_count as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassName;
    use crate::stats;
    use uuid::Uuid;

    fn record(name: &str, subject: Subject, score: f64, date: (i32, u32, u32)) -> GradeRecord {
        GradeRecord {
            id: Uuid::new_v4(),
            student_name: name.to_string(),
            class_name: ClassName::ClassA,
            subject,
            score,
            exam_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("valid date"),
        }
    }

    #[test]
    fn empty_match_set_yields_no_series() {
        assert!(student_trend_series(&[]).is_empty());
        assert!(class_trend_series(&[]).is_empty());
    }

    #[test]
    fn trend_offsets_anchor_at_earliest_date() {
        let records = vec![
            record("Avery Lee", Subject::Math, 88.0, (2026, 3, 16)),
            record("Avery Lee", Subject::Math, 95.0, (2026, 3, 2)),
            record("Avery Lee", Subject::English, 72.0, (2026, 3, 9)),
        ];
        let series = student_trend_series(&records);
        assert_eq!(series.len(), 2);

        let math = series.iter().find(|s| s.name == "Math").expect("math series");
        assert_eq!(
            math.points,
            vec![
                TrendPoint { day_offset: 0, score: 95.0 },
                TrendPoint { day_offset: 14, score: 88.0 },
            ]
        );

        let english = series.iter().find(|s| s.name == "English").expect("english series");
        assert_eq!(english.points, vec![TrendPoint { day_offset: 7, score: 72.0 }]);

        for s in &series {
            assert!(s.points.iter().all(|p| p.day_offset >= 0));
        }
    }

    #[test]
    fn class_trend_averages_scores_per_subject_and_date() {
        let records = vec![
            record("Avery Lee", Subject::Math, 90.0, (2026, 3, 2)),
            record("Jules Moreno", Subject::Math, 70.0, (2026, 3, 2)),
            record("Avery Lee", Subject::Math, 60.0, (2026, 3, 9)),
        ];
        let series = class_trend_series(&records);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].name, "Math");
        assert_eq!(
            series[0].points,
            vec![
                TrendPoint { day_offset: 0, score: 80.0 },
                TrendPoint { day_offset: 7, score: 60.0 },
            ]
        );
    }

    #[test]
    fn distribution_slices_skip_empty_bands_and_sum_to_100() {
        let records = vec![
            record("Avery Lee", Subject::Math, 95.0, (2026, 3, 2)),
            record("Jules Moreno", Subject::Math, 55.0, (2026, 3, 2)),
            record("Kiara Patel", Subject::English, 72.0, (2026, 3, 9)),
        ];
        let stats = stats::compute(&records, false);
        let slices = distribution_slices(&stats);

        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(|s| s.count > 0));
        let total_share: f64 = slices.iter().map(|s| s.percentage).sum();
        assert!((total_share - 100.0).abs() < 1e-9);

        let labels: Vec<&str> = slices.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Fail (0-59)", "Medium (70-79)", "Excellent (90-100)"]
        );
    }

    #[test]
    fn empty_statistics_yield_no_slices() {
        let stats = stats::compute(&[], false);
        assert!(distribution_slices(&stats).is_empty());
    }
}
