use std::fmt::Write;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::StatsError;
use crate::models::{GradeStatistics, ScoreBand};

/// Rendered report text starts with this so spreadsheet and browser
/// consumers that sniff the encoding read non-ASCII labels correctly.
pub const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Html,
    Csv,
}

/// Context the renderer cannot derive from the statistics value itself.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub generated_at: NaiveDateTime,
    pub class_label: String,
    pub subject_label: String,
}

/// Pure function of its inputs; writing the result anywhere is the
/// caller's concern.
pub fn render(stats: &GradeStatistics, ctx: &ReportContext, format: ReportFormat) -> String {
    match format {
        ReportFormat::Html => render_html(stats, ctx),
        ReportFormat::Csv => render_csv(stats),
    }
}

/// Tiered severity label for a rate. Pass rate uses 80/60 thresholds,
/// excellence rate 20/10.
fn rate_severity(rate: f64, good_at: f64, warning_at: f64) -> &'static str {
    if rate >= good_at {
        "good"
    } else if rate >= warning_at {
        "warning"
    } else {
        "danger"
    }
}

fn band_share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

fn render_html(stats: &GradeStatistics, ctx: &ReportContext) -> String {
    let mut output = String::from(UTF8_BOM);

    let _ = writeln!(output, "<!DOCTYPE html>");
    let _ = writeln!(output, "<html>");
    let _ = writeln!(output, "<head>");
    let _ = writeln!(output, "<meta charset=\"UTF-8\">");
    let _ = writeln!(output, "<title>Grade Statistics Report</title>");
    let _ = writeln!(output, "<style>");
    let _ = writeln!(output, "body {{ font-family: Arial, sans-serif; margin: 40px; }}");
    let _ = writeln!(
        output,
        "h1 {{ color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 10px; }}"
    );
    let _ = writeln!(output, "h2 {{ color: #34495e; margin-top: 30px; }}");
    let _ = writeln!(
        output,
        "table {{ border-collapse: collapse; width: 100%; margin: 20px 0; }}"
    );
    let _ = writeln!(
        output,
        "th, td {{ border: 1px solid #ddd; padding: 12px; text-align: center; }}"
    );
    let _ = writeln!(output, "th {{ background-color: #3498db; color: white; }}");
    let _ = writeln!(output, "tr:nth-child(even) {{ background-color: #f8f9fa; }}");
    let _ = writeln!(
        output,
        ".stats-grid {{ display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 20px; }}"
    );
    let _ = writeln!(
        output,
        ".stat-card {{ background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); }}"
    );
    let _ = writeln!(
        output,
        ".stat-value {{ font-size: 24px; font-weight: bold; color: #2c3e50; }}"
    );
    let _ = writeln!(output, ".stat-label {{ color: #7f8c8d; margin-top: 5px; }}");
    let _ = writeln!(output, ".good {{ color: #27ae60; }}");
    let _ = writeln!(output, ".warning {{ color: #f39c12; }}");
    let _ = writeln!(output, ".danger {{ color: #e74c3c; }}");
    let _ = writeln!(output, "</style>");
    let _ = writeln!(output, "</head>");
    let _ = writeln!(output, "<body>");

    let _ = writeln!(output, "<h1>Grade Statistics Report</h1>");
    let _ = writeln!(
        output,
        "<p><strong>Generated:</strong> {}</p>",
        ctx.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(
        output,
        "<p><strong>Filter:</strong> Class: {} | Subject: {}</p>",
        ctx.class_label, ctx.subject_label
    );

    let _ = writeln!(output, "<h2>Key Metrics</h2>");
    let _ = writeln!(output, "<div class=\"stats-grid\">");
    let _ = writeln!(
        output,
        "<div class=\"stat-card\"><div class=\"stat-value\">{}</div><div class=\"stat-label\">Records</div></div>",
        stats.total_count
    );
    let _ = writeln!(
        output,
        "<div class=\"stat-card\"><div class=\"stat-value\">{:.2}</div><div class=\"stat-label\">Average</div></div>",
        stats.average
    );
    let _ = writeln!(
        output,
        "<div class=\"stat-card\"><div class=\"stat-value {}\">{:.1}%</div><div class=\"stat-label\">Pass rate</div></div>",
        rate_severity(stats.pass_rate, 80.0, 60.0),
        stats.pass_rate
    );
    let _ = writeln!(
        output,
        "<div class=\"stat-card\"><div class=\"stat-value {}\">{:.1}%</div><div class=\"stat-label\">Excellence rate</div></div>",
        rate_severity(stats.excellent_rate, 20.0, 10.0),
        stats.excellent_rate
    );
    let _ = writeln!(output, "</div>");

    let _ = writeln!(output, "<h2>Details</h2>");
    let _ = writeln!(output, "<table>");
    let _ = writeln!(output, "<tr><th>Item</th><th>Value</th></tr>");
    let _ = writeln!(output, "<tr><td>Max score</td><td>{}</td></tr>", stats.max_score);
    let _ = writeln!(output, "<tr><td>Min score</td><td>{}</td></tr>", stats.min_score);
    let _ = writeln!(output, "<tr><td>Pass count</td><td>{}</td></tr>", stats.pass_count);
    let _ = writeln!(output, "<tr><td>Fail count</td><td>{}</td></tr>", stats.fail_count);
    let _ = writeln!(
        output,
        "<tr><td>Excellent count (&ge;90)</td><td>{}</td></tr>",
        stats.excellent_count
    );
    let _ = writeln!(
        output,
        "<tr><td>Good count (80-89)</td><td>{}</td></tr>",
        stats.good_count
    );
    let _ = writeln!(
        output,
        "<tr><td>Medium count (70-79)</td><td>{}</td></tr>",
        stats.medium_count
    );
    let _ = writeln!(output, "</table>");

    let _ = writeln!(output, "<h2>Score Distribution</h2>");
    let _ = writeln!(output, "<table>");
    let _ = writeln!(output, "<tr><th>Band</th><th>Count</th><th>Share</th></tr>");
    for band in ScoreBand::all() {
        let count = stats.score_distribution.get(&band).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        let _ = writeln!(
            output,
            "<tr><td>{}</td><td>{}</td><td>{:.1}%</td></tr>",
            band.label(),
            count,
            band_share(count, stats.total_count)
        );
    }
    let _ = writeln!(output, "</table>");

    if !stats.subject_averages.is_empty() {
        let _ = writeln!(output, "<h2>Subject Averages</h2>");
        let _ = writeln!(output, "<table>");
        let _ = writeln!(output, "<tr><th>Subject</th><th>Average</th></tr>");
        for (subject, average) in &stats.subject_averages {
            let _ = writeln!(
                output,
                "<tr><td>{}</td><td>{:.2}</td></tr>",
                subject, average
            );
        }
        let _ = writeln!(output, "</table>");
    }

    let _ = writeln!(
        output,
        "<footer style=\"margin-top: 50px; padding-top: 20px; border-top: 1px solid #ddd; color: #7f8c8d; text-align: center;\">"
    );
    let _ = writeln!(output, "<p>Generated by gradebook-stats</p>");
    let _ = writeln!(output, "</footer>");
    let _ = writeln!(output, "</body>");
    let _ = writeln!(output, "</html>");

    output
}

fn render_csv(stats: &GradeStatistics) -> String {
    let mut output = String::from(UTF8_BOM);

    let _ = writeln!(output, "item,value");
    let _ = writeln!(output, "total count,{}", stats.total_count);
    let _ = writeln!(output, "average,{:.2}", stats.average);
    let _ = writeln!(output, "max score,{}", stats.max_score);
    let _ = writeln!(output, "min score,{}", stats.min_score);
    let _ = writeln!(output, "pass count,{}", stats.pass_count);
    let _ = writeln!(output, "fail count,{}", stats.fail_count);
    let _ = writeln!(output, "pass rate,{:.1}%", stats.pass_rate);
    let _ = writeln!(output, "excellent rate,{:.1}%", stats.excellent_rate);

    let _ = writeln!(output);
    let _ = writeln!(output, "band,count,percentage");
    for band in ScoreBand::all() {
        let count = stats.score_distribution.get(&band).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        let _ = writeln!(
            output,
            "{},{},{:.1}%",
            band.label(),
            count,
            band_share(count, stats.total_count)
        );
    }

    output
}

/// Writes rendered report text verbatim; the text already carries its BOM.
/// Failures surface to the caller without touching the statistics pipeline.
pub fn export_report(text: &str, path: &Path) -> Result<(), StatsError> {
    fs::write(path, text).map_err(|source| StatsError::ExportFailed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassName, FilterSpec, GradeRecord, Subject};
    use crate::stats;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn record(subject: Subject, score: f64) -> GradeRecord {
        GradeRecord {
            id: Uuid::new_v4(),
            student_name: "Avery Lee".to_string(),
            class_name: ClassName::ClassA,
            subject,
            score,
            exam_date: NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date"),
        }
    }

    fn scenario_stats(subject_filter_active: bool) -> GradeStatistics {
        let records = vec![
            record(Subject::Math, 95.0),
            record(Subject::Math, 55.0),
            record(Subject::English, 72.0),
        ];
        stats::compute(&records, subject_filter_active)
    }

    fn context() -> ReportContext {
        let filter = FilterSpec::default();
        ReportContext {
            generated_at: NaiveDate::from_ymd_opt(2026, 4, 1)
                .expect("valid date")
                .and_hms_opt(9, 30, 0)
                .expect("valid time"),
            class_label: filter.class_label().to_string(),
            subject_label: filter.subject_label().to_string(),
        }
    }

    #[test]
    fn severity_tiers_differ_for_pass_and_excellence() {
        assert_eq!(rate_severity(85.0, 80.0, 60.0), "good");
        assert_eq!(rate_severity(80.0, 80.0, 60.0), "good");
        assert_eq!(rate_severity(65.0, 80.0, 60.0), "warning");
        assert_eq!(rate_severity(59.9, 80.0, 60.0), "danger");

        assert_eq!(rate_severity(25.0, 20.0, 10.0), "good");
        assert_eq!(rate_severity(15.0, 20.0, 10.0), "warning");
        assert_eq!(rate_severity(9.9, 20.0, 10.0), "danger");
    }

    #[test]
    fn csv_leads_with_bom_and_skips_empty_bands() {
        let csv = render(&scenario_stats(false), &context(), ReportFormat::Csv);
        assert!(csv.starts_with(UTF8_BOM));
        assert!(csv.contains("total count,3"));
        assert!(csv.contains("average,74.00"));
        assert!(csv.contains("pass rate,66.7%"));
        assert!(csv.contains("Excellent (90-100),1,33.3%"));
        assert!(csv.contains("Fail (0-59),1,33.3%"));
        assert!(!csv.contains("Good (80-89)"));
        assert!(!csv.contains("Pass (60-69),0"));
    }

    #[test]
    fn csv_band_percentages_sum_to_one_hundred() {
        let csv = render(&scenario_stats(false), &context(), ReportFormat::Csv);
        let band_section = csv
            .split("\n\n")
            .nth(1)
            .expect("band section after blank line");
        let total: f64 = band_section
            .lines()
            .skip(1) // band,count,percentage header
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.rsplit(',')
                    .next()
                    .expect("percentage column")
                    .trim_end_matches('%')
                    .parse::<f64>()
                    .expect("numeric percentage")
            })
            .sum();
        assert!((total - 100.0).abs() < 0.5, "band shares sum to {total}");
    }

    #[test]
    fn html_carries_metrics_and_severity_classes() {
        let html = render(&scenario_stats(false), &context(), ReportFormat::Html);
        assert!(html.starts_with(UTF8_BOM));
        assert!(html.contains("<title>Grade Statistics Report</title>"));
        assert!(html.contains("Generated:</strong> 2026-04-01 09:30:00"));
        assert!(html.contains("Class: All | Subject: All"));
        // pass rate 66.7 lands in the warning tier, excellence 33.3 in good
        assert!(html.contains("<div class=\"stat-value warning\">66.7%</div>"));
        assert!(html.contains("<div class=\"stat-value good\">33.3%</div>"));
        assert!(html.contains("<td>Max score</td><td>95</td>"));
        assert!(html.contains("<td>Min score</td><td>55</td>"));
    }

    #[test]
    fn html_subject_table_tracks_subject_averages() {
        let with_subjects = render(&scenario_stats(false), &context(), ReportFormat::Html);
        assert!(with_subjects.contains("<h2>Subject Averages</h2>"));
        assert!(with_subjects.contains("<tr><td>Math</td><td>75.00</td></tr>"));
        assert!(with_subjects.contains("<tr><td>English</td><td>72.00</td></tr>"));

        let pinned = render(&scenario_stats(true), &context(), ReportFormat::Html);
        assert!(!pinned.contains("Subject Averages"));
    }

    #[test]
    fn empty_statistics_render_without_faults() {
        let stats = stats::compute(&[], false);
        let csv = render(&stats, &context(), ReportFormat::Csv);
        assert!(csv.contains("total count,0"));
        assert!(csv.contains("pass rate,0.0%"));
        assert!(csv.contains("min score,100"));
        assert!(csv.ends_with("band,count,percentage\n"));
    }
}
