use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{ClassName, FilterSpec, GradeRecord, Subject};

/// Read-side capability the aggregation engine needs from the grade store.
/// The engine never writes through this seam; inserts go through the
/// interactive side only.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_records(&self, filter: &FilterSpec) -> anyhow::Result<Vec<GradeRecord>>;
    async fn distinct_subjects(&self) -> anyhow::Result<Vec<String>>;
    async fn distinct_classes(&self) -> anyhow::Result<Vec<String>>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn fetch_records(&self, filter: &FilterSpec) -> anyhow::Result<Vec<GradeRecord>> {
        fetch_records(&self.pool, filter).await
    }

    async fn distinct_subjects(&self) -> anyhow::Result<Vec<String>> {
        distinct_subjects(&self.pool).await
    }

    async fn distinct_classes(&self) -> anyhow::Result<Vec<String>> {
        distinct_classes(&self.pool).await
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS grades (
            id UUID PRIMARY KEY,
            student_name TEXT NOT NULL,
            class_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            score DOUBLE PRECISION NOT NULL,
            exam_date DATE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS grades_class_subject_idx ON grades (class_name, subject)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let rows = vec![
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d201", "Avery Lee", ClassName::ClassA, Subject::Math, 95.0, (2026, 3, 2)),
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d202", "Avery Lee", ClassName::ClassA, Subject::Chinese, 81.5, (2026, 3, 2)),
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d203", "Avery Lee", ClassName::ClassA, Subject::English, 72.0, (2026, 3, 9)),
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d204", "Jules Moreno", ClassName::ClassA, Subject::Math, 58.0, (2026, 3, 2)),
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d205", "Jules Moreno", ClassName::ClassA, Subject::English, 66.5, (2026, 3, 9)),
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d206", "Kiara Patel", ClassName::ClassB, Subject::Math, 88.0, (2026, 3, 2)),
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d207", "Kiara Patel", ClassName::ClassB, Subject::Chinese, 92.5, (2026, 3, 9)),
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d208", "Kiara Patel", ClassName::ClassB, Subject::English, 79.0, (2026, 3, 16)),
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d209", "Noor Haddad", ClassName::ClassB, Subject::Math, 47.5, (2026, 3, 16)),
        ("7c9e3d14-1a52-4b6e-9c1f-aa01f3b0d210", "Noor Haddad", ClassName::ClassB, Subject::Chinese, 63.0, (2026, 3, 16)),
    ];

    for (id, name, class, subject, score, (year, month, day)) in rows {
        let exam_date = NaiveDate::from_ymd_opt(year, month, day).context("invalid seed date")?;
        sqlx::query(
            r#"
            INSERT INTO grades (id, student_name, class_name, subject, score, exam_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(name)
        .bind(class.as_str())
        .bind(subject.as_str())
        .bind(score)
        .bind(exam_date)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Translates a [`FilterSpec`] into parameterized predicates. Values are
/// always bound, never spliced into the SQL text. Rows come back ordered by
/// exam date so downstream trend building and recomputation are
/// deterministic.
pub async fn fetch_records(pool: &PgPool, filter: &FilterSpec) -> anyhow::Result<Vec<GradeRecord>> {
    let mut query = String::from(
        "SELECT id, student_name, class_name, subject, score, exam_date FROM grades",
    );

    let mut predicates = Vec::new();
    let mut next_arg = 0usize;
    if filter.name_contains.is_some() {
        next_arg += 1;
        predicates.push(format!("student_name ILIKE ${next_arg}"));
    }
    if filter.class_name.is_some() {
        next_arg += 1;
        predicates.push(format!("class_name = ${next_arg}"));
    }
    if filter.subject.is_some() {
        next_arg += 1;
        predicates.push(format!("subject = ${next_arg}"));
    }
    if !predicates.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&predicates.join(" AND "));
    }
    query.push_str(" ORDER BY exam_date ASC, id ASC");

    let mut rows = sqlx::query(&query);
    if let Some(name) = &filter.name_contains {
        rows = rows.bind(format!("%{name}%"));
    }
    if let Some(class) = filter.class_name {
        rows = rows.bind(class.as_str());
    }
    if let Some(subject) = filter.subject {
        rows = rows.bind(subject.as_str());
    }

    let fetched = rows.fetch_all(pool).await?;
    let mut records = Vec::with_capacity(fetched.len());

    for row in fetched {
        let class_text: String = row.get("class_name");
        let subject_text: String = row.get("subject");
        records.push(GradeRecord {
            id: row.get("id"),
            student_name: row.get("student_name"),
            class_name: ClassName::parse(&class_text)
                .with_context(|| format!("unknown class in store: {class_text}"))?,
            subject: Subject::parse(&subject_text)
                .with_context(|| format!("unknown subject in store: {subject_text}"))?,
            score: row.get("score"),
            exam_date: row.get("exam_date"),
        });
    }

    Ok(records)
}

pub async fn distinct_subjects(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query("SELECT DISTINCT subject FROM grades ORDER BY subject")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get("subject")).collect())
}

pub async fn distinct_classes(pool: &PgPool) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query("SELECT DISTINCT class_name FROM grades ORDER BY class_name")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get("class_name")).collect())
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    student_name: String,
    class_name: String,
    subject: String,
    score: String,
    exam_date: Option<String>,
}

#[derive(Debug)]
struct ValidRow {
    student_name: String,
    class_name: ClassName,
    subject: Subject,
    score: f64,
    exam_date: NaiveDate,
}

fn parse_exam_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y/%m/%d"))
        .ok()
}

fn validate_row(row: &CsvRow, today: NaiveDate) -> Result<ValidRow, String> {
    let student_name = row.student_name.trim();
    if student_name.is_empty() {
        return Err("student name must not be empty".to_string());
    }

    let class_name = ClassName::parse(&row.class_name)
        .ok_or_else(|| format!("unknown class: {}", row.class_name))?;
    let subject = Subject::parse(&row.subject)
        .ok_or_else(|| format!("unknown subject: {}", row.subject))?;

    let score: f64 = row
        .score
        .trim()
        .parse()
        .map_err(|_| "score must be a number".to_string())?;
    if !(0.0..=100.0).contains(&score) {
        return Err("score must be between 0 and 100".to_string());
    }

    let exam_date = match row.exam_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => {
            let date = parse_exam_date(text)
                .ok_or_else(|| format!("bad date: {text} (use YYYY-MM-DD or YYYY/MM/DD)"))?;
            if date > today {
                return Err("exam date must not be in the future".to_string());
            }
            date
        }
        None => today,
    };

    Ok(ValidRow {
        student_name: student_name.to_string(),
        class_name,
        subject,
        score,
        exam_date,
    })
}

/// Batch-imports grade rows, validating each line the way the entry form
/// does. Every successfully inserted row increments `inserted`; rejected or
/// failed rows are counted and reported with their reason.
pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<ImportOutcome> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let today = Utc::now().date_naive();
    let mut outcome = ImportOutcome::default();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2; // header is line 1
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                outcome.failed += 1;
                outcome.errors.push(format!("line {line}: {e}"));
                continue;
            }
        };

        let valid = match validate_row(&row, today) {
            Ok(valid) => valid,
            Err(reason) => {
                outcome.failed += 1;
                outcome.errors.push(format!("line {line}: {reason}"));
                continue;
            }
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO grades (id, student_name, class_name, subject, score, exam_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&valid.student_name)
        .bind(valid.class_name.as_str())
        .bind(valid.subject.as_str())
        .bind(valid.score)
        .bind(valid.exam_date)
        .execute(pool)
        .await;

        match inserted {
            Ok(_) => outcome.inserted += 1,
            Err(e) => {
                outcome.failed += 1;
                outcome.errors.push(format!("line {line}: database error: {e}"));
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, class: &str, subject: &str, score: &str, date: Option<&str>) -> CsvRow {
        CsvRow {
            student_name: name.to_string(),
            class_name: class.to_string(),
            subject: subject.to_string(),
            score: score.to_string(),
            exam_date: date.map(|d| d.to_string()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).expect("valid date")
    }

    #[test]
    fn valid_row_passes_with_both_date_formats() {
        let dashed = validate_row(&row("Avery Lee", "Class A", "Math", "90", Some("2026-03-01")), today())
            .expect("dashed date");
        assert_eq!(dashed.exam_date, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

        let slashed = validate_row(&row("Avery Lee", "Class A", "Math", "90", Some("2026/03/01")), today())
            .expect("slashed date");
        assert_eq!(slashed.exam_date, dashed.exam_date);
    }

    #[test]
    fn missing_date_defaults_to_today() {
        let valid = validate_row(&row("Avery Lee", "Class B", "English", "71.5", None), today())
            .expect("valid row");
        assert_eq!(valid.exam_date, today());
        assert_eq!(valid.class_name, ClassName::ClassB);
        assert!((valid.score - 71.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_fields_with_reason() {
        assert!(validate_row(&row("  ", "Class A", "Math", "90", None), today())
            .unwrap_err()
            .contains("name"));
        assert!(validate_row(&row("Avery", "Class C", "Math", "90", None), today())
            .unwrap_err()
            .contains("unknown class"));
        assert!(validate_row(&row("Avery", "Class A", "History", "90", None), today())
            .unwrap_err()
            .contains("unknown subject"));
        assert!(validate_row(&row("Avery", "Class A", "Math", "ninety", None), today())
            .unwrap_err()
            .contains("number"));
        assert!(validate_row(&row("Avery", "Class A", "Math", "101", None), today())
            .unwrap_err()
            .contains("between 0 and 100"));
        assert!(validate_row(&row("Avery", "Class A", "Math", "90", Some("03-01-2026")), today())
            .unwrap_err()
            .contains("bad date"));
    }

    #[test]
    fn rejects_future_exam_dates() {
        let err = validate_row(&row("Avery", "Class A", "Math", "90", Some("2026-04-02")), today())
            .unwrap_err();
        assert!(err.contains("future"));
    }
}
