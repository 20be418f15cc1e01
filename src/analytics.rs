use std::collections::BTreeMap;

use crate::error::{AttendanceError, Result};
use crate::models::{
    AttendanceForm, AttendanceTable, BunkedClass, ClassOverview, Mark, PercentBand,
    StudentRecord, StudentSummary, SubjectScore, ADMIN_COLUMNS, CLASS_COLUMN, DATE_COLUMN,
    PERCENT_COLUMN, ROLL_COLUMN, STATUS_COLUMN, TOTAL_COLUMN,
};
use crate::risk::{self, RiskBand};

/// Per-student attendance summary.
///
/// Daily and subject forms share one denominator for every student:
/// `classes per day * distinct dates`. Results are ordered by roll number.
/// The summary form takes `Percent` (and `Total` when present) as given and
/// keeps source row order.
pub fn summarize(table: &AttendanceTable) -> Result<Vec<StudentSummary>> {
    let roll_idx = require_column(table, ROLL_COLUMN)?;

    match AttendanceForm::detect(table) {
        AttendanceForm::Summary => summarize_precomputed(table, roll_idx),
        AttendanceForm::Subject => {
            let subject_idx: Vec<usize> = table
                .subject_columns()
                .iter()
                .filter_map(|name| table.column_index(name))
                .collect();
            let total = subject_idx.len() * table.dates().len();
            let attended = count_present(table, roll_idx, |row| {
                subject_idx
                    .iter()
                    .filter(|&&col| Mark::parse(table.cell(row, col)) == Some(Mark::Present))
                    .count()
            });
            finish_counts(attended, total)
        }
        AttendanceForm::Daily => {
            let status_idx = require_column(table, STATUS_COLUMN)?;
            let total = table.classes().len() * table.dates().len();
            let attended = count_present(table, roll_idx, |row| {
                usize::from(Mark::parse(table.cell(row, status_idx)) == Some(Mark::Present))
            });
            finish_counts(attended, total)
        }
    }
}

fn summarize_precomputed(table: &AttendanceTable, roll_idx: usize) -> Result<Vec<StudentSummary>> {
    let percent_idx = require_column(table, PERCENT_COLUMN)?;
    let total_idx = table.column_index(TOTAL_COLUMN);

    let mut summaries = Vec::with_capacity(table.rows.len());
    for row in 0..table.rows.len() {
        if let Some(summary) = precomputed_row(table, row, roll_idx, percent_idx, total_idx)? {
            summaries.push(summary);
        }
    }
    Ok(summaries)
}

/// One summary-form row; rows without a roll number or a percent are skipped.
fn precomputed_row(
    table: &AttendanceTable,
    row: usize,
    roll_idx: usize,
    percent_idx: usize,
    total_idx: Option<usize>,
) -> Result<Option<StudentSummary>> {
    let roll_no = table.cell(row, roll_idx);
    if roll_no.is_empty() || table.cell(row, percent_idx).is_empty() {
        tracing::debug!(row = row + 1, "skipping row without roll number or percent");
        return Ok(None);
    }

    let percent = parse_number(table, row, percent_idx)?;
    let total = match total_idx {
        Some(idx) if !table.cell(row, idx).is_empty() => Some(parse_class_count(table, row, idx)?),
        _ => None,
    };

    Ok(Some(StudentSummary {
        roll_no: roll_no.to_string(),
        classes_attended: total.map(|t| (percent / 100.0 * f64::from(t)).round() as u32),
        total_classes: total,
        percent,
        detained: risk::is_detained(percent),
    }))
}

fn count_present<F>(table: &AttendanceTable, roll_idx: usize, present_in_row: F) -> BTreeMap<String, usize>
where
    F: Fn(usize) -> usize,
{
    let mut attended: BTreeMap<String, usize> = BTreeMap::new();
    for row in 0..table.rows.len() {
        let roll_no = table.cell(row, roll_idx);
        if roll_no.is_empty() {
            continue;
        }
        *attended.entry(roll_no.to_string()).or_insert(0) += present_in_row(row);
    }
    attended
}

fn finish_counts(attended: BTreeMap<String, usize>, total: usize) -> Result<Vec<StudentSummary>> {
    if total == 0 && !attended.is_empty() {
        return Err(AttendanceError::UndefinedMetric(
            "no classes held: the table has no subject columns or dates".to_string(),
        ));
    }

    Ok(attended
        .into_iter()
        .map(|(roll_no, count)| {
            let percent = count as f64 / total as f64 * 100.0;
            StudentSummary {
                roll_no,
                classes_attended: Some(count as u32),
                total_classes: Some(total as u32),
                percent,
                detained: risk::is_detained(percent),
            }
        })
        .collect())
}

/// Roll numbers marked absent on `date` for a class (long daily form) or a
/// subject column (subject form), in table row order.
pub fn absentees_on(table: &AttendanceTable, date: &str, class_or_subject: &str) -> Result<Vec<String>> {
    let roll_idx = require_column(table, ROLL_COLUMN)?;
    let date_idx = require_column(table, DATE_COLUMN)?;
    let date = date.trim();
    let wanted = class_or_subject.trim();

    let absent_in_row: Box<dyn Fn(usize) -> bool + '_> = match AttendanceForm::detect(table) {
        AttendanceForm::Daily => {
            let class_idx = require_column(table, CLASS_COLUMN)?;
            let status_idx = require_column(table, STATUS_COLUMN)?;
            Box::new(move |row| {
                table.cell(row, class_idx) == wanted
                    && Mark::parse(table.cell(row, status_idx)) == Some(Mark::Absent)
            })
        }
        _ => {
            let subject_idx = require_column(table, wanted)?;
            Box::new(move |row| Mark::parse(table.cell(row, subject_idx)) == Some(Mark::Absent))
        }
    };

    Ok((0..table.rows.len())
        .filter(|&row| !table.cell(row, roll_idx).is_empty())
        .filter(|&row| table.cell(row, date_idx) == date && absent_in_row(row))
        .map(|row| table.cell(row, roll_idx).to_string())
        .collect())
}

/// Numeric, non-administrative columns of one student's row, in column order.
pub fn subject_breakdown(table: &AttendanceTable, roll_no: &str) -> Result<Vec<SubjectScore>> {
    require_column(table, ROLL_COLUMN)?;
    let row = table
        .find_student(roll_no)
        .ok_or_else(|| AttendanceError::UnknownStudent(roll_no.trim().to_string()))?;

    let mut scores = Vec::new();
    for (col, name) in table.columns.iter().enumerate() {
        if ADMIN_COLUMNS.contains(&name.as_str()) || !is_numeric_column(table, col) {
            continue;
        }
        if let Ok(value) = table.cell(row, col).parse::<f64>() {
            scores.push(SubjectScore {
                subject: name.clone(),
                value,
            });
        }
    }
    Ok(scores)
}

fn is_numeric_column(table: &AttendanceTable, col: usize) -> bool {
    (0..table.rows.len())
        .map(|row| table.cell(row, col))
        .filter(|cell| !cell.is_empty())
        .all(|cell| cell.parse::<f64>().is_ok())
}

/// Every class a student missed as (date, subject) pairs, row by row.
pub fn bunked_classes(table: &AttendanceTable, roll_no: &str) -> Result<Vec<BunkedClass>> {
    let roll_idx = require_column(table, ROLL_COLUMN)?;
    let date_idx = require_column(table, DATE_COLUMN)?;
    let wanted = roll_no.trim();
    if table.find_student(wanted).is_none() {
        return Err(AttendanceError::UnknownStudent(wanted.to_string()));
    }

    let daily = match AttendanceForm::detect(table) {
        AttendanceForm::Daily => Some((
            require_column(table, CLASS_COLUMN)?,
            require_column(table, STATUS_COLUMN)?,
        )),
        _ => None,
    };
    let subject_cols: Vec<(usize, String)> = if daily.is_some() {
        Vec::new()
    } else {
        table
            .subject_columns()
            .into_iter()
            .filter_map(|name| table.column_index(&name).map(|idx| (idx, name)))
            .collect()
    };

    let mut bunked = Vec::new();
    for row in (0..table.rows.len()).filter(|&row| table.cell(row, roll_idx) == wanted) {
        let date = table.cell(row, date_idx);
        if let Some((class_idx, status_idx)) = daily {
            if Mark::parse(table.cell(row, status_idx)) == Some(Mark::Absent) {
                bunked.push(BunkedClass {
                    date: date.to_string(),
                    subject: table.cell(row, class_idx).to_string(),
                });
            }
            continue;
        }
        for (col, name) in &subject_cols {
            if Mark::parse(table.cell(row, *col)) == Some(Mark::Absent) {
                bunked.push(BunkedClass {
                    date: date.to_string(),
                    subject: name.clone(),
                });
            }
        }
    }
    Ok(bunked)
}

/// Number of absent marks recorded on each date, dates ascending.
pub fn absences_by_date(table: &AttendanceTable) -> Result<Vec<(String, usize)>> {
    let date_idx = require_column(table, DATE_COLUMN)?;
    let mark_cols: Vec<usize> = match AttendanceForm::detect(table) {
        AttendanceForm::Daily => vec![require_column(table, STATUS_COLUMN)?],
        _ => table
            .subject_columns()
            .iter()
            .filter_map(|name| table.column_index(name))
            .collect(),
    };

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in 0..table.rows.len() {
        let date = table.cell(row, date_idx);
        if date.is_empty() {
            continue;
        }
        let absent = mark_cols
            .iter()
            .filter(|&&col| Mark::parse(table.cell(row, col)) == Some(Mark::Absent))
            .count();
        *counts.entry(date.to_string()).or_insert(0) += absent;
    }
    Ok(counts.into_iter().collect())
}

/// Full view of one student: summary, risk band, recovery plan and subjects.
pub fn student_record(table: &AttendanceTable, roll_no: &str) -> Result<StudentRecord> {
    let wanted = roll_no.trim();
    let unknown = || AttendanceError::UnknownStudent(wanted.to_string());

    // Precomputed rows stand alone; the marked forms need the whole table
    // for their shared denominator.
    let summary = match AttendanceForm::detect(table) {
        AttendanceForm::Summary => {
            let roll_idx = require_column(table, ROLL_COLUMN)?;
            let percent_idx = require_column(table, PERCENT_COLUMN)?;
            let row = table.find_student(wanted).ok_or_else(unknown)?;
            precomputed_row(table, row, roll_idx, percent_idx, table.column_index(TOTAL_COLUMN))?
                .ok_or_else(|| {
                    AttendanceError::UndefinedMetric(format!("no percent recorded for roll number '{wanted}'"))
                })?
        }
        _ => summarize(table)?
            .into_iter()
            .find(|summary| summary.roll_no == wanted)
            .ok_or_else(unknown)?,
    };

    let needed_classes = match risk::needed_classes_for(&summary) {
        Ok(needed) => Some(needed),
        Err(err) => {
            tracing::debug!(roll_no = wanted, error = %err, "needed classes unavailable");
            None
        }
    };

    Ok(StudentRecord {
        band: RiskBand::for_percent(summary.percent),
        progress: risk::progress_to_goal(summary.percent),
        needed_classes,
        subjects: subject_breakdown(table, wanted)?,
        summary,
    })
}

/// Cohort-level figures over computed summaries.
pub fn class_overview(summaries: &[StudentSummary]) -> ClassOverview {
    let mut distribution: Vec<PercentBand> = (0..10)
        .map(|band| PercentBand {
            lower: f64::from(band) * 10.0,
            upper: f64::from(band + 1) * 10.0,
            count: 0,
        })
        .collect();

    for summary in summaries {
        let band = (summary.percent / 10.0).floor().clamp(0.0, 9.0) as usize;
        distribution[band].count += 1;
    }

    let average_percent = if summaries.is_empty() {
        None
    } else {
        Some(summaries.iter().map(|s| s.percent).sum::<f64>() / summaries.len() as f64)
    };

    ClassOverview {
        student_count: summaries.len(),
        average_percent,
        detained_count: summaries.iter().filter(|s| s.detained).count(),
        distribution,
    }
}

fn require_column(table: &AttendanceTable, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| AttendanceError::MissingColumn(name.to_string()))
}

/// Class totals must be whole, non-negative numbers.
fn parse_class_count(table: &AttendanceTable, row: usize, col: usize) -> Result<u32> {
    let value = parse_number(table, row, col)?;
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(AttendanceError::InvalidNumber {
            row: row + 1,
            column: table.columns[col].clone(),
            value: table.cell(row, col).to_string(),
        });
    }
    Ok(value as u32)
}

fn parse_number(table: &AttendanceTable, row: usize, col: usize) -> Result<f64> {
    let raw = table.cell(row, col);
    raw.parse::<f64>().map_err(|_| AttendanceError::InvalidNumber {
        row: row + 1,
        column: table.columns[col].clone(),
        value: raw.to_string(),
    })
}
