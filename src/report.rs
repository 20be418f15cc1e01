use std::fmt::Write;

use chrono::NaiveDate;

use crate::analytics;
use crate::models::StudentSummary;
use crate::risk;

pub fn build_report(
    source_label: &str,
    generated_on: NaiveDate,
    summaries: &[StudentSummary],
    absences_by_date: &[(String, usize)],
) -> String {
    let overview = analytics::class_overview(summaries);

    let mut output = String::new();

    let _ = writeln!(output, "# Attendance & Detention Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        source_label, generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    match overview.average_percent {
        None => {
            let _ = writeln!(output, "No students recorded in this source.");
        }
        Some(average) => {
            let _ = writeln!(output, "- Students: {}", overview.student_count);
            let _ = writeln!(output, "- Average attendance: {:.2}%", average);
            let _ = writeln!(
                output,
                "- Below {:.0}%: {}",
                risk::DETENTION_THRESHOLD,
                overview.detained_count
            );
            for band in overview.distribution.iter().filter(|band| band.count > 0) {
                let _ = writeln!(
                    output,
                    "- {:.0}-{:.0}%: {} students",
                    band.lower, band.upper, band.count
                );
            }
        }
    }

    let mut detained: Vec<&StudentSummary> = summaries.iter().filter(|s| s.detained).collect();
    detained.sort_by(|a, b| {
        a.percent
            .partial_cmp(&b.percent)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students At Risk Of Detention");

    if detained.is_empty() {
        let _ = writeln!(output, "Every student is at or above the threshold.");
    } else {
        for summary in detained {
            let plan = match risk::needed_classes_for(summary) {
                Ok(needed) => format!("needs {needed} more consecutive classes"),
                Err(_) => "class total unknown".to_string(),
            };
            let _ = writeln!(
                output,
                "- {} at {:.2}% ({})",
                summary.roll_no, summary.percent, plan
            );
        }
    }

    if !absences_by_date.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Absences By Date");
        for (date, count) in absences_by_date {
            let _ = writeln!(output, "- {}: {} absent marks", date, count);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(roll_no: &str, percent: f64, total: Option<u32>) -> StudentSummary {
        StudentSummary {
            roll_no: roll_no.to_string(),
            classes_attended: None,
            total_classes: total,
            percent,
            detained: risk::is_detained(percent),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    #[test]
    fn lists_detained_students_lowest_first() {
        let summaries = vec![
            summary("S1", 90.0, Some(40)),
            summary("S2", 70.0, Some(40)),
            summary("S3", 50.0, None),
        ];
        let report = build_report("data/attendance.csv", date(), &summaries, &[]);

        assert!(report.contains("Generated for data/attendance.csv on 2026-03-02"));
        assert!(report.contains("- Students: 3"));
        assert!(report.contains("- Below 75%: 2"));
        let s3 = report.find("- S3 at 50.00% (class total unknown)").expect("S3 line");
        let s2 = report
            .find("- S2 at 70.00% (needs 8 more consecutive classes)")
            .expect("S2 line");
        assert!(s3 < s2);
        assert!(!report.contains("- S1 at"));
        assert!(!report.contains("Absences By Date"));
    }

    #[test]
    fn empty_source_and_absence_section() {
        let absences = vec![("2024-01-01".to_string(), 3)];
        let report = build_report("daily", date(), &[], &absences);
        assert!(report.contains("No students recorded in this source."));
        assert!(report.contains("Every student is at or above the threshold."));
        assert!(report.contains("- 2024-01-01: 3 absent marks"));
    }
}
