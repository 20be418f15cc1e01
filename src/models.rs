use serde::{Deserialize, Serialize};

pub const ROLL_COLUMN: &str = "Roll.No";
pub const DATE_COLUMN: &str = "Date";
pub const CLASS_COLUMN: &str = "Class";
pub const STATUS_COLUMN: &str = "Status";
pub const PERCENT_COLUMN: &str = "Percent";
pub const TOTAL_COLUMN: &str = "Total";
pub const SERIAL_COLUMN: &str = "Sl.No";

/// Columns that never carry attendance marks or subject scores.
pub const ADMIN_COLUMNS: [&str; 4] = [SERIAL_COLUMN, ROLL_COLUMN, TOTAL_COLUMN, PERCENT_COLUMN];

/// Attendance source after header sniffing: trimmed column names and raw cells.
///
/// Every row holds exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttendanceTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl AttendanceTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }

    /// Distinct non-empty values of the `Date` column, sorted ascending.
    pub fn dates(&self) -> Vec<String> {
        self.distinct(DATE_COLUMN)
    }

    /// Distinct values of the `Class` column of the long daily form, sorted ascending.
    pub fn classes(&self) -> Vec<String> {
        self.distinct(CLASS_COLUMN)
    }

    /// Columns holding per-subject marks: everything except the roll number,
    /// the date and, for the long daily form, the class and status columns.
    pub fn subject_columns(&self) -> Vec<String> {
        let long_form = AttendanceForm::detect(self) == AttendanceForm::Daily;
        self.columns
            .iter()
            .filter(|column| {
                let name = column.as_str();
                if name == ROLL_COLUMN || name == DATE_COLUMN {
                    return false;
                }
                !(long_form && (name == CLASS_COLUMN || name == STATUS_COLUMN))
            })
            .cloned()
            .collect()
    }

    /// Index of the first row whose roll number matches `roll_no`.
    pub fn find_student(&self, roll_no: &str) -> Option<usize> {
        let roll_idx = self.column_index(ROLL_COLUMN)?;
        let wanted = roll_no.trim();
        if wanted.is_empty() {
            return None;
        }
        (0..self.rows.len()).find(|&row| self.cell(row, roll_idx) == wanted)
    }

    /// Distinct roll numbers in first-seen order.
    pub fn roll_numbers(&self) -> Vec<String> {
        let Some(roll_idx) = self.column_index(ROLL_COLUMN) else {
            return Vec::new();
        };
        let mut seen = Vec::new();
        for row in 0..self.rows.len() {
            let roll = self.cell(row, roll_idx);
            if !roll.is_empty() && !seen.iter().any(|existing: &String| existing == roll) {
                seen.push(roll.to_string());
            }
        }
        seen
    }

    fn distinct(&self, column: &str) -> Vec<String> {
        let Some(idx) = self.column_index(column) else {
            return Vec::new();
        };
        let mut values: Vec<String> = (0..self.rows.len())
            .map(|row| self.cell(row, idx))
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect();
        values.sort();
        values.dedup();
        values
    }
}

/// Shape of an attendance source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceForm {
    /// One row per student with precomputed `Percent`/`Total`.
    Summary,
    /// One row per (student, date, class) with a single `Status` mark.
    Daily,
    /// One row per (student, date) with one mark column per subject.
    Subject,
}

impl AttendanceForm {
    pub fn detect(table: &AttendanceTable) -> Self {
        if !table.has_column(DATE_COLUMN) {
            AttendanceForm::Summary
        } else if table.has_column(CLASS_COLUMN) && table.has_column(STATUS_COLUMN) {
            AttendanceForm::Daily
        } else {
            AttendanceForm::Subject
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Present,
    Absent,
}

impl Mark {
    /// Parses the single-letter encoding; anything else is not a mark.
    pub fn parse(cell: &str) -> Option<Self> {
        match cell.trim() {
            "P" => Some(Mark::Present),
            "A" => Some(Mark::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub roll_no: String,
    pub classes_attended: Option<u32>,
    pub total_classes: Option<u32>,
    pub percent: f64,
    pub detained: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectScore {
    pub subject: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BunkedClass {
    pub date: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentBand {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassOverview {
    pub student_count: usize,
    pub average_percent: Option<f64>,
    pub detained_count: usize,
    pub distribution: Vec<PercentBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub summary: StudentSummary,
    pub band: crate::risk::RiskBand,
    pub progress: f64,
    pub needed_classes: Option<u64>,
    pub subjects: Vec<SubjectScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> AttendanceTable {
        AttendanceTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn detects_each_form() {
        let summary = table(&["Roll.No", "Percent"], &[]);
        let daily = table(&["Roll.No", "Date", "Class", "Status"], &[]);
        let subject = table(&["Roll.No", "Date", "Maths"], &[]);
        assert_eq!(AttendanceForm::detect(&summary), AttendanceForm::Summary);
        assert_eq!(AttendanceForm::detect(&daily), AttendanceForm::Daily);
        assert_eq!(AttendanceForm::detect(&subject), AttendanceForm::Subject);
    }

    #[test]
    fn subject_columns_skip_keys() {
        let subject = table(&["Date", "Roll.No", "Maths", "Physics"], &[]);
        assert_eq!(subject.subject_columns(), vec!["Maths", "Physics"]);

        let daily = table(&["Roll.No", "Date", "Class", "Status"], &[]);
        assert!(daily.subject_columns().is_empty());
    }

    #[test]
    fn dates_are_sorted_and_distinct() {
        let t = table(
            &["Roll.No", "Date", "Maths"],
            &[
                &["S1", "2024-01-02", "P"],
                &["S2", "2024-01-01", "A"],
                &["S1", "2024-01-01", "P"],
            ],
        );
        assert_eq!(t.dates(), vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(t.roll_numbers(), vec!["S1", "S2"]);
    }

    #[test]
    fn empty_cells_are_not_values() {
        let t = table(
            &["Roll.No", "Date", "Maths"],
            &[&["S1", "d1", "P"], &["", "", ""], &["  ", "d2", "A"]],
        );
        assert_eq!(t.dates(), vec!["d1", "d2"]);
        assert_eq!(t.roll_numbers(), vec!["S1"]);
        assert_eq!(t.find_student(""), None);
    }

    #[test]
    fn find_student_trims_cells() {
        let t = table(&["Roll.No", "Percent"], &[&[" 23E51A6601 ", "80"]]);
        assert_eq!(t.find_student("23E51A6601"), Some(0));
        assert_eq!(t.find_student("missing"), None);
    }

    #[test]
    fn marks_use_single_letters() {
        assert_eq!(Mark::parse("P"), Some(Mark::Present));
        assert_eq!(Mark::parse(" A "), Some(Mark::Absent));
        assert_eq!(Mark::parse("Present"), None);
    }
}
