use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{AttendanceError, Result};
use crate::models::{AttendanceTable, ROLL_COLUMN};

pub const DEFAULT_MAX_HEADER_ROWS: usize = 6;

/// Locates the real header row of an attendance export that may start
/// with title or merged rows.
#[derive(Debug, Clone)]
pub struct HeaderSniffer {
    pub max_header_rows: usize,
    pub sentinel: String,
}

impl Default for HeaderSniffer {
    fn default() -> Self {
        Self {
            max_header_rows: DEFAULT_MAX_HEADER_ROWS,
            sentinel: ROLL_COLUMN.to_string(),
        }
    }
}

impl HeaderSniffer {
    pub fn new(max_header_rows: usize) -> Self {
        Self {
            max_header_rows,
            ..Self::default()
        }
    }

    /// Tries header rows `0..max_header_rows` in turn, rereading the source
    /// from the start each time, and returns the first table that carries the
    /// sentinel column. Falls back to header row 0 when none does, so callers
    /// must still check for the sentinel themselves.
    pub fn read<R: Read + Seek>(&self, source: &mut R) -> Result<AttendanceTable> {
        for header_row in 0..self.max_header_rows {
            match parse_attempt(source, header_row) {
                Ok(table) if table.has_column(&self.sentinel) => {
                    tracing::debug!(header_row, columns = table.columns.len(), "header row located");
                    return Ok(table);
                }
                Ok(_) => {
                    tracing::debug!(header_row, sentinel = %self.sentinel, "sentinel column missing");
                }
                Err(err) => {
                    tracing::debug!(header_row, error = %err, "header attempt failed");
                }
            }
        }

        tracing::warn!(
            max_header_rows = self.max_header_rows,
            sentinel = %self.sentinel,
            "no header row carried the sentinel column; falling back to row 0"
        );
        parse_attempt(source, 0).map_err(AttendanceError::Ingestion)
    }

    /// Entry point for sources that cannot seek, such as an upload body
    /// already held in memory.
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<AttendanceTable> {
        self.read(&mut Cursor::new(bytes))
    }

    pub fn read_path(&self, path: &Path) -> Result<AttendanceTable> {
        let file = File::open(path).map_err(|err| {
            AttendanceError::Ingestion(format!("cannot open {}: {err}", path.display()))
        })?;
        let mut reader = BufReader::new(file);
        let table = self.read(&mut reader)?;
        tracing::info!(
            path = %path.display(),
            rows = table.rows.len(),
            columns = table.columns.len(),
            "attendance source ingested"
        );
        Ok(table)
    }
}

/// Convenience wrapper using the default window and `Roll.No` sentinel.
pub fn read_attendance<R: Read + Seek>(source: &mut R) -> Result<AttendanceTable> {
    HeaderSniffer::default().read(source)
}

pub fn read_attendance_path(path: &Path) -> Result<AttendanceTable> {
    HeaderSniffer::default().read_path(path)
}

fn parse_attempt<R: Read + Seek>(
    source: &mut R,
    header_row: usize,
) -> std::result::Result<AttendanceTable, String> {
    source
        .seek(SeekFrom::Start(0))
        .map_err(|err| format!("cannot rewind source: {err}"))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(&mut *source);

    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for (index, result) in reader.byte_records().enumerate() {
        let record = result.map_err(|err| err.to_string())?;
        if index < header_row {
            continue;
        }
        let record = csv::StringRecord::from_byte_record(record)
            .map_err(|err| format!("line {}: {err}", index + 1))?;

        match &columns {
            None => columns = Some(normalize_header(&record)),
            Some(header) => {
                if record.len() > header.len() {
                    return Err(format!(
                        "expected {} fields in line {}, saw {}",
                        header.len(),
                        index + 1,
                        record.len()
                    ));
                }
                let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
                cells.resize(header.len(), String::new());
                rows.push(cells);
            }
        }
    }

    let columns = columns.ok_or_else(|| format!("no row available at header offset {header_row}"))?;
    Ok(AttendanceTable { columns, rows })
}

fn normalize_header(record: &csv::StringRecord) -> Vec<String> {
    let mut columns: Vec<String> = Vec::with_capacity(record.len());
    for (index, raw) in record.iter().enumerate() {
        let trimmed = raw.trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {index}")
        } else {
            trimmed.to_string()
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while columns.contains(&name) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        columns.push(name);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const BODY: &str = "Roll.No,Maths,Physics,Total,Percent\nS1,80,70,40,75\nS2,60,50,40,55.5\n";

    fn with_junk(rows: usize) -> Cursor<Vec<u8>> {
        let mut text = String::new();
        for i in 0..rows {
            text.push_str(&format!("Attendance export line {i},,,,\n"));
        }
        text.push_str(BODY);
        Cursor::new(text.into_bytes())
    }

    #[test]
    fn header_found_behind_leading_rows() {
        let clean = read_attendance(&mut with_junk(0)).unwrap();
        for junk in 1..DEFAULT_MAX_HEADER_ROWS {
            let table = read_attendance(&mut with_junk(junk)).unwrap();
            assert_eq!(table, clean, "junk rows: {junk}");
        }
        assert_eq!(clean.columns[0], "Roll.No");
        assert_eq!(clean.rows.len(), 2);
    }

    #[test]
    fn falls_back_to_first_row_outside_window() {
        let table = read_attendance(&mut with_junk(DEFAULT_MAX_HEADER_ROWS)).unwrap();
        assert!(!table.has_column("Roll.No"));
        assert_eq!(table.columns[0], "Attendance export line 0");
        assert_eq!(table.columns[1], "Unnamed: 1");
    }

    #[test]
    fn fallback_parse_failure_surfaces() {
        let mut text = String::new();
        for i in 0..DEFAULT_MAX_HEADER_ROWS {
            text.push_str(&format!("Title {i}\n"));
        }
        text.push_str(BODY);
        let err = read_attendance(&mut Cursor::new(text.into_bytes())).unwrap_err();
        assert!(matches!(err, AttendanceError::Ingestion(_)));
    }

    #[test]
    fn header_names_are_trimmed() {
        let mut source = Cursor::new(b"  Roll.No , Percent \nS1,80\n".to_vec());
        let table = read_attendance(&mut source).unwrap();
        assert_eq!(table.columns, vec!["Roll.No", "Percent"]);
    }

    #[test]
    fn merged_title_rows_with_extra_cells_are_skipped() {
        let text = "Semester 5,,,,,,\n,,Attendance,,,,\nRoll.No,Percent\nS1,80\n";
        let table = read_attendance(&mut Cursor::new(text.as_bytes().to_vec())).unwrap();
        assert_eq!(table.columns, vec!["Roll.No", "Percent"]);
        assert_eq!(table.rows, vec![vec!["S1".to_string(), "80".to_string()]]);
    }

    #[test]
    fn wide_data_row_fails_that_attempt_only() {
        // With header row 0 the second line has too many fields; row 1 works.
        let text = "Report\nRoll.No,Percent\nS1,80\n";
        let table = read_attendance(&mut Cursor::new(text.as_bytes().to_vec())).unwrap();
        assert_eq!(table.columns, vec!["Roll.No", "Percent"]);
    }

    #[test]
    fn short_rows_are_padded() {
        let text = "Roll.No,Maths,Physics\nS1,P\n";
        let table = read_attendance(&mut Cursor::new(text.as_bytes().to_vec())).unwrap();
        assert_eq!(table.rows[0], vec!["S1", "P", ""]);
    }

    #[test]
    fn blank_and_duplicate_header_cells_are_named() {
        let text = "Roll.No,,Maths,Maths\nS1,1,P,A\n";
        let table = read_attendance(&mut Cursor::new(text.as_bytes().to_vec())).unwrap();
        assert_eq!(table.columns, vec!["Roll.No", "Unnamed: 1", "Maths", "Maths.1"]);
    }

    #[test]
    fn empty_source_is_an_ingestion_error() {
        let err = read_attendance(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, AttendanceError::Ingestion(_)));
    }

    #[test]
    fn invalid_utf8_header_is_skipped() {
        let mut bytes = vec![0xff, 0xfe, b'\n'];
        bytes.extend_from_slice(b"Roll.No,Percent\nS1,80\n");
        let table = read_attendance(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(table.columns, vec!["Roll.No", "Percent"]);
    }

    #[test]
    fn in_memory_bytes_are_sniffed_like_files() {
        let text = "Class register,,,,\n".to_string() + BODY;
        let table = HeaderSniffer::default().read_bytes(text.as_bytes()).unwrap();
        assert_eq!(table, read_attendance(&mut with_junk(0)).unwrap());

        let err = HeaderSniffer::default().read_bytes(b"").unwrap_err();
        assert!(matches!(err, AttendanceError::Ingestion(_)));
    }

    #[test]
    fn missing_file_is_an_ingestion_error() {
        let err = read_attendance_path(Path::new("/nonexistent/attendance.csv")).unwrap_err();
        assert!(matches!(err, AttendanceError::Ingestion(_)));
    }
}
