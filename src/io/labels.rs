use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::data::tensor::SubjectId;
use crate::error::{CcnnError, Result};

/// Which columns of a label file hold what (0-based).
///
/// The in-house files carry the subject id in column 0 and age in column 2;
/// the public pretraining files have no subject column and age in column 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelColumns {
    pub subject: Option<usize>,
    pub label: usize,
    #[serde(default)]
    pub has_header: bool,
}

impl Default for LabelColumns {
    fn default() -> Self {
        LabelColumns { subject: Some(0), label: 2, has_header: false }
    }
}

/// Labels of every instance, plus subject ids when the file has them.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    pub labels: Vec<f64>,
    pub subjects: Option<Vec<SubjectId>>,
}

pub fn read_labels(path: &Path, columns: &LabelColumns) -> Result<LabelTable> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(columns.has_header)
        .trim(csv::Trim::All)
        .from_path(path)?;
    parse_labels(reader, columns).map_err(|err| match err {
        CcnnError::InvalidConfig(reason) => CcnnError::Format { path: path.to_path_buf(), reason },
        other => other,
    })
}

fn parse_labels<R: std::io::Read>(mut reader: csv::Reader<R>, columns: &LabelColumns) -> Result<LabelTable> {
    let mut labels = Vec::new();
    let mut subjects = columns.subject.map(|_| Vec::new());

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        labels.push(numeric_cell(&record, columns.label, row)?);

        if let (Some(col), Some(ids)) = (columns.subject, subjects.as_mut()) {
            let raw = numeric_cell(&record, col, row)?;
            // ids are written as floats by the tools that produce these files
            if raw < 0.0 || raw.fract() != 0.0 || raw > u64::MAX as f64 {
                return Err(CcnnError::InvalidConfig(format!(
                    "row {row}: subject id {raw} is not a non-negative integer"
                )));
            }
            ids.push(SubjectId(raw as u64));
        }
    }

    Ok(LabelTable { labels, subjects })
}

fn numeric_cell(record: &csv::StringRecord, col: usize, row: usize) -> Result<f64> {
    let cell = record
        .get(col)
        .ok_or_else(|| CcnnError::InvalidConfig(format!("row {row}: no column {col}")))?;
    cell.parse::<f64>()
        .map_err(|_| CcnnError::InvalidConfig(format!("row {row}: column {col} value '{cell}' is not numeric")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, columns: &LabelColumns) -> Result<LabelTable> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(columns.has_header)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        parse_labels(reader, columns)
    }

    #[test]
    fn reads_subject_and_label_columns() {
        let table = parse("12, 1, 23.5\n12, 2, 23.5\n7.0, 1, 61\n", &LabelColumns::default()).unwrap();
        assert_eq!(table.labels, vec![23.5, 23.5, 61.0]);
        assert_eq!(table.subjects, Some(vec![SubjectId(12), SubjectId(12), SubjectId(7)]));
    }

    #[test]
    fn subject_column_is_optional() {
        let columns = LabelColumns { subject: None, label: 1, has_header: true };
        let table = parse("id,age\n1,30\n2,41\n", &columns).unwrap();
        assert_eq!(table.labels, vec![30.0, 41.0]);
        assert!(table.subjects.is_none());
    }

    #[test]
    fn bad_cells_are_reported() {
        assert!(parse("1,2\n", &LabelColumns::default()).is_err());
        assert!(parse("1,2,old\n", &LabelColumns::default()).is_err());
        assert!(parse("1.5,2,30\n", &LabelColumns::default()).is_err());
    }

    #[test]
    fn file_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        std::fs::write(&path, "1,2,x\n").unwrap();
        assert!(matches!(read_labels(&path, &LabelColumns::default()), Err(CcnnError::Format { .. })));
    }
}
