use std::collections::HashSet;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::data::tensor::SubjectId;
use crate::error::{CcnnError, Result};
use crate::io::json;

/// Assignment of subjects to cross-validation folds.
///
/// `rows = ceil(S / k)` by `k` cells, stored row-major; column `f` holds the
/// test subjects of fold `f`. When `S` is not a multiple of `k` the trailing
/// cells are `None`. Padding is an absent value rather than a reserved id,
/// so it can never match a real subject (including id 0).
///
/// The table is persisted so that a baseline run and a transfer run can be
/// compared on identical folds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldTable {
    num_folds: usize,
    cells: Vec<Vec<Option<SubjectId>>>,
}

impl FoldTable {
    /// Shuffles the unique ids of `subjects` and deals them into
    /// `num_folds` columns.
    ///
    /// Ids are deduplicated and sorted before shuffling, so the same seed
    /// yields the same table regardless of instance order.
    pub fn build<R: Rng + ?Sized>(num_folds: usize, subjects: &[SubjectId], rng: &mut R) -> Result<FoldTable> {
        if num_folds == 0 {
            return Err(CcnnError::InvalidConfig("num_folds must be at least 1".into()));
        }
        let mut unique: Vec<SubjectId> = subjects.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() < num_folds {
            return Err(CcnnError::TooFewSubjects { subjects: unique.len(), folds: num_folds });
        }

        unique.shuffle(rng);

        let rows = unique.len().div_ceil(num_folds);
        let mut padded: Vec<Option<SubjectId>> = unique.into_iter().map(Some).collect();
        padded.resize(rows * num_folds, None);

        let cells = padded.chunks(num_folds).map(<[_]>::to_vec).collect();
        Ok(FoldTable { num_folds, cells })
    }

    /// Rebuilds a table from explicit rows, validating it the same way a
    /// loaded table is validated.
    pub fn from_rows(num_folds: usize, cells: Vec<Vec<Option<SubjectId>>>) -> Result<FoldTable> {
        let table = FoldTable { num_folds, cells };
        table.validate()?;
        Ok(table)
    }

    pub fn num_folds(&self) -> usize {
        self.num_folds
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    /// Real test subjects of `fold`; padding cells are skipped.
    pub fn test_subjects(&self, fold: usize) -> Result<HashSet<SubjectId>> {
        if fold >= self.num_folds {
            return Err(CcnnError::FoldOutOfRange { fold, num_folds: self.num_folds });
        }
        Ok(self.cells.iter().filter_map(|row| row[fold]).collect())
    }

    /// Every real subject in the table.
    pub fn subjects(&self) -> impl Iterator<Item = SubjectId> + '_ {
        self.cells.iter().flatten().filter_map(|cell| *cell)
    }

    /// Checks the table shape and that every subject appears once.
    pub fn validate(&self) -> Result<()> {
        if self.num_folds == 0 {
            return Err(CcnnError::MalformedFoldTable("zero folds".into()));
        }
        if let Some((r, row)) = self.cells.iter().enumerate().find(|(_, row)| row.len() != self.num_folds) {
            return Err(CcnnError::MalformedFoldTable(format!(
                "row {r} has {} cells, expected {}",
                row.len(),
                self.num_folds
            )));
        }
        let mut seen = HashSet::new();
        for id in self.subjects() {
            if !seen.insert(id) {
                return Err(CcnnError::MalformedFoldTable(format!("subject {id} appears more than once")));
            }
        }
        if seen.len() < self.num_folds {
            return Err(CcnnError::TooFewSubjects { subjects: seen.len(), folds: self.num_folds });
        }
        Ok(())
    }

    /// Checks that every id in `subjects` is assigned to a fold. A subject
    /// missing from the table would be trained on in every fold and never
    /// tested.
    pub fn covers(&self, subjects: &[SubjectId]) -> Result<()> {
        let assigned: HashSet<SubjectId> = self.subjects().collect();
        let mut missing: Vec<SubjectId> = subjects.iter().copied().filter(|id| !assigned.contains(id)).collect();
        missing.sort_unstable();
        missing.dedup();
        if missing.is_empty() {
            return Ok(());
        }
        let listed: Vec<String> = missing.iter().take(10).map(ToString::to_string).collect();
        let more = if missing.len() > 10 { format!(" and {} more", missing.len() - 10) } else { String::new() };
        Err(CcnnError::MalformedFoldTable(format!(
            "{} subject(s) of the dataset have no fold: {}{more}",
            missing.len(),
            listed.join(", ")
        )))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        json::save_json(self, path)
    }

    pub fn load_json(path: &Path) -> Result<FoldTable> {
        let table: FoldTable = json::load_json(path)?;
        table.validate()?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn ids(raw: &[u64]) -> Vec<SubjectId> {
        raw.iter().copied().map(SubjectId).collect()
    }

    #[test]
    fn columns_partition_the_unique_subjects() {
        let mut rng = StdRng::seed_from_u64(0);
        // 23 unique subjects with repeats, 5 folds -> 5 rows, 2 padding cells
        let subjects: Vec<SubjectId> = (0..23u64).flat_map(|s| [SubjectId(s), SubjectId(s)]).collect();
        let table = FoldTable::build(5, &subjects, &mut rng).unwrap();
        assert_eq!(table.rows(), 5);

        let mut union = HashSet::new();
        for f in 0..5 {
            let test = table.test_subjects(f).unwrap();
            assert!(test.len() == 4 || test.len() == 5);
            for id in test {
                assert!(union.insert(id), "{id} in two folds");
            }
        }
        assert_eq!(union, subjects.iter().copied().collect());
        assert_eq!(table.cells.iter().flatten().filter(|c| c.is_none()).count(), 2);
    }

    #[test]
    fn subject_zero_is_a_real_subject() {
        let mut rng = StdRng::seed_from_u64(1);
        let table = FoldTable::build(2, &ids(&[0, 1, 2]), &mut rng).unwrap();
        assert!(table.subjects().any(|s| s == SubjectId(0)));
        assert_eq!(table.subjects().count(), 3);
    }

    #[test]
    fn subjects_outside_the_table_are_reported() {
        let table = FoldTable::build(2, &ids(&[1, 2, 3, 4]), &mut StdRng::seed_from_u64(4)).unwrap();
        assert!(table.covers(&ids(&[4, 1, 1, 3])).is_ok());
        match table.covers(&ids(&[1, 6, 5, 6, 2])) {
            Err(CcnnError::MalformedFoldTable(msg)) => assert!(msg.contains("2 subject(s)") && msg.contains("5, 6"), "{msg}"),
            other => panic!("expected MalformedFoldTable, got {other:?}"),
        }
    }

    #[test]
    fn same_seed_same_table() {
        let a = FoldTable::build(3, &ids(&[5, 3, 9, 1, 7, 2]), &mut StdRng::seed_from_u64(9)).unwrap();
        let b = FoldTable::build(3, &ids(&[9, 1, 7, 2, 5, 3]), &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_degenerate_requests() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(FoldTable::build(0, &ids(&[1]), &mut rng), Err(CcnnError::InvalidConfig(_))));
        assert!(matches!(
            FoldTable::build(4, &ids(&[1, 1, 2, 3]), &mut rng),
            Err(CcnnError::TooFewSubjects { subjects: 3, folds: 4 })
        ));
        let table = FoldTable::build(2, &ids(&[1, 2]), &mut rng).unwrap();
        assert!(matches!(table.test_subjects(2), Err(CcnnError::FoldOutOfRange { .. })));
    }

    #[test]
    fn persisted_table_round_trips_and_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folds.json");
        let table = FoldTable::build(3, &ids(&[1, 2, 3, 4]), &mut StdRng::seed_from_u64(4)).unwrap();
        table.save_json(&path).unwrap();
        assert_eq!(FoldTable::load_json(&path).unwrap(), table);

        let dup = FoldTable::from_rows(2, vec![vec![Some(SubjectId(1)), Some(SubjectId(1))]]);
        assert!(matches!(dup, Err(CcnnError::MalformedFoldTable(_))));
        let ragged = FoldTable::from_rows(2, vec![vec![Some(SubjectId(1))]]);
        assert!(matches!(ragged, Err(CcnnError::MalformedFoldTable(_))));
    }
}
