use std::collections::HashSet;

use rand::Rng;

use crate::data::{
    folds::FoldTable,
    normalize::{normalize, NormStats},
    shuffle::shuffle_samples,
    tensor::{Dataset, Samples, SubjectId},
};
use crate::error::{CcnnError, Result};

/// Train and test data of one cross-validation fold.
#[derive(Debug, Clone)]
pub struct FoldSplit {
    pub fold: usize,
    /// Normalized with its own statistics and shuffled once.
    pub train: Samples,
    /// Normalized with its own statistics, in dataset order.
    pub test: Samples,
    pub test_subjects: HashSet<SubjectId>,
    pub train_stats: NormStats,
    pub test_stats: NormStats,
}

/// Builds fold `fold`: every instance of a test subject goes to the test
/// split, everything else to the training split.
pub fn assemble_fold<R: Rng + ?Sized>(
    fold: usize,
    table: &FoldTable,
    dataset: &Dataset,
    rng: &mut R,
) -> Result<FoldSplit> {
    let test_subjects = table.test_subjects(fold)?;

    let (test_idx, train_idx): (Vec<usize>, Vec<usize>) =
        (0..dataset.len()).partition(|&i| test_subjects.contains(&dataset.subjects[i]));

    if test_idx.is_empty() {
        return Err(CcnnError::EmptySplit { fold, which: "test" });
    }
    if train_idx.is_empty() {
        return Err(CcnnError::EmptySplit { fold, which: "train" });
    }

    let mut test = dataset.samples.select(&test_idx);
    let test_stats = normalize(test.data.values_mut());

    let mut train = dataset.samples.select(&train_idx);
    let train_stats = normalize(train.data.values_mut());
    shuffle_samples(&mut train, rng);

    for (which, stats) in [("train", &train_stats), ("test", &test_stats)] {
        if stats.scale.is_none() {
            log::warn!("Fold {fold}: {which} data is constant; centered without scaling");
        }
    }

    Ok(FoldSplit { fold, train, test, test_subjects, train_stats, test_stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tensor::ConnTensor;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    /// `subjects` scans per subject, subject ids 100.., matrix side 3.
    fn dataset(subjects: u64, scans: usize) -> Dataset {
        let n = subjects as usize * scans;
        let data = (0..n * 9).map(|v| ((v * 7919) % 101) as f64).collect();
        let labels = (0..n).map(|i| (i / scans) as f64 + 20.0).collect();
        let ids = (0..n).map(|i| SubjectId(100 + (i / scans) as u64)).collect();
        Dataset::new(ConnTensor::new(n, 3, data).unwrap(), labels, ids).unwrap()
    }

    #[test]
    fn splits_are_subject_disjoint_and_complete() {
        let ds = dataset(7, 3);
        let mut rng = StdRng::seed_from_u64(5);
        let table = FoldTable::build(3, &ds.subjects, &mut rng).unwrap();

        for fold in 0..3 {
            let split = assemble_fold(fold, &table, &ds, &mut rng).unwrap();
            assert_eq!(split.train.len() + split.test.len(), ds.len());
            assert_eq!(split.test.len(), split.test_subjects.len() * 3);
            // labels encode the subject, so label sets must not overlap
            for label in &split.train.labels {
                assert!(!split.test.labels.contains(label));
            }
        }
    }

    #[test]
    fn each_split_is_normalized_on_its_own() {
        let ds = dataset(6, 2);
        let mut rng = StdRng::seed_from_u64(8);
        let table = FoldTable::build(2, &ds.subjects, &mut rng).unwrap();
        let split = assemble_fold(1, &table, &ds, &mut rng).unwrap();

        for s in [&split.train, &split.test] {
            let v = s.data.values();
            let mean = v.iter().sum::<f64>() / v.len() as f64;
            let max_abs = v.iter().fold(0.0f64, |m, x| m.max(x.abs()));
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(max_abs, 1.0, epsilon = 1e-12);
        }
        assert_ne!(split.train_stats, split.test_stats);
    }

    #[test]
    fn test_split_keeps_dataset_order() {
        let ds = dataset(4, 2);
        let mut rng = StdRng::seed_from_u64(3);
        let table = FoldTable::build(2, &ds.subjects, &mut rng).unwrap();
        let split = assemble_fold(0, &table, &ds, &mut rng).unwrap();
        let mut sorted = split.test.labels.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(split.test.labels, sorted);
    }

    #[test]
    fn fold_with_only_absent_subjects_is_rejected() {
        let ds = dataset(2, 2);
        // fold 1 names a subject that has no scans
        let table = FoldTable::from_rows(
            2,
            vec![vec![Some(SubjectId(100)), Some(SubjectId(999))], vec![Some(SubjectId(101)), None]],
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            assemble_fold(1, &table, &ds, &mut rng),
            Err(CcnnError::EmptySplit { fold: 1, which: "test" })
        ));
        assert!(matches!(
            assemble_fold(0, &table, &ds, &mut rng),
            Err(CcnnError::EmptySplit { fold: 0, which: "train" })
        ));
    }
}
