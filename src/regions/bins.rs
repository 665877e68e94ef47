//! Coarse binned index over genomic positions.
//!
//! Bin `i` covers `[i * bin_size, (i + 1) * bin_size)`.  An element spanning
//! `[start, end]` is registered in every bin from `start / bin_size` to
//! `end / bin_size`, both inclusive.  Bin membership is only a pre-filter;
//! callers must check real coordinates afterwards.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use indexmap::IndexMap;

use crate::err::AnalysisError;

/// Default bin size of 1 Mbp.
pub const DEFAULT_BIN_SIZE: u64 = 1_000_000;

/// Per-chromosome bins holding element indices.
#[derive(Debug, Clone)]
pub struct BinIndex {
    /// Width of each bin.
    bin_size: u64,
    /// Bins, by chromosome label.
    bins: IndexMap<String, Vec<BTreeSet<u32>>>,
}

impl BinIndex {
    /// Construct an empty index with the given bin size.
    pub fn new(bin_size: u64) -> Result<Self, AnalysisError> {
        if bin_size == 0 {
            return Err(AnalysisError::InvalidBinSize);
        }
        Ok(Self {
            bin_size,
            bins: IndexMap::new(),
        })
    }

    pub fn bin_size(&self) -> u64 {
        self.bin_size
    }

    /// Bin number for `pos`, negative positions fall into bin 0.
    fn bin_of(&self, pos: i64) -> usize {
        (pos.max(0) as u64 / self.bin_size) as usize
    }

    /// Bins touched by the interval `[start, end]`.
    pub fn bins_touching(&self, start: i64, end: i64) -> RangeInclusive<usize> {
        self.bin_of(start)..=self.bin_of(end)
    }

    /// Register element `idx` with all bins its span touches.
    pub fn insert(&mut self, chrom: &str, idx: u32, start: i64, end: i64) {
        let range = self.bins_touching(start, end);
        let bins = self.bins.entry(chrom.to_owned()).or_default();
        if bins.len() <= *range.end() {
            bins.resize_with(*range.end() + 1, BTreeSet::new);
        }
        for bin in range {
            bins[bin].insert(idx);
        }
    }

    /// Indices of all elements registered in bins touched by `[start, end]`.
    ///
    /// Unknown chromosomes and bins past the end yield nothing.
    pub fn candidates(&self, chrom: &str, start: i64, end: i64) -> BTreeSet<u32> {
        let mut result = BTreeSet::new();
        if let Some(bins) = self.bins.get(chrom) {
            for bin in self.bins_touching(start, end) {
                match bins.get(bin) {
                    Some(idxs) => result.extend(idxs.iter().copied()),
                    None => break,
                }
            }
        }
        result
    }

    /// Number of bins allocated for `chrom`.
    #[cfg(test)]
    fn bin_count(&self, chrom: &str) -> usize {
        self.bins.get(chrom).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::BinIndex;

    #[rstest::rstest]
    #[case(0, 0, 0..=0)]
    #[case(5, 5, 0..=0)]
    #[case(9, 10, 0..=1)]
    #[case(25, 41, 2..=4)]
    #[case(-15, 3, 0..=0)]
    fn bins_touching(
        #[case] start: i64,
        #[case] end: i64,
        #[case] expected: std::ops::RangeInclusive<usize>,
    ) -> Result<(), anyhow::Error> {
        let index = BinIndex::new(10)?;
        assert_eq!(index.bins_touching(start, end), expected);
        Ok(())
    }

    #[test]
    fn zero_bin_size_is_rejected() {
        assert!(BinIndex::new(0).is_err());
    }

    #[test]
    fn insert_extends_but_never_shrinks() -> Result<(), anyhow::Error> {
        let mut index = BinIndex::new(10)?;
        index.insert("chr1", 0, 35, 41);
        assert_eq!(index.bin_count("chr1"), 5);
        index.insert("chr1", 1, 0, 3);
        assert_eq!(index.bin_count("chr1"), 5);
        assert_eq!(index.bin_count("chr2"), 0);
        Ok(())
    }

    #[test]
    fn candidates() -> Result<(), anyhow::Error> {
        let mut index = BinIndex::new(10)?;
        index.insert("chr1", 0, 0, 12);
        index.insert("chr1", 1, 15, 37);
        index.insert("chr2", 2, 0, 5);

        assert_eq!(index.candidates("chr1", 5, 5), BTreeSet::from([0]));
        assert_eq!(index.candidates("chr1", 12, 16), BTreeSet::from([0, 1]));
        assert_eq!(index.candidates("chr1", 100, 200), BTreeSet::new());
        assert_eq!(index.candidates("chrX", 0, 5), BTreeSet::new());
        assert_eq!(index.candidates("chr2", -20, 1), BTreeSet::from([2]));

        Ok(())
    }
}
