//! Storage of genomic elements with a binned index for region queries.

pub mod bins;
pub mod io;
pub mod overlap;
pub mod record;

use std::collections::BTreeSet;

use indexmap::IndexMap;

use self::{bins::BinIndex, overlap::Overlap, record::GenomicElement};

/// Records of one element category keyed by identifier, plus their index.
#[derive(Debug, Clone)]
pub struct ElementSet<R> {
    /// Records in insertion order, keyed by identifier.
    records: IndexMap<String, R>,
    /// Binned index referring to positions in `records`.
    index: BinIndex,
}

impl<R: GenomicElement> ElementSet<R> {
    /// Create an empty set backed by `index`.
    fn new(index: BinIndex) -> Self {
        Self {
            records: IndexMap::new(),
            index,
        }
    }

    /// Create an empty set with an index of the given bin size.
    pub fn with_bin_size(bin_size: u64) -> Result<Self, anyhow::Error> {
        Ok(Self::new(BinIndex::new(bin_size)?))
    }

    /// Add `record`, checking the interval invariant.
    ///
    /// A record with an already known identifier replaces the previous one.
    pub fn insert(&mut self, record: R) -> Result<(), anyhow::Error> {
        record.validate()?;
        let (idx, previous) = self.records.insert_full(record.id().to_owned(), record);
        if previous.is_some() {
            tracing::warn!(
                "duplicate identifier {:?}, keeping last record",
                self.records[idx].id()
            );
        }
        let record = &self.records[idx];
        self.index
            .insert(record.chrom(), idx as u32, record.start(), record.end());
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    pub fn bin_size(&self) -> u64 {
        self.index.bin_size()
    }

    /// Records satisfying `overlap` against the query interval.
    ///
    /// Candidates come from the bins touched by `[start, end]` and are then
    /// checked against their real coordinates.
    pub fn query_records<'a, 'b>(
        &'a self,
        chrom: &'b str,
        start: i64,
        end: i64,
        overlap: Overlap,
    ) -> impl Iterator<Item = &'a R> + 'b
    where
        'a: 'b,
    {
        self.index
            .candidates(chrom, start, end)
            .into_iter()
            .map(move |idx| &self.records[idx as usize])
            .filter(move |record| {
                record.chrom() == chrom && overlap.matches(start, end, record.start(), record.end())
            })
    }

    /// Identifiers of records satisfying `overlap` against the query interval.
    pub fn query(&self, chrom: &str, start: i64, end: i64, overlap: Overlap) -> BTreeSet<String> {
        self.query_records(chrom, start, end, overlap)
            .map(|record| record.id().to_owned())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::{
        overlap::Overlap,
        record::{GenomicElement, Region},
        ElementSet,
    };

    fn region(id: &str, chrom: &str, start: i64, end: i64) -> Region {
        Region {
            id: id.into(),
            chrom: chrom.into(),
            start,
            end,
        }
    }

    /// Small pseudo-random generator so the property tests need no extra crate.
    fn lcg(state: &mut u64) -> i64 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((*state >> 33) % 5_000) as i64
    }

    fn random_regions(seed: u64, n: usize) -> Vec<Region> {
        let mut state = seed;
        (0..n)
            .map(|i| {
                let a = lcg(&mut state);
                let len = lcg(&mut state) % 300;
                let chrom = if i % 3 == 0 { "chr2" } else { "chr1" };
                region(&format!("r{}", i), chrom, a, a + len)
            })
            .collect()
    }

    fn build(bin_size: u64, regions: &[Region]) -> Result<ElementSet<Region>, anyhow::Error> {
        let mut set = ElementSet::with_bin_size(bin_size)?;
        for r in regions {
            set.insert(r.clone())?;
        }
        Ok(set)
    }

    fn brute_force(
        regions: &[Region],
        chrom: &str,
        start: i64,
        end: i64,
        overlap: Overlap,
    ) -> BTreeSet<String> {
        regions
            .iter()
            .filter(|r| r.chrom == chrom && overlap.matches(start, end, r.start, r.end))
            .map(|r| r.id.clone())
            .collect()
    }

    #[test]
    fn insert_rejects_malformed() -> Result<(), anyhow::Error> {
        let mut set = ElementSet::with_bin_size(10)?;
        assert!(set.insert(region("x", "chr1", 10, 5)).is_err());
        assert!(set.is_empty());
        Ok(())
    }

    #[tracing_test::traced_test]
    #[test]
    fn duplicate_identifier_replaces_record() -> Result<(), anyhow::Error> {
        let mut set = ElementSet::with_bin_size(10)?;
        set.insert(region("x", "chr1", 0, 5))?;
        set.insert(region("x", "chr1", 50, 55))?;
        assert_eq!(set.len(), 1);
        assert!(logs_contain("duplicate identifier"));
        assert_eq!(set.get("x").map(|r| r.start()), Some(50));
        assert!(set.query("chr1", 0, 5, Overlap::Any).is_empty());
        assert_eq!(
            set.query("chr1", 52, 53, Overlap::Any),
            BTreeSet::from(["x".to_string()])
        );
        Ok(())
    }

    #[test]
    fn query_on_unknown_chromosome_is_empty() -> Result<(), anyhow::Error> {
        let set = build(10, &[region("a", "chr1", 0, 10)])?;
        assert!(set.query("chrY", 0, 10, Overlap::Any).is_empty());
        Ok(())
    }

    #[test]
    fn zero_length_query_hits_enclosing_element() -> Result<(), anyhow::Error> {
        let set = build(
            1_000_000,
            &[region("d1", "chr1", 0, 12), region("d2", "chr1", 15, 37)],
        )?;
        assert_eq!(
            set.query("chr1", 9, 9, Overlap::Any),
            BTreeSet::from(["d1".to_string()])
        );
        assert!(set.query("chr1", 12, 12, Overlap::Any).is_empty());
        Ok(())
    }

    #[rstest::rstest]
    #[case(Overlap::Any)]
    #[case(Overlap::Complete)]
    #[case(Overlap::Included)]
    #[case(Overlap::Percent50)]
    #[case(Overlap::Reciprocal50)]
    fn query_matches_brute_force_for_any_bin_size(
        #[case] overlap: Overlap,
    ) -> Result<(), anyhow::Error> {
        let regions = random_regions(42, 200);
        let sets = [1, 7, 100, 1_000, 1_000_000]
            .iter()
            .map(|bin_size| build(*bin_size, &regions))
            .collect::<Result<Vec<_>, _>>()?;

        let mut state = 7;
        for _ in 0..100 {
            let start = lcg(&mut state) - 200;
            let end = start + lcg(&mut state) % 1_000;
            let expected = brute_force(&regions, "chr1", start, end, overlap);
            for set in &sets {
                let actual = set.query("chr1", start, end, overlap);
                assert_eq!(actual, expected, "bin size {}", set.bin_size());
            }
        }

        Ok(())
    }
}
