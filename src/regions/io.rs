//! Loading of BED-like, tab-separated element files.

use std::{collections::HashSet, path::Path, time::Instant};

use thousands::Separable;

use super::{
    record::{Cnv, CnvScores, CnvType, Gene, Region},
    ElementSet,
};
use crate::common::tsv_reader;

/// Column of the gene file holding the `;`-separated phenotype terms.
pub const GENE_TERMS_COLUMN: usize = 5;

/// Split the `;`-separated column `col` of `record`; missing or empty
/// columns yield an empty list.
fn split_column(record: &csv::StringRecord, col: usize) -> Vec<String> {
    record
        .get(col)
        .map(|value| {
            value
                .split(';')
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse chromosome, begin, and end position from the first three columns.
fn parse_interval(
    record: &csv::StringRecord,
    path: &Path,
) -> Result<(String, i64, i64), anyhow::Error> {
    let line = record.position().map(|p| p.line()).unwrap_or_default();
    let field = |col: usize| {
        record.get(col).ok_or_else(|| {
            anyhow::anyhow!("{:?}, line {}: missing column {}", path, line, col + 1)
        })
    };
    let parse_pos = |col: usize| -> Result<i64, anyhow::Error> {
        let value = field(col)?;
        value.trim().parse::<i64>().map_err(|e| {
            anyhow::anyhow!("{:?}, line {}: invalid position {:?}: {}", path, line, value, e)
        })
    };
    Ok((field(0)?.to_owned(), parse_pos(1)?, parse_pos(2)?))
}

/// Drive `parse` over all records of `path` and insert them into a new set.
fn load_set<R, F>(path: &Path, bin_size: u64, mut parse: F) -> Result<ElementSet<R>, anyhow::Error>
where
    R: super::record::GenomicElement,
    F: FnMut(&csv::StringRecord) -> Result<Option<R>, anyhow::Error>,
{
    let before_loading = Instant::now();
    let mut result = ElementSet::with_bin_size(bin_size)?;
    let mut reader = tsv_reader(path)?;
    for record in reader.records() {
        let record =
            record.map_err(|e| anyhow::anyhow!("problem reading {:?}: {}", path, e))?;
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        if let Some(element) = parse(&record)? {
            result
                .insert(element)
                .map_err(|e| anyhow::anyhow!("problem loading {:?}: {}", path, e))?;
        }
    }
    tracing::debug!(
        "... done loading {} records from {:?} in {:?}",
        result.len().separate_with_commas(),
        path,
        before_loading.elapsed()
    );
    Ok(result)
}

/// Load plain regions (domains, boundaries, enhancers).
///
/// Files with only three columns get identifiers of the form
/// `chrom:start-end`.
#[tracing::instrument]
pub fn load_regions(path: &Path, bin_size: u64) -> Result<ElementSet<Region>, anyhow::Error> {
    tracing::debug!("loading regions from {:?}...", path);
    load_set(path, bin_size, |record| {
        let (chrom, start, end) = parse_interval(record, path)?;
        let id = match record.get(3) {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => format!("{}:{}-{}", chrom, start, end),
        };
        Ok(Some(Region {
            id,
            chrom,
            start,
            end,
        }))
    })
}

/// Load the genes whose identifier is in `subset`.
#[tracing::instrument(skip(subset))]
pub fn load_genes(
    path: &Path,
    bin_size: u64,
    subset: &HashSet<String>,
) -> Result<ElementSet<Gene>, anyhow::Error> {
    tracing::debug!("loading {} genes from {:?}...", subset.len(), path);
    load_set(path, bin_size, |record| {
        let id = record
            .get(3)
            .ok_or_else(|| anyhow::anyhow!("{:?}: gene record without identifier", path))?;
        if !subset.contains(id) {
            return Ok(None);
        }
        let (chrom, start, end) = parse_interval(record, path)?;
        Ok(Some(Gene {
            id: id.to_owned(),
            chrom,
            start,
            end,
            terms: split_column(record, GENE_TERMS_COLUMN),
        }))
    })
}

/// Load CNVs with type, phenotype terms, scores and target terms.
#[tracing::instrument]
pub fn load_cnvs(path: &Path, bin_size: u64) -> Result<ElementSet<Cnv>, anyhow::Error> {
    tracing::debug!("loading CNVs from {:?}...", path);
    load_set(path, bin_size, |record| {
        let (chrom, start, end) = parse_interval(record, path)?;
        let id = record
            .get(3)
            .ok_or_else(|| anyhow::anyhow!("{:?}: CNV record without identifier", path))?;
        let first = |col: usize| {
            split_column(record, col)
                .into_iter()
                .next()
                .unwrap_or_default()
        };
        Ok(Some(Cnv {
            id: id.to_owned(),
            chrom,
            start,
            end,
            cnv_types: split_column(record, 4)
                .iter()
                .map(|s| s.parse::<CnvType>())
                .collect::<Result<Vec<_>, _>>()?,
            terms: split_column(record, 5),
            scores: CnvScores {
                overlap: first(6),
                adjacent: first(7),
                dist: first(8),
            },
            target_terms: split_column(record, 9),
        }))
    })
}

#[cfg(test)]
mod test {
    use std::{collections::HashSet, path::Path};

    use pretty_assertions::assert_eq;

    use crate::regions::record::{CnvType, GenomicElement};

    #[test]
    fn load_regions_with_ids() -> Result<(), anyhow::Error> {
        let domains = super::load_regions(Path::new("tests/barrier/toy/domains.tab"), 10)?;
        assert_eq!(domains.len(), 2);
        let d2 = domains.get("d2").expect("d2 missing");
        assert_eq!((d2.chrom(), d2.start(), d2.end()), ("chr1", 15, 37));
        Ok(())
    }

    #[test]
    fn load_regions_three_columns() -> Result<(), anyhow::Error> {
        let boundaries =
            super::load_regions(Path::new("tests/barrier/toy/boundaries_bed3.bed"), 10)?;
        assert_eq!(
            boundaries.iter().map(|b| b.id.clone()).collect::<Vec<_>>(),
            vec!["chr1:12-15".to_string()]
        );
        Ok(())
    }

    #[test]
    fn load_regions_malformed_is_fatal() {
        let res = super::load_regions(Path::new("tests/barrier/malformed.bed"), 10);
        let msg = format!("{}", res.unwrap_err());
        assert!(msg.contains("start > end"), "{}", msg);
    }

    #[test]
    fn load_regions_missing_file() {
        assert!(super::load_regions(Path::new("tests/barrier/no-such-file.bed"), 10).is_err());
    }

    #[test]
    fn load_genes_subset() -> Result<(), anyhow::Error> {
        let subset = HashSet::from(["A".to_string(), "D".to_string(), "Z".to_string()]);
        let genes = super::load_genes(Path::new("tests/barrier/toy/genes.tab"), 10, &subset)?;
        assert_eq!(genes.len(), 2);
        assert_eq!(
            genes.get("A").map(|g| g.terms.clone()),
            Some(vec!["EP:04".to_string(), "EP:05".to_string()])
        );

        let none = super::load_genes(
            Path::new("tests/barrier/toy/genes.tab"),
            10,
            &HashSet::new(),
        )?;
        assert!(none.is_empty());
        Ok(())
    }

    #[test]
    fn load_cnvs() -> Result<(), anyhow::Error> {
        let cnvs = super::load_cnvs(Path::new("tests/barrier/toy/cnvs.tab"), 10)?;
        assert_eq!(cnvs.len(), 5);

        let cnv1 = cnvs.get("cnv1").expect("cnv1 missing");
        assert_eq!(cnv1.cnv_types, vec![CnvType::Loss]);
        assert_eq!(cnv1.terms, vec!["EP:06".to_string()]);
        assert_eq!(cnv1.scores.adjacent, "1.2");
        assert_eq!(cnv1.target_term(), Some("EP:05"));

        let cnv4 = cnvs.get("cnv4").expect("cnv4 missing");
        assert_eq!(cnv4.cnv_types, vec![CnvType::Gain]);
        assert!(!cnv4.has_terms());

        Ok(())
    }

    #[test]
    fn load_cnvs_empty_terms_and_type_lists() -> Result<(), anyhow::Error> {
        let cnvs = super::load_cnvs(Path::new("tests/barrier/cnvs_edge.tab"), 10)?;

        let c1 = cnvs.get("c1").expect("c1 missing");
        assert_eq!(c1.terms, Vec::<String>::new());
        assert!(c1.has_terms());

        let c2 = cnvs.get("c2").expect("c2 missing");
        assert_eq!(
            c2.cnv_types,
            vec![CnvType::Other("inversion".into()), CnvType::Loss]
        );
        assert_eq!(c2.cnv_type(), Some(&CnvType::Other("inversion".into())));
        assert!(c2.is_loss_or_gain());

        Ok(())
    }
}
