//! Counting of candidate events per replicate.

use indexmap::IndexMap;

use super::annotate::CnvAnnotation;
use crate::{err::AnalysisError, regions::record::Cnv};

/// Number of boundary-count bins, the last one collects all higher counts.
pub const NR_BINS: usize = 6;

/// Labels of the scalar counters, in output order.
const SCALAR_COLUMNS: [&str; 9] = [
    "N",
    "TDBD_and_Mixed",
    "TDBD",
    "GDE",
    "no_data",
    "boundary",
    "EA_and_Mixed",
    "EA",
    "EA_no_boundary",
];

/// Header of the rates file.
pub fn header() -> Vec<String> {
    let mut result = SCALAR_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();
    for bin in 1..=NR_BINS {
        result.push(format!("N_bin_{}", bin));
        result.push(format!("TDBD_and_Mixed_bin_{}", bin));
        result.push(format!("TDBD_bin_{}", bin));
    }
    result
}

/// Event counts of a single replicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicateCounts {
    pub n: u64,
    pub tdbd_and_mixed: u64,
    pub tdbd: u64,
    pub gde: u64,
    pub no_data: u64,
    pub boundary: u64,
    pub ea_and_mixed: u64,
    pub ea: u64,
    pub ea_no_boundary: u64,
    pub n_bin: [u64; NR_BINS],
    pub tdbd_and_mixed_bin: [u64; NR_BINS],
    pub tdbd_bin: [u64; NR_BINS],
}

impl ReplicateCounts {
    /// Count `cnv` with its `annotation`.
    pub fn add(&mut self, cnv: &Cnv, annotation: &CnvAnnotation) -> Result<(), anyhow::Error> {
        let scores = cnv
            .scores
            .parse()
            .map_err(|e| anyhow::anyhow!("CNV {:?}: {}", cnv.id, e))?;
        let boundary = !annotation.boundaries.is_empty();
        let tdbd_candidate = annotation.tdbd.candidate;
        let ea_candidate = annotation.ea.candidate;
        let tdbd = tdbd_candidate && scores.adjacent > scores.overlap;
        let ea = ea_candidate && scores.dist > scores.overlap;

        self.n += 1;
        self.boundary += u64::from(boundary);
        self.tdbd_and_mixed += u64::from(tdbd_candidate);
        self.tdbd += u64::from(tdbd);
        self.gde += u64::from(!tdbd_candidate && scores.overlap > 0.0);
        self.no_data += u64::from(!tdbd_candidate && scores.overlap <= 0.0);
        self.ea_and_mixed += u64::from(ea_candidate);
        self.ea += u64::from(ea);
        self.ea_no_boundary += u64::from(ea && !boundary);

        let hits = annotation.boundaries.len();
        if hits > 0 {
            let bin = std::cmp::min(hits, NR_BINS) - 1;
            self.n_bin[bin] += 1;
            self.tdbd_and_mixed_bin[bin] += u64::from(tdbd_candidate);
            self.tdbd_bin[bin] += u64::from(tdbd);
        }
        Ok(())
    }

    /// Element-wise addition of `other`.
    pub fn merge(&mut self, other: &Self) {
        self.n += other.n;
        self.tdbd_and_mixed += other.tdbd_and_mixed;
        self.tdbd += other.tdbd;
        self.gde += other.gde;
        self.no_data += other.no_data;
        self.boundary += other.boundary;
        self.ea_and_mixed += other.ea_and_mixed;
        self.ea += other.ea;
        self.ea_no_boundary += other.ea_no_boundary;
        for i in 0..NR_BINS {
            self.n_bin[i] += other.n_bin[i];
            self.tdbd_and_mixed_bin[i] += other.tdbd_and_mixed_bin[i];
            self.tdbd_bin[i] += other.tdbd_bin[i];
        }
    }

    /// Counter values in the order of [`header`].
    pub fn values(&self) -> Vec<u64> {
        let mut result = vec![
            self.n,
            self.tdbd_and_mixed,
            self.tdbd,
            self.gde,
            self.no_data,
            self.boundary,
            self.ea_and_mixed,
            self.ea,
            self.ea_no_boundary,
        ];
        for i in 0..NR_BINS {
            result.extend([self.n_bin[i], self.tdbd_and_mixed_bin[i], self.tdbd_bin[i]]);
        }
        result
    }
}

/// How CNVs are split into replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replicates {
    /// Observed data, counting only CNVs of the phenotype under test.
    Single,
    /// Randomized data with identifiers `<a>_<b>_<n>`, `n` in `1..=count`.
    Randomized(usize),
}

/// Replicate number encoded in `id`, 1-based.
fn replicate_of(id: &str) -> Result<usize, AnalysisError> {
    let parts = id.split('_').collect::<Vec<_>>();
    match parts.as_slice() {
        [_, _, n] => match n.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(AnalysisError::InvalidReplicateId(id.to_owned())),
        },
        _ => Err(AnalysisError::InvalidReplicateId(id.to_owned())),
    }
}

impl Replicates {
    /// Detect replicates from CNV identifiers.
    ///
    /// Data is considered randomized if the first identifier has three
    /// `_`-separated parts; all identifiers must then carry a replicate
    /// number.
    pub fn detect<'a>(ids: impl IntoIterator<Item = &'a str>) -> Result<Self, AnalysisError> {
        let mut ids = ids.into_iter().peekable();
        match ids.peek() {
            Some(first) if first.split('_').count() == 3 => {
                let mut count = 0;
                for id in ids {
                    count = std::cmp::max(count, replicate_of(id)?);
                }
                Ok(Replicates::Randomized(count))
            }
            _ => Ok(Replicates::Single),
        }
    }

    /// Number of replicates.
    pub fn count(&self) -> usize {
        match self {
            Replicates::Single => 1,
            Replicates::Randomized(n) => *n,
        }
    }
}

/// Counts for all replicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rates {
    pub replicates: Vec<ReplicateCounts>,
}

impl Rates {
    /// Empty counts for `n` replicates.
    pub fn new(n: usize) -> Self {
        Self {
            replicates: vec![ReplicateCounts::default(); n],
        }
    }

    /// Count `cnvs` for one phenotype.
    pub fn for_phenotype<'a>(
        cnvs: impl IntoIterator<Item = &'a Cnv>,
        annotations: &IndexMap<String, CnvAnnotation>,
        replicates: Replicates,
    ) -> Result<Self, anyhow::Error> {
        let mut result = Self::new(replicates.count());
        for cnv in cnvs {
            let annotation = annotations
                .get(&cnv.id)
                .ok_or_else(|| anyhow::anyhow!("CNV {:?} was not annotated", cnv.id))?;
            let idx = match replicates {
                Replicates::Single if annotation.target_phenotype => 0,
                Replicates::Single => continue,
                Replicates::Randomized(_) => replicate_of(&cnv.id)? - 1,
            };
            let counts = result.replicates.get_mut(idx).ok_or_else(|| {
                anyhow::anyhow!("replicate of CNV {:?} is out of range", cnv.id)
            })?;
            counts.add(cnv, annotation)?;
        }
        Ok(result)
    }

    /// Element-wise addition of `other`, which must have the same replicates.
    pub fn aggregate(&mut self, other: &Rates) -> Result<(), anyhow::Error> {
        if self.replicates.len() != other.replicates.len() {
            anyhow::bail!(
                "cannot aggregate rates of {} and {} replicates",
                self.replicates.len(),
                other.replicates.len()
            );
        }
        for (lhs, rhs) in self.replicates.iter_mut().zip(other.replicates.iter()) {
            lhs.merge(rhs);
        }
        Ok(())
    }
}
