//! Annotation of CNVs with disrupted boundaries and flanking elements.
//!
//! For each CNV two flank definitions are evaluated.  The boundary-aware one
//! (TDBD, "topological domain boundary disruption") is only defined when the
//! CNV hits a boundary and spans from the outer edge of the domain at the
//! CNV start to the outer edge of the domain at the CNV end.  The
//! fixed-window one (EA, "enhancer adoption") uses windows of a configured
//! size on both sides of the CNV.  A candidate event requires an enhancer on
//! one side and a target gene on the other.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;

use crate::{
    err::AnalysisError,
    regions::{
        overlap::Overlap,
        record::{Cnv, GenomicElement, Gene, Region},
        ElementSet,
    },
};

/// Default size of the fixed windows.
pub const DEFAULT_WINDOW_SIZE: i64 = 400_000;

/// A pair of values for the left (upstream) and right (downstream) side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flanks<T> {
    pub left: T,
    pub right: T,
}

impl<T> Flanks<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn as_ref(&self) -> Flanks<&T> {
        Flanks::new(&self.left, &self.right)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> Flanks<U> {
        Flanks::new(f(self.left), f(self.right))
    }
}

/// Elements found in the two flanks of one definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlankAnnotation {
    /// The flanking regions, `None` if undefined for this CNV.
    pub regions: Option<Flanks<(i64, i64)>>,
    /// Enhancers contained in the flanks.
    pub enhancers: Flanks<BTreeSet<String>>,
    /// Target genes contained in the flanks.
    pub genes: Flanks<BTreeSet<String>>,
    /// Whether an enhancer and a target gene lie on opposite flanks.
    pub candidate: bool,
}

impl FlankAnnotation {
    /// Outer coordinates of the annotated region, if defined.
    pub fn span(&self) -> Option<(i64, i64)> {
        self.regions
            .as_ref()
            .map(|regions| (regions.left.0, regions.right.1))
    }

    /// Terms of `descendants` annotated to the flank genes, per side.
    pub fn common_terms(
        &self,
        genes: &ElementSet<Gene>,
        descendants: &HashSet<String>,
    ) -> Flanks<BTreeSet<String>> {
        self.genes.as_ref().map(|ids| {
            ids.iter()
                .filter_map(|id| genes.get(id))
                .flat_map(|gene| gene.terms.iter())
                .filter(|term| descendants.contains(*term))
                .cloned()
                .collect()
        })
    }
}

/// Derived annotation of one CNV for one target phenotype.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CnvAnnotation {
    /// Whether the CNV's target term is the phenotype under test.
    pub target_phenotype: bool,
    /// Boundaries hit by the CNV.
    pub boundaries: BTreeSet<String>,
    /// Target genes completely contained in the CNV.
    pub overlap_target_genes: BTreeSet<String>,
    /// Domains at the CNV start and end, if both resolved uniquely.
    pub domains: Option<Flanks<String>>,
    /// Boundary-aware flanks.
    pub tdbd: FlankAnnotation,
    /// Fixed-window flanks.
    pub ea: FlankAnnotation,
}

/// Boundary identifiers hit by each CNV, keyed by CNV identifier.
pub type BoundaryHits = IndexMap<String, BTreeSet<String>>;

/// Compute boundary hits for all `cnvs` with the given overlap function.
pub fn boundary_hits<'a>(
    cnvs: impl IntoIterator<Item = &'a Cnv>,
    boundaries: &ElementSet<Region>,
    overlap: Overlap,
) -> BoundaryHits {
    cnvs.into_iter()
        .map(|cnv| {
            (
                cnv.id.clone(),
                boundaries.query(&cnv.chrom, cnv.start, cnv.end, overlap),
            )
        })
        .collect()
}

/// Annotation engine over the domain, boundary, enhancer, and gene sets.
#[derive(Debug)]
pub struct Annotator<'a> {
    pub domains: &'a ElementSet<Region>,
    pub boundaries: &'a ElementSet<Region>,
    pub enhancers: &'a ElementSet<Region>,
    pub genes: &'a ElementSet<Gene>,
    pub window_size: i64,
}

impl<'a> Annotator<'a> {
    /// Domains enclosing position `pos` on `chrom`.
    fn domains_at(&self, chrom: &str, pos: i64) -> Vec<&'a Region> {
        self.domains
            .query_records(chrom, pos, pos, Overlap::Any)
            .collect()
    }

    /// Resolve the domains at both CNV ends.
    ///
    /// If a CNV end does not lie within a domain, the position one bp beyond
    /// the outermost hit boundary is used instead.  Returns `None` unless
    /// exactly one domain is found on each side.
    pub fn flanking_domains(
        &self,
        cnv: &Cnv,
        hits: &BTreeSet<String>,
    ) -> Result<Option<Flanks<&'a Region>>, AnalysisError> {
        let hit_boundaries = hits
            .iter()
            .filter_map(|id| self.boundaries.get(id))
            .collect::<Vec<_>>();

        let mut start_domains = self.domains_at(&cnv.chrom, cnv.start);
        if start_domains.is_empty() {
            if let Some(min_start) = hit_boundaries.iter().map(|b| b.start).min() {
                start_domains = self.domains_at(&cnv.chrom, min_start - 1);
            }
        }
        let mut end_domains = self.domains_at(&cnv.chrom, cnv.end);
        if end_domains.is_empty() {
            if let Some(max_end) = hit_boundaries.iter().map(|b| b.end).max() {
                end_domains = self.domains_at(&cnv.chrom, max_end + 1);
            }
        }

        match (start_domains.as_slice(), end_domains.as_slice()) {
            ([start], [end]) => {
                if start.id == end.id {
                    Err(AnalysisError::IdenticalFlankDomains {
                        cnv: cnv.id.clone(),
                        domain: start.id.clone(),
                    })
                } else {
                    Ok(Some(Flanks::new(*start, *end)))
                }
            }
            _ => Ok(None),
        }
    }

    /// Enhancers and target genes contained in the given flank regions.
    fn collect_flanks(&self, chrom: &str, regions: Option<Flanks<(i64, i64)>>) -> FlankAnnotation {
        let Some(regions) = regions else {
            return FlankAnnotation::default();
        };
        let enhancers = regions
            .clone()
            .map(|(start, end)| self.enhancers.query(chrom, start, end, Overlap::Complete));
        let genes = regions
            .clone()
            .map(|(start, end)| self.genes.query(chrom, start, end, Overlap::Complete));
        let candidate = (!enhancers.left.is_empty() && !genes.right.is_empty())
            || (!enhancers.right.is_empty() && !genes.left.is_empty());
        FlankAnnotation {
            regions: Some(regions),
            enhancers,
            genes,
            candidate,
        }
    }

    /// Boundary-aware flanks, bounded by the domains beyond the hit boundaries.
    pub fn boundary_flanks(
        &self,
        cnv: &Cnv,
        hits: &BTreeSet<String>,
    ) -> Result<(Option<Flanks<String>>, FlankAnnotation), AnalysisError> {
        if hits.is_empty() {
            return Ok((None, FlankAnnotation::default()));
        }
        let domains = self.flanking_domains(cnv, hits)?;
        let regions = domains
            .as_ref()
            .map(|d| Flanks::new((d.left.start, cnv.start), (cnv.end, d.right.end)));
        Ok((
            domains.map(|d| d.map(|domain| domain.id.clone())),
            self.collect_flanks(&cnv.chrom, regions),
        ))
    }

    /// Fixed-window flanks of `window_size` bp on either side.
    pub fn window_flanks(&self, cnv: &Cnv) -> FlankAnnotation {
        let regions = Flanks::new(
            (cnv.start - self.window_size, cnv.start),
            (cnv.end, cnv.end + self.window_size),
        );
        self.collect_flanks(&cnv.chrom, Some(regions))
    }

    /// Full annotation of `cnv` for the phenotype `target_term`.
    pub fn annotate(
        &self,
        cnv: &Cnv,
        hits: &BTreeSet<String>,
        target_term: &str,
    ) -> Result<CnvAnnotation, AnalysisError> {
        let (domains, tdbd) = self.boundary_flanks(cnv, hits)?;
        Ok(CnvAnnotation {
            target_phenotype: cnv.target_term() == Some(target_term),
            boundaries: hits.clone(),
            overlap_target_genes: self
                .genes
                .query(&cnv.chrom, cnv.start(), cnv.end(), Overlap::Complete),
            domains,
            tdbd,
            ea: self.window_flanks(cnv),
        })
    }
}
