//! Annotation of CNVs with boundary disruption and enhancer adoption events.

pub mod annotate;
pub mod output;
pub mod rates;

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use clap::{ArgGroup, Parser};
use indexmap::IndexMap;
use itertools::Itertools;
use thousands::Separable;

use self::{
    annotate::{boundary_hits, Annotator, BoundaryHits, CnvAnnotation, DEFAULT_WINDOW_SIZE},
    output::{PhenotypeContext, StatsInput},
    rates::{Rates, Replicates},
};
use crate::{
    common::{expand_path, trace_rss_now},
    pheno::{
        load_target_phenotypes, ontology::Ontology, TargetPhenotype, TargetSelection,
        TermToGenes,
    },
    regions::{
        bins::DEFAULT_BIN_SIZE,
        io::{load_cnvs, load_genes, load_regions},
        overlap::BoundaryOverlap,
        record::{Cnv, Gene, Region},
        ElementSet,
    },
};

/// Command line arguments for `analyze` sub command.
#[derive(Parser, Debug)]
#[command(about = "Annotate CNVs with boundary disruption events", long_about = None)]
#[command(group(
    ArgGroup::new("enhancers")
        .required(true)
        .multiple(true)
        .args(["path_enhancer_file", "path_enhancer_dir"])
))]
pub struct Args {
    /// Path to CNV file.
    #[arg(long)]
    pub path_cnvs: String,
    /// Path to domain BED file.
    #[arg(long)]
    pub path_domains: String,
    /// Path to boundary BED file.
    #[arg(long)]
    pub path_boundaries: String,
    /// Path to gene file with phenotype terms in the sixth column.
    #[arg(long)]
    pub path_genes: String,
    /// Path to term to gene mapping.
    #[arg(long)]
    pub path_term_to_genes: String,
    /// Path to phenotype ontology in OBO format.
    #[arg(long)]
    pub path_ontology: String,
    /// Path to list of target phenotypes (term, name, tissue).
    #[arg(long)]
    pub path_target_phenotypes: String,
    /// Directory with one `<tissue>.tab` enhancer file per tissue.
    #[arg(long)]
    pub path_enhancer_dir: Option<String>,
    /// Single enhancer file, takes precedence over `--path-enhancer-dir`.
    #[arg(long)]
    pub path_enhancer_file: Option<String>,
    /// Path to output file, per-phenotype files get the term as suffix.
    #[arg(long)]
    pub path_output: String,

    /// Overlap required between CNV and boundary.
    #[arg(long, value_enum, default_value_t = BoundaryOverlap::Complete)]
    pub overlap_function: BoundaryOverlap,
    /// Size of the fixed windows next to the CNV.
    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: i64,
    /// Bin size of the region index.
    #[arg(long, default_value_t = DEFAULT_BIN_SIZE)]
    pub bin_size: u64,
    /// Only write the summed event counts per replicate.
    #[arg(long, default_value_t = false)]
    pub sparse_output: bool,
}

impl Args {
    /// Enhancer file to use for `tissue`.
    fn enhancer_path(&self, tissue: &str) -> Result<PathBuf, anyhow::Error> {
        match (&self.path_enhancer_file, &self.path_enhancer_dir) {
            (Some(file), _) => Ok(PathBuf::from(expand_path(file))),
            (None, Some(dir)) => Ok(Path::new(&expand_path(dir)).join(format!("{}.tab", tissue))),
            (None, None) => anyhow::bail!("neither enhancer file nor directory given"),
        }
    }
}

/// Data read once for all phenotypes.
struct BaseData {
    cnvs: ElementSet<Cnv>,
    domains: ElementSet<Region>,
    boundaries: ElementSet<Region>,
    ontology: Ontology,
    term_to_genes: TermToGenes,
    hits: BoundaryHits,
}

impl BaseData {
    fn load(args: &Args) -> Result<Self, anyhow::Error> {
        tracing::info!("Loading base data...");
        let before_loading = Instant::now();
        let ontology = Ontology::from_path(Path::new(&expand_path(&args.path_ontology)))?;
        if ontology.is_empty() {
            tracing::warn!("ontology {:?} contains no terms", args.path_ontology);
        }
        let cnvs = load_cnvs(Path::new(&expand_path(&args.path_cnvs)), args.bin_size)?;
        let boundaries =
            load_regions(Path::new(&expand_path(&args.path_boundaries)), args.bin_size)?;
        let domains = load_regions(Path::new(&expand_path(&args.path_domains)), args.bin_size)?;
        let term_to_genes =
            TermToGenes::from_path(Path::new(&expand_path(&args.path_term_to_genes)))?;

        let hits = boundary_hits(cnvs.iter(), &boundaries, args.overlap_function.into());
        tracing::info!(
            "... done loading {} CNVs, {} domains, {} boundaries, {} terms in {:?}",
            cnvs.len().separate_with_commas(),
            domains.len().separate_with_commas(),
            boundaries.len().separate_with_commas(),
            ontology.len().separate_with_commas(),
            before_loading.elapsed()
        );
        tracing::debug!(
            "{} CNVs hit a boundary ({} overlap)",
            hits.values()
                .filter(|h| !h.is_empty())
                .count()
                .separate_with_commas(),
            args.overlap_function
        );

        Ok(Self {
            cnvs,
            domains,
            boundaries,
            ontology,
            term_to_genes,
            hits,
        })
    }
}

/// Data read for one target phenotype.
struct PhenotypeData {
    selection: TargetSelection,
    genes: ElementSet<Gene>,
    enhancers: ElementSet<Region>,
}

impl PhenotypeData {
    fn load(args: &Args, base: &BaseData, target: &TargetPhenotype) -> Result<Self, anyhow::Error> {
        let selection = TargetSelection::new(target, &base.ontology, &base.term_to_genes);
        let genes = load_genes(
            Path::new(&expand_path(&args.path_genes)),
            args.bin_size,
            &selection.genes,
        )?;
        let enhancers = load_regions(&args.enhancer_path(&target.tissue)?, args.bin_size)?;
        tracing::debug!(
            "{} target terms ({}), {} descendant terms, {} target genes, {} enhancers",
            selection.terms.len(),
            selection.terms.iter().sorted().join(", "),
            selection.descendants.len(),
            genes.len(),
            enhancers.len().separate_with_commas()
        );
        Ok(Self {
            selection,
            genes,
            enhancers,
        })
    }
}

/// Annotate `cnvs` for the phenotype `term`.
fn annotate_cnvs(
    args: &Args,
    base: &BaseData,
    pheno: &PhenotypeData,
    cnvs: &[&Cnv],
    term: &str,
) -> Result<IndexMap<String, CnvAnnotation>, anyhow::Error> {
    let annotator = Annotator {
        domains: &base.domains,
        boundaries: &base.boundaries,
        enhancers: &pheno.enhancers,
        genes: &pheno.genes,
        window_size: args.window_size,
    };
    let mut result = IndexMap::new();
    for cnv in cnvs {
        let hits = base
            .hits
            .get(&cnv.id)
            .ok_or_else(|| anyhow::anyhow!("no boundary hits for CNV {:?}", cnv.id))?;
        result.insert(cnv.id.clone(), annotator.annotate(cnv, hits, term)?);
    }
    Ok(result)
}

/// Result of the analysis of one phenotype.
enum PhenotypeOutput {
    /// Event counts in sparse mode.
    Rates(Rates),
    /// Path of the annotated table in dense mode.
    Table(PathBuf),
}

/// Run the analysis for one phenotype.
fn run_phenotype(
    args: &Args,
    base: &BaseData,
    target: &TargetPhenotype,
    replicates: Option<Replicates>,
) -> Result<PhenotypeOutput, anyhow::Error> {
    let pheno = PhenotypeData::load(args, base, target)?;

    let cnvs = if replicates.is_some() {
        base.cnvs
            .iter()
            .filter(|cnv| cnv.target_term() == Some(target.term.as_str()))
            .collect::<Vec<_>>()
    } else {
        base.cnvs.iter().collect::<Vec<_>>()
    };
    let before_annotation = Instant::now();
    let annotations = annotate_cnvs(args, base, &pheno, &cnvs, &target.term)?;
    tracing::debug!(
        "annotated {} CNVs in {:?}",
        annotations.len().separate_with_commas(),
        before_annotation.elapsed()
    );

    if let Some(replicates) = replicates {
        return Ok(PhenotypeOutput::Rates(Rates::for_phenotype(
            cnvs.iter().copied(),
            &annotations,
            replicates,
        )?));
    }

    let path_table = PathBuf::from(format!(
        "{}.{}",
        expand_path(&args.path_output),
        target.term
    ));
    let ctx = PhenotypeContext {
        tissue: &target.tissue,
        descendants: &pheno.selection.descendants,
        genes: &pheno.genes,
    };
    output::write_annotated(&path_table, cnvs.iter().copied(), &annotations, &ctx)?;
    output::write_background(
        Path::new(&format!("{}.bg.tab", path_table.display())),
        &cnvs,
        &annotations,
        &pheno.selection.descendants,
    )?;
    output::write_stats(
        Path::new(&format!("{}.stats", path_table.display())),
        &StatsInput {
            term: &target.term,
            cnvs: &cnvs,
            annotations: &annotations,
            descendants: &pheno.selection.descendants,
            domains: &base.domains,
            boundaries: &base.boundaries,
            enhancer_count: pheno.enhancers.len(),
            gene_count: pheno.genes.len(),
        },
    )?;
    Ok(PhenotypeOutput::Table(path_table))
}

/// Main entry point for the `analyze` command.
pub fn run(common_args: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("Starting `analyze`");
    tracing::info!("  common_args = {:?}", &common_args);
    tracing::info!("  args = {:?}", &args);
    let before_anything = Instant::now();

    let base = BaseData::load(args)?;
    trace_rss_now();

    let targets = load_target_phenotypes(Path::new(&expand_path(&args.path_target_phenotypes)))?;
    let replicates = if args.sparse_output {
        let replicates = Replicates::detect(base.cnvs.iter().map(|cnv| cnv.id.as_str()))?;
        tracing::info!("counting events in {} replicate(s)", replicates.count());
        Some(replicates)
    } else {
        None
    };

    let mut rates = replicates.map(|r| Rates::new(r.count()));
    let mut tables = Vec::new();
    for target in &targets {
        tracing::info!(
            "Running analysis for term {} ({:?}), tissue {}",
            &target.term,
            &target.name,
            &target.tissue
        );
        let result = run_phenotype(args, &base, target, replicates)
            .map_err(|e| anyhow::anyhow!("analysis of phenotype {} failed: {}", target.term, e))?;
        match (result, rates.as_mut()) {
            (PhenotypeOutput::Rates(phenotype_rates), Some(rates)) => {
                rates.aggregate(&phenotype_rates)?
            }
            (PhenotypeOutput::Table(path_table), _) => tables.push(path_table),
            (PhenotypeOutput::Rates(_), None) => anyhow::bail!("got rates for dense output"),
        }
        trace_rss_now();
    }

    let path_output = PathBuf::from(expand_path(&args.path_output));
    if let Some(rates) = &rates {
        tracing::info!("Writing rates to {:?}", &path_output);
        output::write_rates(&path_output, rates)?;
    } else {
        tracing::info!("Writing combined table to {:?}", &path_output);
        output::concat_tables(&path_output, &tables)?;
    }

    tracing::info!(
        "All of `analyze` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}
