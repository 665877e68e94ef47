//! Writers for the annotated CNV tables, summaries, and rates.

use std::{
    collections::HashSet,
    io::Write,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use itertools::Itertools;

use super::{
    annotate::{CnvAnnotation, FlankAnnotation},
    rates::{self, Rates},
};
use crate::{
    common::{mean_sd, open_write_maybe_gz, read_lines, round_to, tsv_writer},
    regions::{
        record::{Cnv, Gene, GenomicElement, Region},
        ElementSet,
    },
};

/// Header of the dense annotated CNV table.
pub const HEADER: [&str; 33] = [
    "chr",
    "start",
    "end",
    "name",
    "type",
    "HPOterms",
    "target_term",
    "overlap_score",
    "adjacent_score",
    "dist_score",
    "target_phenotype",
    "overlap_PT_genes",
    "boundary",
    "nr_boundary",
    "ptEnhancer_ptGene",
    "tissue_name",
    "ptEnhancer_up",
    "ptEnhancer_down",
    "ptGene_up",
    "ptGene_down",
    "common_HPO_gene_up",
    "common_HPO_gene_down",
    "reg_start",
    "reg_end",
    "dist_ptEnhancer_ptGene",
    "dist_ptEnhancer_up",
    "dist_ptEnhancer_down",
    "dist_ptGene_up",
    "dist_ptGene_down",
    "dist_common_HPO_gene_up",
    "dist_common_HPO_gene_down",
    "dist_reg_start",
    "dist_reg_end",
];

/// Missing value marker.
const NA: &str = "NA";

fn flag(value: bool) -> String {
    let label = if value { "True" } else { "False" };
    label.to_string()
}

/// Join identifiers with `;`, `NA` if there are none.
fn join_or_na<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let joined = items.into_iter().join(";");
    if joined.is_empty() {
        NA.to_string()
    } else {
        joined
    }
}

fn or_na(value: &str) -> String {
    if value.is_empty() {
        NA.to_string()
    } else {
        value.to_string()
    }
}

/// Per-phenotype data needed for rendering rows.
#[derive(Debug)]
pub struct PhenotypeContext<'a> {
    /// Tissue the enhancers were selected for.
    pub tissue: &'a str,
    /// Descendants of the target term.
    pub descendants: &'a HashSet<String>,
    /// Target genes with their terms.
    pub genes: &'a ElementSet<Gene>,
}

/// Columns shared by both flank definitions.
fn flank_columns(flanks: &FlankAnnotation, ctx: &PhenotypeContext) -> Vec<String> {
    let common = flanks.common_terms(ctx.genes, ctx.descendants);
    vec![
        join_or_na(&flanks.enhancers.left),
        join_or_na(&flanks.enhancers.right),
        join_or_na(&flanks.genes.left),
        join_or_na(&flanks.genes.right),
        join_or_na(&common.left),
        join_or_na(&common.right),
    ]
}

fn span_columns(flanks: &FlankAnnotation) -> [String; 2] {
    match flanks.span() {
        Some((start, end)) => [start.to_string(), end.to_string()],
        None => [NA.to_string(), NA.to_string()],
    }
}

/// Render the dense table row of `cnv`.
pub fn annotated_row(cnv: &Cnv, annotation: &CnvAnnotation, ctx: &PhenotypeContext) -> Vec<String> {
    let mut row = vec![
        cnv.chrom.clone(),
        cnv.start.to_string(),
        cnv.end.to_string(),
        cnv.id.clone(),
        cnv.cnv_type().map_or_else(|| NA.to_string(), |t| t.to_string()),
        join_or_na(&cnv.terms),
        join_or_na(&cnv.target_terms),
        or_na(&cnv.scores.overlap),
        or_na(&cnv.scores.adjacent),
        or_na(&cnv.scores.dist),
        flag(annotation.target_phenotype),
        flag(!annotation.overlap_target_genes.is_empty()),
        flag(!annotation.boundaries.is_empty()),
        annotation.boundaries.len().to_string(),
        flag(annotation.tdbd.candidate),
        ctx.tissue.to_string(),
    ];
    row.extend(flank_columns(&annotation.tdbd, ctx));
    row.extend(span_columns(&annotation.tdbd));
    row.push(flag(annotation.ea.candidate));
    row.extend(flank_columns(&annotation.ea, ctx));
    row.extend(span_columns(&annotation.ea));
    row
}

/// Write the dense annotated CNV table for one phenotype.
#[tracing::instrument(skip_all, fields(path = ?path))]
pub fn write_annotated<'a>(
    path: &Path,
    cnvs: impl IntoIterator<Item = &'a Cnv>,
    annotations: &IndexMap<String, CnvAnnotation>,
    ctx: &PhenotypeContext,
) -> Result<(), anyhow::Error> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(HEADER)?;
    for cnv in cnvs {
        let annotation = annotations
            .get(&cnv.id)
            .ok_or_else(|| anyhow::anyhow!("CNV {:?} was not annotated", cnv.id))?;
        writer.write_record(annotated_row(cnv, annotation, ctx))?;
    }
    writer.flush()?;
    Ok(())
}

/// Concatenate the per-phenotype tables into `path`, keeping only the first
/// header.
#[tracing::instrument(skip(parts))]
pub fn concat_tables(path: &Path, parts: &[PathBuf]) -> Result<(), anyhow::Error> {
    let mut writer = open_write_maybe_gz(path)
        .map_err(|e| anyhow::anyhow!("could not open {:?} for writing: {}", path, e))?;
    for (nr, part) in parts.iter().enumerate() {
        let lines = read_lines(part)
            .map_err(|e| anyhow::anyhow!("could not read {:?}: {}", part, e))?;
        for line in lines.skip(if nr == 0 { 0 } else { 1 }) {
            writeln!(writer, "{}", line?)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Mean with standard deviation formatted as for the summary table.
fn mean_sd_cell(values: &[f64]) -> String {
    let (mean, sd) = mean_sd(values);
    format!("{}($\\pm${} SD)", round_to(mean, 3), round_to(sd, 3))
}

/// CNV subsets reported in the background table.
///
/// `del target PT not PTgene` keeps the target-phenotype CNVs that overlap
/// *no* target gene.  The legacy pipeline filled this row with the CNVs that
/// do overlap a target gene, so its numbers differ from older `.bg.tab` files.
fn background_subsets<'a>(
    cnvs: &[&'a Cnv],
    annotations: &IndexMap<String, CnvAnnotation>,
    descendants: &HashSet<String>,
) -> Vec<(&'static str, Vec<&'a Cnv>)> {
    let del = cnvs
        .iter()
        .copied()
        .filter(|cnv| cnv.is_loss_or_gain())
        .collect::<Vec<_>>();
    let del_any_pt = del
        .iter()
        .copied()
        .filter(|cnv| cnv.has_terms())
        .collect::<Vec<_>>();
    let del_target_pt = del_any_pt
        .iter()
        .copied()
        .filter(|cnv| cnv.target_terms.iter().any(|t| descendants.contains(t)))
        .collect::<Vec<_>>();
    let del_target_pt_no_gene = del_target_pt
        .iter()
        .copied()
        .filter(|cnv| {
            annotations
                .get(&cnv.id)
                .map(|a| a.overlap_target_genes.is_empty())
                .unwrap_or(true)
        })
        .collect::<Vec<_>>();
    vec![
        ("all", cnvs.to_vec()),
        ("del", del),
        ("del any PT", del_any_pt),
        ("del target PT", del_target_pt),
        ("del target PT not PTgene", del_target_pt_no_gene),
    ]
}

/// Write the `.bg.tab` summary of CNV subsets.
///
/// Rows are `all`, `del`, `del any PT`, `del target PT` and
/// `del target PT not PTgene`.  The last row holds CNVs without overlapped
/// target genes, the inverse of the subset the legacy pipeline wrote under
/// this name.
#[tracing::instrument(skip_all, fields(path = ?path))]
pub fn write_background(
    path: &Path,
    cnvs: &[&Cnv],
    annotations: &IndexMap<String, CnvAnnotation>,
    descendants: &HashSet<String>,
) -> Result<(), anyhow::Error> {
    let mut writer = tsv_writer(path)?;
    writer.write_record([
        "variant_type",
        "n cases",
        "avg length (Mb)",
        "avg HPO terms",
        "avg boundaries",
        "avg target genes",
    ])?;
    let annotation_of = |cnv: &Cnv| annotations.get(&cnv.id);
    for (name, subset) in background_subsets(cnvs, annotations, descendants) {
        let lengths = subset
            .iter()
            .map(|cnv| cnv.len() as f64 / 1e6)
            .collect::<Vec<_>>();
        let terms = subset
            .iter()
            .map(|cnv| cnv.terms.len() as f64)
            .collect::<Vec<_>>();
        let boundaries = subset
            .iter()
            .map(|cnv| annotation_of(*cnv).map_or(0.0, |a| a.boundaries.len() as f64))
            .collect::<Vec<_>>();
        let genes = subset
            .iter()
            .map(|cnv| annotation_of(*cnv).map_or(0.0, |a| a.overlap_target_genes.len() as f64))
            .collect::<Vec<_>>();
        writer.write_record([
            name.to_string(),
            subset.len().to_string(),
            mean_sd_cell(&lengths),
            mean_sd_cell(&terms),
            mean_sd_cell(&boundaries),
            mean_sd_cell(&genes),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Input for the `.stats` report of one phenotype.
#[derive(Debug)]
pub struct StatsInput<'a> {
    pub term: &'a str,
    pub cnvs: &'a [&'a Cnv],
    pub annotations: &'a IndexMap<String, CnvAnnotation>,
    pub descendants: &'a HashSet<String>,
    pub domains: &'a ElementSet<Region>,
    pub boundaries: &'a ElementSet<Region>,
    pub enhancer_count: usize,
    pub gene_count: usize,
}

fn mean_len(set: &ElementSet<Region>) -> f64 {
    if set.is_empty() {
        0.0
    } else {
        set.iter().map(|r| r.len() as f64).sum::<f64>() / set.len() as f64
    }
}

fn fraction(n: usize, total: usize) -> String {
    round_to(if total == 0 { 0.0 } else { n as f64 / total as f64 }, 3)
}

/// Write the `.stats` report.
#[tracing::instrument(skip_all, fields(path = ?path))]
pub fn write_stats(path: &Path, input: &StatsInput) -> Result<(), anyhow::Error> {
    let annotation_of = |cnv: &Cnv| input.annotations.get(&cnv.id);
    let del_any_pt = input
        .cnvs
        .iter()
        .copied()
        .filter(|cnv| cnv.is_loss_or_gain() && cnv.has_terms())
        .collect::<Vec<_>>();
    let with_boundary = del_any_pt
        .iter()
        .filter(|cnv| annotation_of(**cnv).map_or(false, |a| !a.boundaries.is_empty()))
        .map(|cnv| cnv.id.as_str())
        .collect::<HashSet<_>>();
    let candidates = del_any_pt
        .iter()
        .filter(|cnv| annotation_of(**cnv).map_or(false, |a| a.tdbd.candidate))
        .map(|cnv| cnv.id.as_str())
        .collect::<HashSet<_>>();
    let with_phenotype = del_any_pt
        .iter()
        .filter(|cnv| annotation_of(**cnv).map_or(false, |a| a.target_phenotype))
        .map(|cnv| cnv.id.as_str())
        .collect::<HashSet<_>>();
    let n = del_any_pt.len();
    let n_pt = with_phenotype.len();
    let pt_boundary = with_boundary.intersection(&with_phenotype).count();
    let pt_candidates = candidates.intersection(&with_phenotype).count();

    let mut writer = open_write_maybe_gz(path)
        .map_err(|e| anyhow::anyhow!("could not open {:?} for writing: {}", path, e))?;
    writeln!(writer, "Input HPO term\t{}", input.term)?;
    writeln!(writer, "Target HPO terms\t{}", input.descendants.len())?;
    writeln!(writer, "Background enhancers\t{}", input.enhancer_count)?;
    writeln!(writer, "Target PT genes\t{}", input.gene_count)?;
    writeln!(writer, "Domains\t{}", input.domains.len())?;
    writeln!(writer, "Mean domain size\t{}", round_to(mean_len(input.domains), 3))?;
    writeln!(writer, "Boundaries\t{}", input.boundaries.len())?;
    writeln!(
        writer,
        "Mean boundary size\t{}",
        round_to(mean_len(input.boundaries), 3)
    )?;
    writeln!(writer, "Deletions\t{}", n)?;
    writeln!(
        writer,
        "\\quad Boundary\t{}({})",
        with_boundary.len(),
        fraction(with_boundary.len(), n)
    )?;
    writeln!(
        writer,
        "\\quad ptEnhancer_ptGene\t{}({})",
        candidates.len(),
        fraction(candidates.len(), n)
    )?;
    writeln!(writer, "\\quad Deletions with target phenotype:\t{}", n_pt)?;
    writeln!(
        writer,
        "\\quad \\quad Boundary\t{}({})",
        pt_boundary,
        fraction(pt_boundary, n_pt)
    )?;
    writeln!(
        writer,
        "\\quad \\quad ptEnhancer_ptGene\t{}({})",
        pt_candidates,
        fraction(pt_candidates, n_pt)
    )?;
    writer.flush()?;
    Ok(())
}

/// Write the sparse rates file, one row per replicate.
#[tracing::instrument(skip(rates))]
pub fn write_rates(path: &Path, rates: &Rates) -> Result<(), anyhow::Error> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(rates::header())?;
    for counts in &rates.replicates {
        writer.write_record(counts.values().iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
