//! Phenotype-related input: ontology, term-to-gene mapping, target terms.

pub mod ontology;

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use serde::Deserialize;

use crate::common::tsv_reader;

use self::ontology::Ontology;

/// Mapping from phenotype term to associated gene identifiers.
#[derive(Debug, Default, Clone)]
pub struct TermToGenes {
    genes: HashMap<String, HashSet<String>>,
}

impl TermToGenes {
    /// Load from tab-separated file with term and gene per line.
    #[tracing::instrument]
    pub fn from_path(path: &Path) -> Result<Self, anyhow::Error> {
        tracing::debug!("loading term to gene mapping from {:?}...", path);
        let mut result = Self::default();
        let mut reader = tsv_reader(path)?;
        for record in reader.records() {
            let record = record.map_err(|e| anyhow::anyhow!("problem reading {:?}: {}", path, e))?;
            match (record.get(0), record.get(1)) {
                (Some(term), Some(gene)) => {
                    result
                        .genes
                        .entry(term.to_owned())
                        .or_default()
                        .insert(gene.to_owned());
                }
                _ => anyhow::bail!(
                    "{:?}, line {}: expected term and gene columns",
                    path,
                    record.position().map(|p| p.line()).unwrap_or_default()
                ),
            }
        }
        tracing::debug!("... done loading genes for {} terms", result.genes.len());
        Ok(result)
    }

    /// Union of the genes associated with any of `terms`.
    pub fn genes_for<'a>(&self, terms: impl IntoIterator<Item = &'a String>) -> HashSet<String> {
        let mut result = HashSet::new();
        for term in terms {
            if let Some(genes) = self.genes.get(term) {
                result.extend(genes.iter().cloned());
            }
        }
        result
    }
}

/// One line of the target phenotype list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetPhenotype {
    /// Phenotype term identifier.
    pub term: String,
    /// Human-readable name.
    pub name: String,
    /// Tissue used to select the enhancer file.
    pub tissue: String,
}

/// Load the list of target phenotypes.
#[tracing::instrument]
pub fn load_target_phenotypes(path: &Path) -> Result<Vec<TargetPhenotype>, anyhow::Error> {
    let mut reader = tsv_reader(path)?;
    let mut result = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| anyhow::anyhow!("problem reading {:?}: {}", path, e))?;
        let target: TargetPhenotype = record
            .deserialize(None)
            .map_err(|e| anyhow::anyhow!("invalid target phenotype in {:?}: {}", path, e))?;
        result.push(target);
    }
    tracing::debug!("loaded {} target phenotypes", result.len());
    Ok(result)
}

/// Terms and genes selected for one target phenotype.
#[derive(Debug, Clone, Default)]
pub struct TargetSelection {
    /// The target term with its alternative identifiers.
    pub terms: HashSet<String>,
    /// All descendants of the target term (and its alternatives).
    pub descendants: HashSet<String>,
    /// Genes associated with the target term.
    pub genes: HashSet<String>,
}

impl TargetSelection {
    /// Resolve `target` against `ontology` and `term_to_genes`.
    pub fn new(target: &TargetPhenotype, ontology: &Ontology, term_to_genes: &TermToGenes) -> Self {
        let terms = ontology.with_alternatives(&target.term);
        let descendants = terms
            .iter()
            .filter_map(|term| ontology.descendants(term))
            .flatten()
            .collect();
        let genes = term_to_genes.genes_for(terms.iter());
        Self {
            terms,
            descendants,
            genes,
        }
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashSet, path::Path};

    use pretty_assertions::assert_eq;

    use super::{ontology::Ontology, TargetPhenotype, TargetSelection, TermToGenes};

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn load_target_phenotypes() -> Result<(), anyhow::Error> {
        let targets = super::load_target_phenotypes(Path::new("tests/barrier/toy/targets.tsv"))?;
        assert_eq!(
            targets,
            vec![
                TargetPhenotype {
                    term: "EP:05".into(),
                    name: "Example phenotype five".into(),
                    tissue: "limb".into(),
                },
                TargetPhenotype {
                    term: "EP:03".into(),
                    name: "Example phenotype three".into(),
                    tissue: "limb".into(),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn term_to_genes() -> Result<(), anyhow::Error> {
        let mapping = TermToGenes::from_path(Path::new("tests/barrier/toy/term_to_genes.tsv"))?;
        assert_eq!(mapping.genes_for(&set(&["EP:05"])), set(&["A", "B", "D"]));
        assert_eq!(mapping.genes_for(&set(&["EP:03", "EP:99"])), set(&["C"]));
        Ok(())
    }

    #[test]
    fn target_selection_resolves_alternatives() -> Result<(), anyhow::Error> {
        let ontology = Ontology::from_path(Path::new("tests/barrier/toy/ontology.obo"))?;
        let mapping = TermToGenes::from_path(Path::new("tests/barrier/toy/term_to_genes.tsv"))?;
        let target = TargetPhenotype {
            term: "EP:15".into(),
            name: "alternative of five".into(),
            tissue: "limb".into(),
        };

        let selection = TargetSelection::new(&target, &ontology, &mapping);

        assert_eq!(selection.terms, set(&["EP:05", "EP:15"]));
        assert_eq!(selection.descendants, set(&["EP:05", "EP:06", "EP:07"]));
        assert_eq!(selection.genes, set(&["A", "B", "D"]));
        Ok(())
    }
}
