//! Minimal reader for phenotype ontologies in OBO format.
//!
//! Only the parts needed for selecting target terms are kept: primary term
//! identifiers, alternative identifiers, and `is_a` edges.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    io::BufRead,
    path::Path,
};

use crate::common::open_read_maybe_gz;

/// Term graph with alternative identifiers.
#[derive(Debug, Default, Clone)]
pub struct Ontology {
    /// Primary identifiers of all terms.
    terms: HashSet<String>,
    /// Alternative identifiers by primary identifier.
    alt_ids: HashMap<String, Vec<String>>,
    /// Primary identifier by alternative identifier.
    primary_ids: HashMap<String, String>,
    /// Direct children by parent identifier.
    children: HashMap<String, Vec<String>>,
}

/// One `[Term]` stanza while parsing.
#[derive(Debug, Default)]
struct Stanza {
    id: Option<String>,
    alt_ids: Vec<String>,
    parents: Vec<String>,
}

impl Ontology {
    /// Read ontology from OBO file at `path`.
    #[tracing::instrument]
    pub fn from_path(path: &Path) -> Result<Self, anyhow::Error> {
        tracing::debug!("loading ontology from {:?}...", path);
        let reader = open_read_maybe_gz(path)
            .map_err(|e| anyhow::anyhow!("could not open {:?}: {}", path, e))?;
        let result = Self::from_reader(reader)
            .map_err(|e| anyhow::anyhow!("problem parsing {:?}: {}", path, e))?;
        tracing::debug!("... done loading {} terms", result.len());
        Ok(result)
    }

    /// Read ontology from OBO-formatted `reader`.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, anyhow::Error> {
        let mut result = Self::default();
        let mut current: Option<Stanza> = None;

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.starts_with('[') {
                if let Some(stanza) = current.take() {
                    result.add_stanza(stanza);
                }
                if line == "[Term]" {
                    current = Some(Stanza::default());
                }
                continue;
            }
            let Some(stanza) = current.as_mut() else {
                continue;
            };
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            // drop trailing "! name" comments
            let value = value.split('!').next().unwrap_or_default().trim();
            match key {
                "id" => stanza.id = Some(value.to_owned()),
                "alt_id" => stanza.alt_ids.push(value.to_owned()),
                "is_a" => stanza.parents.push(value.to_owned()),
                _ => (),
            }
        }
        if let Some(stanza) = current.take() {
            result.add_stanza(stanza);
        }

        Ok(result)
    }

    fn add_stanza(&mut self, stanza: Stanza) {
        let Some(id) = stanza.id else {
            tracing::warn!("skipping [Term] stanza without id");
            return;
        };
        for alt_id in &stanza.alt_ids {
            self.primary_ids.insert(alt_id.clone(), id.clone());
        }
        if !stanza.alt_ids.is_empty() {
            self.alt_ids
                .entry(id.clone())
                .or_default()
                .extend(stanza.alt_ids);
        }
        for parent in stanza.parents {
            self.children.entry(parent).or_default().push(id.clone());
        }
        self.terms.insert(id);
    }

    /// Number of terms with primary identifier.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// `term` together with all identifiers it is an alternative for or that
    /// are alternatives of it.
    pub fn with_alternatives(&self, term: &str) -> HashSet<String> {
        let mut result = HashSet::from([term.to_owned()]);
        if let Some(alt_ids) = self.alt_ids.get(term) {
            result.extend(alt_ids.iter().cloned());
        }
        if let Some(primary) = self.primary_ids.get(term) {
            result.insert(primary.clone());
        }
        result
    }

    /// All descendants of `term` including itself, `None` for identifiers
    /// that are not a primary term identifier.
    pub fn descendants(&self, term: &str) -> Option<HashSet<String>> {
        if !self.terms.contains(term) {
            return None;
        }
        let mut result = HashSet::from([term.to_owned()]);
        let mut queue = VecDeque::from([term]);
        while let Some(current) = queue.pop_front() {
            for child in self.children.get(current).into_iter().flatten() {
                if result.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }
        Some(result)
    }
}
