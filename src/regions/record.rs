//! Record types for the genomic element categories.

use crate::err::AnalysisError;

/// Access to the shared interval shape of all genomic elements.
pub trait GenomicElement {
    /// Identifier, unique within the element's category.
    fn id(&self) -> &str;
    /// Chromosome label.
    fn chrom(&self) -> &str;
    /// 0-based begin position.
    fn start(&self) -> i64;
    /// 0-based, exclusive end position.
    fn end(&self) -> i64;

    /// Length of the element in bp.
    fn len(&self) -> i64 {
        self.end() - self.start()
    }

    /// Check the `start <= end` invariant.
    fn validate(&self) -> Result<(), AnalysisError> {
        if self.start() > self.end() {
            Err(AnalysisError::MalformedInterval {
                id: self.id().to_owned(),
                chrom: self.chrom().to_owned(),
                start: self.start(),
                end: self.end(),
            })
        } else {
            Ok(())
        }
    }
}

/// Plain region, used for domains, boundaries and enhancers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: String,
    pub chrom: String,
    pub start: i64,
    pub end: i64,
}

/// A gene with its associated phenotype terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gene {
    pub id: String,
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    /// Phenotype term identifiers annotated to the gene.
    pub terms: Vec<String>,
}

/// Type of a copy-number variant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CnvType {
    Loss,
    Gain,
    /// Any other label, kept verbatim.
    Other(String),
    /// No type given.
    #[default]
    Unknown,
}

impl std::str::FromStr for CnvType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "loss" => CnvType::Loss,
            "gain" => CnvType::Gain,
            "" => CnvType::Unknown,
            _ => CnvType::Other(s.to_owned()),
        })
    }
}

impl std::fmt::Display for CnvType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CnvType::Loss => write!(f, "loss"),
            CnvType::Gain => write!(f, "gain"),
            CnvType::Other(s) => write!(f, "{}", s),
            CnvType::Unknown => write!(f, "NA"),
        }
    }
}

/// Phenotype match scores computed upstream, carried as text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CnvScores {
    /// Score of genes overlapped by the CNV.
    pub overlap: String,
    /// Score of genes in the adjacent, boundary-aware flanks.
    pub adjacent: String,
    /// Score of genes in the fixed-distance windows.
    pub dist: String,
}

/// Parsed scores for rate computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedScores {
    pub overlap: f64,
    pub adjacent: f64,
    pub dist: f64,
}

impl CnvScores {
    /// Parse all three scores, accepting `,` as decimal separator.
    pub fn parse(&self) -> Result<ParsedScores, anyhow::Error> {
        fn parse_one(label: &str, raw: &str) -> Result<f64, anyhow::Error> {
            raw.replace(',', ".")
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("invalid {} score {:?}: {}", label, raw, e))
        }
        Ok(ParsedScores {
            overlap: parse_one("overlap", &self.overlap)?,
            adjacent: parse_one("adjacent", &self.adjacent)?,
            dist: parse_one("dist", &self.dist)?,
        })
    }
}

/// A copy-number variant together with its input annotation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cnv {
    pub id: String,
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    /// All `;`-separated type labels of the record.
    pub cnv_types: Vec<CnvType>,
    /// Phenotype terms of the patient, `["NA"]` if none are known.
    pub terms: Vec<String>,
    pub scores: CnvScores,
    /// Target terms the patient was assigned to.
    pub target_terms: Vec<String>,
}

impl Cnv {
    /// The first target term, compared against the phenotype under test.
    pub fn target_term(&self) -> Option<&str> {
        self.target_terms.first().map(String::as_str)
    }

    /// The first type label, which is the one written to the output tables.
    pub fn cnv_type(&self) -> Option<&CnvType> {
        self.cnv_types.first()
    }

    /// Whether the patient carries any phenotype annotation.
    ///
    /// Only an explicit `NA` marks a patient without terms; an empty terms
    /// column still counts as annotated.
    pub fn has_terms(&self) -> bool {
        !(self.terms.len() == 1 && self.terms[0] == "NA")
    }

    /// Whether any of the type labels is a deletion or duplication.
    pub fn is_loss_or_gain(&self) -> bool {
        self.cnv_types
            .iter()
            .any(|t| matches!(t, CnvType::Loss | CnvType::Gain))
    }
}

macro_rules! impl_genomic_element {
    ($($ty:ty),*) => {
        $(
            impl GenomicElement for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
                fn chrom(&self) -> &str {
                    &self.chrom
                }
                fn start(&self) -> i64 {
                    self.start
                }
                fn end(&self) -> i64 {
                    self.end
                }
            }
        )*
    };
}

impl_genomic_element!(Region, Gene, Cnv);

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[rstest::rstest]
    #[case("loss", CnvType::Loss)]
    #[case("gain", CnvType::Gain)]
    #[case("inversion", CnvType::Other("inversion".into()))]
    #[case("", CnvType::Unknown)]
    fn cnv_type_from_str(#[case] s: &str, #[case] expected: CnvType) {
        let actual: CnvType = s.parse().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn validate_rejects_inverted_interval() {
        let region = Region {
            id: "b1".into(),
            chrom: "chr1".into(),
            start: 10,
            end: 5,
        };
        assert!(region.validate().is_err());

        let region = Region { end: 10, ..region };
        assert!(region.validate().is_ok());
        assert_eq!(region.len(), 0);
    }

    #[test]
    fn scores_parse() -> Result<(), anyhow::Error> {
        let scores = CnvScores {
            overlap: "0,5".into(),
            adjacent: "1.25".into(),
            dist: "0".into(),
        };
        assert_eq!(
            scores.parse()?,
            ParsedScores {
                overlap: 0.5,
                adjacent: 1.25,
                dist: 0.0
            }
        );

        let scores = CnvScores {
            overlap: "NA".into(),
            ..scores
        };
        assert!(scores.parse().is_err());

        Ok(())
    }

    #[rstest::rstest]
    #[case(vec![], true)]
    #[case(vec!["NA"], false)]
    #[case(vec!["EP:06"], true)]
    #[case(vec!["NA", "EP:06"], true)]
    fn has_terms(#[case] terms: Vec<&str>, #[case] expected: bool) {
        let cnv = Cnv {
            terms: terms.into_iter().map(String::from).collect(),
            ..Default::default()
        };
        assert_eq!(cnv.has_terms(), expected);
    }

    #[rstest::rstest]
    #[case(vec![CnvType::Loss], true)]
    #[case(vec![CnvType::Other("complex".into()), CnvType::Gain], true)]
    #[case(vec![CnvType::Other("inversion".into())], false)]
    #[case(vec![], false)]
    fn is_loss_or_gain(#[case] cnv_types: Vec<CnvType>, #[case] expected: bool) {
        let cnv = Cnv {
            cnv_types,
            ..Default::default()
        };
        assert_eq!(cnv.is_loss_or_gain(), expected);
    }
}
