//! Error types for invariant violations.

/// Invariant violations detected while loading or annotating records.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("malformed interval {id:?} at {chrom}:{start}-{end}: start > end")]
    MalformedInterval {
        id: String,
        chrom: String,
        start: i64,
        end: i64,
    },
    #[error("CNV {cnv:?} has the same domain {domain:?} on both flanks")]
    IdenticalFlankDomains { cnv: String, domain: String },
    #[error("invalid replicate suffix in identifier {0:?}")]
    InvalidReplicateId(String),
    #[error("bin size must be positive")]
    InvalidBinSize,
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::AnalysisError;

    #[test]
    fn malformed_interval_message() {
        let err = AnalysisError::MalformedInterval {
            id: "cnv1".into(),
            chrom: "chr1".into(),
            start: 20,
            end: 10,
        };
        assert_eq!(
            err.to_string(),
            "malformed interval \"cnv1\" at chr1:20-10: start > end"
        );
    }
}
