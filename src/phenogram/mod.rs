//! Combine per-gene phenotype match scores into the three CNV score columns.
//!
//! The input rows carry `;`-separated per-gene scores for the genes overlapped
//! by the CNV, the upstream and downstream adjacent genes, and the upstream
//! and downstream genes within a fixed distance.  The output keeps all other
//! columns and replaces these five by the overlap, adjacent and distance
//! scores read by `analyze`.

use std::{io::BufRead, path::Path, time::Instant};

use clap::Parser;
use itertools::Itertools;
use thousands::Separable;

use crate::common::{expand_path, float_repr, open_read_maybe_gz, tsv_writer};

/// Default 0-based score columns.
pub const DEFAULT_COLUMNS: [usize; 5] = [6, 7, 8, 9, 10];

/// Function to combine the scores of all genes in one region.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Combine {
    #[default]
    Sum,
    Mean,
    Max,
}

impl Combine {
    /// Combine `scores`, `None` if there are none.
    pub fn apply(self, scores: &[f64]) -> Option<f64> {
        if scores.is_empty() {
            return None;
        }
        Some(match self {
            Combine::Sum => scores.iter().sum(),
            Combine::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            Combine::Max => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// Command line arguments for `phenogram` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Combine per-gene phenotype scores of CNVs", long_about = None)]
pub struct Args {
    /// Path to the CNV file with per-gene scores.
    #[arg(long)]
    pub path_input: String,
    /// Path to the output file.
    #[arg(long)]
    pub path_output: String,
    /// 0-based columns of the overlap, upstream, downstream, distance upstream
    /// and distance downstream gene scores.
    #[arg(long, num_args = 5, default_values_t = DEFAULT_COLUMNS.to_vec())]
    pub columns: Vec<usize>,
    /// Function to combine the scores of all genes in a region.
    #[arg(long, value_enum, default_value_t = Combine::Sum)]
    pub function: Combine,
    /// Only gene scores `>= threshold` are considered.
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f64,
    /// Each gene score is taken to this power before combining.
    #[arg(long, default_value_t = 1.0)]
    pub power: f64,
}

/// Positions of the five per-gene score columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreColumns {
    pub overlap: usize,
    pub up: usize,
    pub down: usize,
    pub dist_up: usize,
    pub dist_down: usize,
}

impl TryFrom<&[usize]> for ScoreColumns {
    type Error = anyhow::Error;

    fn try_from(columns: &[usize]) -> Result<Self, Self::Error> {
        match columns {
            [overlap, up, down, dist_up, dist_down] => Ok(Self {
                overlap: *overlap,
                up: *up,
                down: *down,
                dist_up: *dist_up,
                dist_down: *dist_down,
            }),
            _ => anyhow::bail!("expected 5 score columns, got {}", columns.len()),
        }
    }
}

impl ScoreColumns {
    /// Remove the columns `dist_up..=dist_down` from `fields`.
    fn drop_distance(&self, fields: &mut Vec<String>) {
        if self.dist_up <= self.dist_down && self.dist_down < fields.len() {
            fields.drain(self.dist_up..=self.dist_down);
        }
    }
}

/// Parameters for combining gene scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scoring {
    pub combine: Combine,
    pub threshold: f64,
    pub power: f64,
}

/// Parse one gene score; `NA` counts as `0` and `,` is accepted as decimal
/// separator.
fn parse_score(raw: &str) -> Result<f64, anyhow::Error> {
    if raw == "NA" {
        return Ok(0.0);
    }
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("invalid gene score {:?}: {}", raw, e))
}

/// The larger of two combined scores; ties and regions without scores
/// resolve to `lhs`.
fn max_of(lhs: Option<f64>, rhs: Option<f64>) -> Option<f64> {
    if rhs.unwrap_or(0.0) > lhs.unwrap_or(0.0) {
        rhs
    } else {
        lhs
    }
}

/// Render a combined score; a region without scores is written as `0`.
fn render(score: Option<f64>) -> String {
    score.map_or_else(|| "0".to_string(), float_repr)
}

impl Scoring {
    /// Combine the `;`-separated gene scores in `raw`.
    pub fn combine(&self, raw: &str) -> Result<Option<f64>, anyhow::Error> {
        let scores = raw
            .split(';')
            .map(parse_score)
            .filter_ok(|score| *score >= self.threshold)
            .map_ok(|score| score.powf(self.power))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.combine.apply(&scores))
    }

    /// Replace the per-gene score columns of one row by the combined scores.
    pub fn score_row(
        &self,
        fields: &mut Vec<String>,
        columns: &ScoreColumns,
    ) -> Result<(), anyhow::Error> {
        let field = |idx: usize| {
            fields
                .get(idx)
                .map(String::as_str)
                .ok_or_else(|| anyhow::anyhow!("row has no column {}", idx))
        };
        let overlap = self.combine(field(columns.overlap)?)?;
        let adjacent = max_of(
            self.combine(field(columns.up)?)?,
            self.combine(field(columns.down)?)?,
        );
        let dist = max_of(
            self.combine(field(columns.dist_up)?)?,
            self.combine(field(columns.dist_down)?)?,
        );

        fields[columns.overlap] = render(overlap);
        fields[columns.up] = render(adjacent);
        fields[columns.down] = render(dist);
        columns.drop_distance(fields);
        Ok(())
    }
}

/// Main entry point for `phenogram` sub command.
pub fn run(common_args: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("Starting `phenogram`");
    tracing::info!("  common_args = {:?}", &common_args);
    tracing::info!("  args = {:?}", &args);

    let columns = ScoreColumns::try_from(args.columns.as_slice())?;
    let scoring = Scoring {
        combine: args.function,
        threshold: args.threshold,
        power: args.power,
    };

    let path_input = expand_path(&args.path_input);
    let reader = open_read_maybe_gz(Path::new(&path_input))
        .map_err(|e| anyhow::anyhow!("could not open {:?} for reading: {}", path_input, e))?;
    let mut writer = tsv_writer(Path::new(&expand_path(&args.path_output)))?;

    let mut written = 0usize;
    let mut skipped = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        // `*` marks error output of the upstream scoring step
        if line.is_empty() || line.starts_with('*') {
            skipped += 1;
            continue;
        }

        let mut fields = line.split('\t').map(str::to_owned).collect::<Vec<_>>();
        if line.starts_with('#') {
            columns.drop_distance(&mut fields);
        } else {
            scoring
                .score_row(&mut fields, &columns)
                .map_err(|e| anyhow::anyhow!("{}:{}: {}", path_input, lineno + 1, e))?;
            written += 1;
        }
        writer.write_record(&fields)?;
    }
    writer.flush()?;

    tracing::info!(
        "... done writing {} CNVs ({} lines skipped) in {:?}",
        written.separate_with_commas(),
        skipped.separate_with_commas(),
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{run, Args, Combine, ScoreColumns, Scoring, DEFAULT_COLUMNS};
    use crate::common::{read_lines, Args as CommonArgs};

    fn columns() -> ScoreColumns {
        ScoreColumns::try_from(DEFAULT_COLUMNS.as_slice()).unwrap()
    }

    fn row(line: &str) -> Vec<String> {
        line.split('\t').map(String::from).collect()
    }

    #[rstest::rstest]
    #[case(Combine::Sum, vec![0.5, 1.0, 2.0], Some(3.5))]
    #[case(Combine::Mean, vec![0.5, 1.0, 3.0], Some(1.5))]
    #[case(Combine::Max, vec![0.5, 3.0, 2.0], Some(3.0))]
    #[case(Combine::Sum, vec![], None)]
    #[case(Combine::Max, vec![], None)]
    fn combine_apply(
        #[case] combine: Combine,
        #[case] scores: Vec<f64>,
        #[case] expected: Option<f64>,
    ) {
        assert_eq!(combine.apply(&scores), expected);
    }

    #[rstest::rstest]
    #[case(Combine::Sum, 0.0, 1.0, "0,5;NA;2", Some(2.5))]
    #[case(Combine::Sum, 0.0, 1.0, "NA", Some(0.0))]
    #[case(Combine::Sum, 0.5, 1.0, "NA;0.25", None)]
    #[case(Combine::Mean, 0.5, 2.0, "0.4;1;2", Some(2.5))]
    #[case(Combine::Max, 1.0, 3.0, "1;2;0,5", Some(8.0))]
    fn scoring_combine(
        #[case] combine: Combine,
        #[case] threshold: f64,
        #[case] power: f64,
        #[case] raw: &str,
        #[case] expected: Option<f64>,
    ) -> Result<(), anyhow::Error> {
        let scoring = Scoring {
            combine,
            threshold,
            power,
        };
        assert_eq!(scoring.combine(raw)?, expected);
        Ok(())
    }

    #[test]
    fn scoring_combine_rejects_garbage() {
        let scoring = Scoring {
            combine: Combine::Sum,
            threshold: 0.0,
            power: 1.0,
        };
        assert!(scoring.combine("0.5;x").is_err());
    }

    #[test]
    fn score_row_takes_max_of_both_sides() -> Result<(), anyhow::Error> {
        let scoring = Scoring {
            combine: Combine::Sum,
            threshold: 0.0,
            power: 1.0,
        };
        let mut fields = row("chr1\t0\t10\tc1\tloss\tEP:06\t0,5;NA;2\t1\tNA\t0.25;0.5\t3\tEP:05");

        scoring.score_row(&mut fields, &columns())?;

        assert_eq!(
            fields,
            row("chr1\t0\t10\tc1\tloss\tEP:06\t2.5\t1.0\t3.0\tEP:05")
        );
        Ok(())
    }

    #[test]
    fn score_row_without_passing_scores_writes_zero() -> Result<(), anyhow::Error> {
        let scoring = Scoring {
            combine: Combine::Mean,
            threshold: 0.5,
            power: 1.0,
        };
        let mut fields = row("chr1\t0\t10\tc1\tgain\tNA\tNA\t0.1\tNA\t0,2\tNA\tEP:05");

        scoring.score_row(&mut fields, &columns())?;

        assert_eq!(fields, row("chr1\t0\t10\tc1\tgain\tNA\t0\t0\t0\tEP:05"));
        Ok(())
    }

    #[test]
    fn score_row_too_few_columns() {
        let scoring = Scoring {
            combine: Combine::Sum,
            threshold: 0.0,
            power: 1.0,
        };
        let mut fields = row("chr1\t0\t10\tc1\tloss\tEP:06\t1\t1");
        assert!(scoring.score_row(&mut fields, &columns()).is_err());
    }

    #[test]
    fn score_columns_need_five() {
        assert!(ScoreColumns::try_from([6, 7, 8].as_slice()).is_err());
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmp_dir = TempDir::default();
        let path_output = tmp_dir.join("out.tab");
        let args = Args {
            path_input: "tests/phenogram/scores.tab".into(),
            path_output: path_output.to_string_lossy().into_owned(),
            columns: DEFAULT_COLUMNS.to_vec(),
            function: Combine::Sum,
            threshold: 0.0,
            power: 1.0,
        };

        run(&CommonArgs::default(), &args)?;

        let lines = read_lines(&path_output)?.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(
            lines,
            vec![
                "#chr\tstart\tend\tname\ttype\tHPO\toverlap\tup\tdown\ttarget",
                "chr1\t9\t19\tcnv1\tloss\tEP:06\t0.5\t1.2\t1.0\tEP:05",
                "chr1\t12\t19\tcnv3\tloss\tEP:03\t0.0\t0.8\t0.0\tEP:03",
            ]
        );
        Ok(())
    }

    #[test]
    fn run_reports_line_of_bad_score() {
        let tmp_dir = TempDir::default();
        let args = Args {
            path_input: "tests/phenogram/bad_score.tab".into(),
            path_output: tmp_dir.join("out.tab").to_string_lossy().into_owned(),
            columns: DEFAULT_COLUMNS.to_vec(),
            function: Combine::Sum,
            threshold: 0.0,
            power: 1.0,
        };

        let msg = format!("{}", run(&CommonArgs::default(), &args).unwrap_err());
        assert!(msg.contains("bad_score.tab:2:"), "{}", msg);
    }

    #[test]
    fn parse_defaults() {
        let args = Args::try_parse_from(["phenogram", "--path-input", "i", "--path-output", "o"])
            .unwrap();
        assert_eq!(args.columns, vec![6, 7, 8, 9, 10]);
        assert_eq!(args.function, Combine::Sum);

        let args = Args::try_parse_from([
            "phenogram",
            "--path-input",
            "i",
            "--path-output",
            "o",
            "--columns",
            "1",
            "2",
            "3",
            "4",
            "5",
            "--function",
            "max",
        ])
        .unwrap();
        assert_eq!(args.columns, vec![1, 2, 3, 4, 5]);
        assert_eq!(args.function, Combine::Max);

        assert!(Args::try_parse_from([
            "phenogram",
            "--path-input",
            "i",
            "--path-output",
            "o",
            "--columns",
            "1",
            "2",
        ])
        .is_err());
    }
}
