//! Common functionality.

use byte_unit::{Byte, UnitType};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod io;

pub use io::{open_read_maybe_gz, open_write_maybe_gz, read_lines, tsv_reader, tsv_writer};

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    let rss_pages = procfs::process::Process::myself().and_then(|me| me.stat().map(|s| s.rss));
    match rss_pages {
        Ok(rss_pages) => {
            let rss = Byte::from_u64(rss_pages * procfs::page_size());
            tracing::debug!(
                "RSS now: {:.2}",
                rss.get_appropriate_unit(UnitType::Binary)
            );
        }
        Err(e) => tracing::debug!("could not determine RSS: {}", e),
    }
}

/// Expand `~` in a path given on the command line.
pub fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}

/// Format `value` with `digits` significant digits.
///
/// Integral results keep one decimal place, so `2` is rendered as `2.0` and
/// `0.12345` as `0.123`.  Very small and very large magnitudes switch to
/// exponent notation (see [`float_repr`]).
pub fn round_to(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return float_repr(value);
    }
    let rounded: f64 = format!("{:.*e}", digits.saturating_sub(1), value)
        .parse()
        .unwrap_or(value);
    float_repr(rounded)
}

/// Shortest round-trip rendering of a float as used in the legacy tables.
///
/// Magnitudes below `1e-4` or from `1e16` on are written in exponent
/// notation with a signed two-digit exponent (`1e-05`, `1.5e+16`).  All
/// other values are written positionally with at least one decimal place.
pub fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let sci = format!("{:e}", value);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..16).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let positional = format!("{}", value);
        if positional.contains('.') {
            positional
        } else {
            format!("{}.0", positional)
        }
    }
}

/// Mean and sample standard deviation of `values`.
///
/// Returns `(0.0, 0.0)` for empty input and a standard deviation of `0.0`
/// for a single value.
pub fn mean_sd(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    #[test]
    fn trace_rss_now_smoke() {
        super::trace_rss_now();
    }

    #[rstest::rstest]
    #[case(0.12345, "0.123")]
    #[case(2.0, "2.0")]
    #[case(1234.5, "1230.0")]
    #[case(0.0, "0.0")]
    #[case(0.5, "0.5")]
    #[case(-0.98765, "-0.988")]
    #[case(0.00001, "1e-05")]
    #[case(0.000012345, "1.23e-05")]
    #[case(0.00012345, "0.000123")]
    #[case(-0.000098765, "-9.88e-05")]
    #[case(12345678901234567.0, "1.23e+16")]
    fn round_to(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(super::round_to(value, 3), expected);
    }

    #[rstest::rstest]
    #[case(2.0, "2.0")]
    #[case(0.1, "0.1")]
    #[case(0.0001, "0.0001")]
    #[case(0.00005, "5e-05")]
    #[case(1e16, "1e+16")]
    #[case(1234567.0, "1234567.0")]
    #[case(-0.0, "-0.0")]
    #[case(f64::INFINITY, "inf")]
    fn float_repr(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(super::float_repr(value), expected);
    }

    #[rstest::rstest]
    #[case(vec![], 0.0, 0.0)]
    #[case(vec![3.0], 3.0, 0.0)]
    #[case(vec![1.0, 3.0], 2.0, std::f64::consts::SQRT_2)]
    #[case(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 5.0, 2.138089935299395)]
    fn mean_sd(#[case] values: Vec<f64>, #[case] mean: f64, #[case] sd: f64) {
        let (actual_mean, actual_sd) = super::mean_sd(&values);
        assert!(float_cmp::approx_eq!(f64, mean, actual_mean, ulps = 4));
        assert!(float_cmp::approx_eq!(f64, sd, actual_sd, epsilon = 1e-12));
    }

    #[test]
    fn expand_path_without_tilde() {
        assert_eq!(super::expand_path("tests/x.tab"), "tests/x.tab");
    }
}
