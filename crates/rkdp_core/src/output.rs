//! CSV persistence of integration traces.
//!
//! Layout: one caller-supplied header line, then one row per sample with the
//! time followed by the state components, each in C-style scientific notation
//! (`1.0000000000e+00`) and separated by `", "`.

use crate::trace::Trace;
use crate::traits::Scalar;
use anyhow::{anyhow, bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const SEPARATOR: &str = ", ";

/// Formats a value with 10 digits after the point and a signed, at least
/// two-digit exponent.
pub fn format_sci<T: Scalar>(value: T) -> String {
    let raw = format!("{:.10e}", value);
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    match exponent.parse::<i32>() {
        Ok(exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        Err(_) => raw,
    }
}

pub fn write_csv<W: Write, T: Scalar>(writer: &mut W, header: &str, trace: &Trace<T>) -> Result<()> {
    writeln!(writer, "{header}")?;
    for (t, state) in trace.iter() {
        let mut row = format_sci(t);
        for value in state {
            row.push_str(SEPARATOR);
            row.push_str(&format_sci(*value));
        }
        writeln!(writer, "{row}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_csv<T: Scalar>(path: impl AsRef<Path>, header: &str, trace: &Trace<T>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create trace file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_csv(&mut writer, header, trace)
        .with_context(|| format!("Failed to write trace file {}", path.display()))
}

/// A trace read back from CSV, together with its header line.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTrace {
    pub header: String,
    pub trace: Trace<f64>,
}

/// Parses the CSV layout written by [`write_csv`].
///
/// Empty fields are ignored, so rows with a trailing separator are accepted.
pub fn read_csv<R: BufRead>(reader: R) -> Result<CsvTrace> {
    let mut lines = reader.lines();
    let header = lines
        .next()
        .ok_or_else(|| anyhow!("Trace file is empty; expected a header line."))??
        .trim_end()
        .to_string();

    let mut trace: Option<Trace<f64>> = None;
    let mut row = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line_no = idx + 2;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        row.clear();
        for field in line.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let value: f64 = field
                .parse()
                .with_context(|| format!("Line {line_no}: invalid number \"{field}\""))?;
            row.push(value);
        }
        if row.len() < 2 {
            bail!("Line {line_no}: expected a time and at least one state value.");
        }

        let trace = trace.get_or_insert_with(|| Trace::new(row.len() - 1));
        if row.len() - 1 != trace.dim() {
            bail!(
                "Line {line_no}: expected {} state values, got {}.",
                trace.dim(),
                row.len() - 1
            );
        }
        trace.push(row[0], &row[1..]);
    }

    Ok(CsvTrace {
        header,
        trace: trace.unwrap_or_else(|| Trace::new(0)),
    })
}

pub fn load_csv(path: impl AsRef<Path>) -> Result<CsvTrace> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open trace file {}", path.display()))?;
    read_csv(BufReader::new(file)).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::integrate_dp45;
    use crate::controller::AdaptiveSettings;
    use crate::problem::Problem;
    use crate::systems::HarmonicOscillator;
    use crate::tableau::ButcherTableau;

    #[test]
    fn format_sci_matches_c_printf_layout() {
        assert_eq!(format_sci(1.0), "1.0000000000e+00");
        assert_eq!(format_sci(0.0), "0.0000000000e+00");
        assert_eq!(format_sci(-0.00125), "-1.2500000000e-03");
        assert_eq!(format_sci(6.02214076e23), "6.0221407600e+23");
        assert_eq!(format_sci(1e-300), "1.0000000000e-300");
        assert_eq!(format_sci(f64::NAN), "NaN");
    }

    #[test]
    fn write_csv_emits_header_and_rows() {
        let mut trace = Trace::new(2);
        trace.push(0.0, &[1.0, 0.0]);
        trace.push(0.5, &[0.5, -2.0]);

        let mut buffer = Vec::new();
        write_csv(&mut buffer, "T [time], X [pos], Y [vel]", &trace).expect("write");
        let text = String::from_utf8(buffer).expect("utf8");

        assert_eq!(
            text,
            "T [time], X [pos], Y [vel]\n\
             0.0000000000e+00, 1.0000000000e+00, 0.0000000000e+00\n\
             5.0000000000e-01, 5.0000000000e-01, -2.0000000000e+00\n"
        );
    }

    #[test]
    fn read_csv_accepts_trailing_separators() {
        let text = "T [time], X [pos], Y [vel], \n\
                    0.0000000000e+00, 1.0000000000e+00, 0.0000000000e+00, \n\
                    1.0000000000e-01, 9.9500416528e-01, -9.9833416647e-02, \n";
        let parsed = read_csv(text.as_bytes()).expect("parse");
        assert_eq!(parsed.header, "T [time], X [pos], Y [vel],");
        assert_eq!(parsed.trace.len(), 2);
        assert_eq!(parsed.trace.dim(), 2);
        assert_eq!(parsed.trace.state(1), &[9.9500416528e-01, -9.9833416647e-02]);
    }

    #[test]
    fn read_csv_reports_bad_rows() {
        let err = read_csv("h\n1.0, abc\n".as_bytes()).expect_err("bad number");
        assert!(format!("{err:#}").contains("Line 2"));

        let err = read_csv("h\n0.0, 1.0, 2.0\n1.0, 3.0\n".as_bytes()).expect_err("ragged");
        assert!(format!("{err}").contains("expected 2 state values"));

        assert!(read_csv("".as_bytes()).is_err());
    }

    #[test]
    fn integrated_trace_survives_file_round_trip() {
        let tableau = ButcherTableau::dormand_prince();
        let problem = Problem::new(vec![1.0, 0.0], 0.0, 1.0);
        let outcome = integrate_dp45(
            &HarmonicOscillator::default(),
            &problem,
            &tableau,
            AdaptiveSettings::with_tolerance(1e-8),
        )
        .expect("run");

        let path = std::env::temp_dir().join(format!("rkdp_trace_{}.csv", std::process::id()));
        save_csv(&path, "T [time], X [pos], Y [vel]", &outcome.trace).expect("save");
        let loaded = load_csv(&path).expect("load");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.header, "T [time], X [pos], Y [vel]");
        assert_eq!(loaded.trace.len(), outcome.trace.len());
        for ((t_a, s_a), (t_b, s_b)) in loaded.trace.iter().zip(outcome.trace.iter()) {
            assert!((t_a - t_b).abs() <= 1e-10 * t_b.abs().max(1e-300));
            for (a, b) in s_a.iter().zip(s_b) {
                assert!((a - b).abs() <= 1e-10 * b.abs().max(1e-12));
            }
        }
    }
}
