//! Plain-text column I/O
//!
//! Reads whitespace separated numeric tables (first column time, remaining
//! columns values, `#` starts a comment) and writes phase-average results in
//! the same format.

use crate::error::PhaseAverageError;
use crate::phase::PhaseUnit;
use crate::result::PhaseAverageResult;
use crate::series::OwnedSeries;
use crate::Result;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Parse a column table from any reader
pub fn parse_columns<R: Read>(reader: R) -> Result<OwnedSeries> {
    let mut time = Vec::new();
    let mut values = Vec::new();
    let mut components: Option<usize> = None;

    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line_number = index + 1;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        let row = content
            .split_whitespace()
            .map(|field| {
                field.parse::<f64>().map_err(|_| PhaseAverageError::Parse {
                    line: line_number,
                    message: format!("invalid number '{}'", field),
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        if row.len() < 2 {
            return Err(PhaseAverageError::Parse {
                line: line_number,
                message: "expected a time column and at least one value column".to_string(),
            });
        }

        let width = row.len() - 1;
        match components {
            None => components = Some(width),
            Some(expected) if expected != width => {
                return Err(PhaseAverageError::Parse {
                    line: line_number,
                    message: format!("expected {} value columns, found {}", expected, width),
                });
            }
            Some(_) => {}
        }

        time.push(row[0]);
        values.extend_from_slice(&row[1..]);
    }

    OwnedSeries::new(time, values, components.unwrap_or(1))
}

/// Read a column table from a file
pub fn read_columns<P: AsRef<Path>>(path: P) -> Result<OwnedSeries> {
    let file = File::open(path.as_ref())?;
    let series = parse_columns(file)?;
    log::info!(
        "Read {} samples with {} components from {}",
        series.len(),
        series.components,
        path.as_ref().display()
    );
    Ok(series)
}

/// Write one row per bin: midpoint, count, mean per component, std per component
pub fn format_result<W: Write>(
    mut writer: W,
    result: &PhaseAverageResult,
    unit: PhaseUnit,
) -> Result<()> {
    let components = result.components();
    let mut header = format!("# midpoint[{}] count", unit);
    for c in 0..components {
        header.push_str(&format!(" mean_{}", c));
    }
    for c in 0..components {
        header.push_str(&format!(" std_{}", c));
    }
    writeln!(writer, "{}", header)?;

    let midpoints = result.midpoints_in(unit);
    for (bin, midpoint) in result.bins().iter().zip(midpoints) {
        let mut row = format!("{:.10e} {}", midpoint, bin.count);
        for mean in &bin.mean {
            row.push_str(&format!(" {:.10e}", mean));
        }
        for c in 0..components {
            row.push_str(&format!(" {:.10e}", bin.dispersion.std(c)));
        }
        writeln!(writer, "{}", row)?;
    }
    Ok(())
}

/// Write a result table to a file
pub fn write_result<P: AsRef<Path>>(
    path: P,
    result: &PhaseAverageResult,
    unit: PhaseUnit,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    format_result(&mut writer, result, unit)?;
    writer.flush()?;
    log::info!(
        "Saved {} bins to {}",
        result.len(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::averager::{phase_average, PhaseAverageConfig};

    #[test]
    fn test_parse_columns_with_comments() {
        let text = "# time ux uy\n0.0 1.0 2.0\n\n0.5 3.0 4.0 # trailing\n";
        let series = parse_columns(text.as_bytes()).unwrap();
        assert_eq!(series.time, vec![0.0, 0.5]);
        assert_eq!(series.values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(series.components, 2);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse_columns("0.0 1.0\n0.1 abc\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PhaseAverageError::Parse { line: 2, .. }));

        let err = parse_columns("0.0 1.0\n0.1 2.0 3.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PhaseAverageError::Parse { line: 2, .. }));

        let err = parse_columns("0.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PhaseAverageError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_empty_table() {
        let series = parse_columns("# nothing here\n".as_bytes()).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.components, 1);
    }

    #[test]
    fn test_format_result() {
        let series = parse_columns("0.0 1.0\n0.25 2.0\n0.5 3.0\n0.75 4.0\n".as_bytes()).unwrap();
        let config = PhaseAverageConfig::new(1.0)
            .unwrap()
            .with_bins(4)
            .with_bin_center_offset(Some(0.0));
        let result = phase_average(&series.as_series().unwrap(), &config).unwrap();

        let mut out = Vec::new();
        format_result(&mut out, &result, PhaseUnit::Cycles).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "# midpoint[cycles] count mean_0 std_0");
        assert_eq!(lines.len(), 5);
        assert!(lines[1].starts_with("1.2500000000e-1 1 "));
    }
}
