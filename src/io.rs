//! Tabular text files.
//!
//! Every file starts with one header line that is carried through verbatim.
//! Each following non-blank line holds `input_dim` feature values then
//! `target_dim` target values, separated by whitespace and/or commas.
//! Range files use the same layout with a fixed number of rows: min then max
//! for simple ranges, and low-min, low-max, high-min, high-max for mixed ones.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::normalize::{MixedRangeSet, Range, RangeSet, Ranges};
use crate::train::ProgressRecord;
use crate::{Dataset, Error, Result};

/// Header of a progress file, followed by one `R2Score_<k>` column per output.
pub const PROGRESS_HEADER: &str = "Epoch, MeanSquaredError, ElapsedTimeInMS";

/// A parsed tabular file.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: String,
    pub data: Dataset,
}

/// Parse a table from any buffered reader.
///
/// Fails on a missing header, a non-numeric field, or a row with the wrong
/// number of fields; nothing is returned on failure.
pub fn parse_table<R: BufRead>(reader: R, input_dim: usize, target_dim: usize) -> Result<Table> {
    let mut lines = reader.lines().enumerate();
    let header = match lines.next() {
        Some((_, line)) => line.map_err(|e| parse_error(1, e.to_string()))?,
        None => return Err(parse_error(1, "missing header line")),
    };

    let mut data = Dataset::new(input_dim, target_dim)?;
    let width = input_dim + target_dim;
    let mut row = Vec::with_capacity(width);
    for (idx, line) in lines {
        let line_no = idx + 1;
        let line = line.map_err(|e| parse_error(line_no, e.to_string()))?;

        row.clear();
        for field in fields(&line) {
            let value = field
                .parse::<f64>()
                .map_err(|e| parse_error(line_no, format!("field {field:?}: {e}")))?;
            row.push(value);
        }
        if row.is_empty() {
            continue;
        }
        if row.len() != width {
            return Err(parse_error(
                line_no,
                format!(
                    "expected {width} values ({input_dim} in, {target_dim} out), found {}",
                    row.len()
                ),
            ));
        }
        data.push(&row[..input_dim], &row[input_dim..])?;
    }

    Ok(Table { header, data })
}

pub fn read_table(path: impl AsRef<Path>, input_dim: usize, target_dim: usize) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let table = parse_table(BufReader::new(file), input_dim, target_dim)?;
    log::debug!("read {} rows from {}", table.data.len(), path.display());
    Ok(table)
}

/// Header, then one space-separated row per dataset row.
pub fn format_table<W: Write>(mut out: W, header: &str, data: &Dataset) -> std::io::Result<()> {
    writeln!(out, "{header}")?;
    for (x, y) in data.iter() {
        write_row(&mut out, x.iter().chain(y))?;
    }
    out.flush()
}

pub fn write_table(path: impl AsRef<Path>, header: &str, data: &Dataset) -> Result<()> {
    let path = path.as_ref();
    with_file(path, |out| format_table(out, header, data))
}

/// Read a 2-row range file.
pub fn read_range_file(path: impl AsRef<Path>, input_dim: usize, target_dim: usize) -> Result<RangeSet> {
    let table = read_table(path, input_dim, target_dim)?;
    let [set] = range_sets(&table.data)?;
    Ok(set)
}

/// Read a 4-row mixed range file.
pub fn read_mixed_range_file(
    path: impl AsRef<Path>,
    input_dim: usize,
    target_dim: usize,
) -> Result<MixedRangeSet> {
    let table = read_table(path, input_dim, target_dim)?;
    let [low, high] = range_sets(&table.data)?;
    Ok(MixedRangeSet { low, high })
}

/// Read a range file of either shape. A 2-row file gives
/// [`Ranges::Simple`], a 4-row file [`Ranges::Mixed`].
pub fn read_ranges(path: impl AsRef<Path>, input_dim: usize, target_dim: usize) -> Result<Ranges> {
    let table = read_table(path, input_dim, target_dim)?;
    if table.data.len() == 2 {
        let [set] = range_sets(&table.data)?;
        Ok(Ranges::Simple(set))
    } else {
        let [low, high] = range_sets(&table.data)?;
        Ok(Ranges::Mixed(MixedRangeSet { low, high }))
    }
}

pub fn write_range_file(path: impl AsRef<Path>, header: &str, ranges: &RangeSet) -> Result<()> {
    with_file(path.as_ref(), |mut out| {
        writeln!(out, "{header}")?;
        write_range_rows(&mut out, ranges)?;
        out.flush()
    })
}

pub fn write_mixed_range_file(path: impl AsRef<Path>, header: &str, ranges: &MixedRangeSet) -> Result<()> {
    with_file(path.as_ref(), |mut out| {
        writeln!(out, "{header}")?;
        write_range_rows(&mut out, &ranges.low)?;
        write_range_rows(&mut out, &ranges.high)?;
        out.flush()
    })
}

/// `Epoch, MeanSquaredError, ElapsedTimeInMS, R2Score_0, ...`
pub fn format_progress<W: Write>(
    mut out: W,
    records: &[ProgressRecord],
    outputs: usize,
) -> std::io::Result<()> {
    write!(out, "{PROGRESS_HEADER}")?;
    for k in 0..outputs {
        write!(out, ", R2Score_{k}")?;
    }
    writeln!(out)?;

    for r in records {
        write!(out, "{}, {}, {}", r.epoch, r.mse, r.elapsed_ms)?;
        for v in &r.r2 {
            write!(out, ", {v}")?;
        }
        writeln!(out)?;
    }
    out.flush()
}

pub fn write_progress(path: impl AsRef<Path>, records: &[ProgressRecord], outputs: usize) -> Result<()> {
    with_file(path.as_ref(), |out| format_progress(out, records, outputs))
}

fn fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty())
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

fn with_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(BufWriter<File>) -> std::io::Result<()>,
{
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    write(BufWriter::new(file)).map_err(|e| Error::io(path, e))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

fn write_row<'a, W: Write>(out: &mut W, values: impl Iterator<Item = &'a f64>) -> std::io::Result<()> {
    for (i, v) in values.enumerate() {
        if i > 0 {
            out.write_all(b" ")?;
        }
        write!(out, "{v}")?;
    }
    writeln!(out)
}

fn write_range_rows<W: Write>(out: &mut W, ranges: &RangeSet) -> std::io::Result<()> {
    let all = || ranges.inputs.iter().chain(&ranges.outputs);
    write_row(out, all().map(|r| &r.min))?;
    write_row(out, all().map(|r| &r.max))
}

/// `N` consecutive (min row, max row) pairs as range sets.
fn range_sets<const N: usize>(data: &Dataset) -> Result<[RangeSet; N]> {
    let rows = 2 * N;
    if data.len() != rows {
        return Err(parse_error(
            data.len() + 1,
            format!("range file needs exactly {rows} data rows, found {}", data.len()),
        ));
    }
    let pair = |min: &[f64], max: &[f64]| -> Vec<Range> {
        min.iter().zip(max).map(|(&a, &b)| Range::new(a, b)).collect()
    };
    Ok(std::array::from_fn(|k| {
        let (lo, hi) = (2 * k, 2 * k + 1);
        RangeSet {
            inputs: pair(data.features(lo), data.features(hi)),
            outputs: pair(data.targets(lo), data.targets(hi)),
        }
    }))
}
