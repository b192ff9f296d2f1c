//! Reading and writing matrices on disk.
//!
//! Three formats are understood:
//!
//! * triplet text, one `row col value` entry per line with 1-based indices
//! * dense comma separated values, one matrix row per line
//! * a compressed sparse column triple `<base>.val`, `<base>.ri`, `<base>.cp` holding the
//!   values (little-endian `f64`), the 0-based row indices and the `n + 1` column pointers
//!   (both little-endian `i32`)
//!
//! Structural problems with the content are reported as [`SubmatrixError::MalformedInput`]
//! inside the returned [`anyhow::Error`].

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::debug;
use nalgebra_sparse::CscMatrix;
use ndarray::{Array2, ArrayView2};

use crate::error::SubmatrixError;
use crate::matrix::MaskedMatrix;

fn malformed(path: &Path, message: impl std::fmt::Display) -> anyhow::Error {
    SubmatrixError::MalformedInput(format!("{}: {}", path.display(), message)).into()
}

/// A `rows cols nnz` size line as written ahead of coordinate data. Data lines carry
/// indentation and a real value, a size line has neither.
fn is_size_header(line: &str, dim: usize) -> bool {
    if line.starts_with(char::is_whitespace) {
        return false;
    }
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [rows, cols, nnz] => {
            rows.parse::<usize>() == Ok(dim)
                && cols.parse::<usize>() == Ok(dim)
                && nnz.parse::<usize>().is_ok()
        }
        _ => false,
    }
}

/// Reads a `dim x dim` matrix from triplet text. Entries with `|value| <= threshold` are
/// masked.
///
/// Lines that do not start with two integers and a number are skipped, and so is a leading
/// unindented `dim dim nnz` size line. An index outside `1..=dim` or a second nonzero value
/// for the same position is malformed input.
pub fn read_triplets(
    path: impl AsRef<Path>,
    dim: usize,
    threshold: f64,
) -> anyhow::Result<MaskedMatrix> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let mut values = Array2::<f64>::zeros((dim, dim));
    let mut entries = 0usize;
    let mut first_data_line = true;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        let mut tokens = line.split_whitespace();
        let parsed = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(row), Some(col), Some(value)) => {
                match (row.parse::<usize>(), col.parse::<usize>(), value.parse::<f64>()) {
                    (Ok(row), Ok(col), Ok(value)) => Some((row, col, value)),
                    _ => None,
                }
            }
            _ => None,
        };
        let Some((row, col, value)) = parsed else {
            continue;
        };
        if std::mem::take(&mut first_data_line) && is_size_header(&line, dim) {
            debug!("skipping size line {} of {}", line_no + 1, path.display());
            continue;
        }

        if row == 0 || col == 0 || row > dim || col > dim {
            return Err(malformed(
                path,
                format!(
                    "line {}: entry ({}, {}) outside a {}x{} matrix",
                    line_no + 1,
                    row,
                    col,
                    dim,
                    dim
                ),
            ));
        }
        let slot = &mut values[[row - 1, col - 1]];
        if *slot != 0.0 {
            return Err(malformed(
                path,
                format!("line {}: duplicate entry ({}, {})", line_no + 1, row, col),
            ));
        }
        *slot = value;
        entries += 1;
    }

    debug!("read {} triplets from {}", entries, path.display());
    Ok(MaskedMatrix::from_dense_threshold(values, threshold)?)
}

/// Reads a square dense matrix stored as comma separated rows. Entries with
/// `|value| <= threshold` are masked.
pub fn read_dense_csv(path: impl AsRef<Path>, threshold: f64) -> anyhow::Result<MaskedMatrix> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("failed to read {}", path.display()))?;
        let line = record.position().map_or(0, |position| position.line());
        let row = record
            .iter()
            .map(|field| field.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| malformed(path, format!("line {}: {}", line, err)))?;
        rows.push(row);
    }

    let dim = rows.len();
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != dim) {
        return Err(malformed(
            path,
            format!("row {} has {} entries, expected {}", i + 1, row.len(), dim),
        ));
    }

    let values = Array2::from_shape_vec((dim, dim), rows.into_iter().flatten().collect())?;
    debug!("read {}x{} dense matrix from {}", dim, dim, path.display());
    Ok(MaskedMatrix::from_dense_threshold(values, threshold)?)
}

/// Writes `matrix` as comma separated rows in scientific notation.
pub fn write_dense_csv(path: impl AsRef<Path>, matrix: ArrayView2<'_, f64>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in matrix.rows() {
        writer.write_record(row.iter().map(|v| format!("{:e}", v)))?;
    }
    writer.flush()?;
    debug!("wrote {}x{} matrix to {}", matrix.nrows(), matrix.ncols(), path.display());
    Ok(())
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

fn read_bytes(path: &Path, width: usize) -> anyhow::Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.len() % width != 0 {
        return Err(malformed(
            path,
            format!("length {} is not a multiple of {}", bytes.len(), width),
        ));
    }
    Ok(bytes)
}

fn read_indices(path: &Path) -> anyhow::Result<Vec<usize>> {
    read_bytes(path, 4)?
        .chunks_exact(4)
        .map(|chunk| {
            let index = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            usize::try_from(index).map_err(|_| malformed(path, format!("negative index {}", index)))
        })
        .collect()
}

fn read_values(path: &Path) -> anyhow::Result<Vec<f64>> {
    Ok(read_bytes(path, 8)?
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect())
}

/// Reads the square CSC triple stored under `base`.
pub fn read_csc_binary(base: impl AsRef<Path>) -> anyhow::Result<CscMatrix<f64>> {
    let base = base.as_ref();
    let cp_path = with_suffix(base, ".cp");
    let col_offsets = read_indices(&cp_path)?;
    let row_indices = read_indices(&with_suffix(base, ".ri"))?;
    let values = read_values(&with_suffix(base, ".val"))?;

    let dim = match col_offsets.len() {
        0 => return Err(malformed(&cp_path, "no column pointers")),
        len => len - 1,
    };
    if row_indices.len() != values.len() {
        return Err(malformed(
            base,
            format!(
                "{} row indices but {} values",
                row_indices.len(),
                values.len()
            ),
        ));
    }

    let matrix = CscMatrix::try_from_csc_data(dim, dim, col_offsets, row_indices, values)
        .map_err(SubmatrixError::from)
        .with_context(|| format!("invalid CSC data under {}", base.display()))?;
    debug!(
        "read {}x{} CSC matrix with {} nonzeros from {}",
        dim,
        dim,
        matrix.nnz(),
        base.display()
    );
    Ok(matrix)
}

fn to_i32(index: usize, path: &Path) -> anyhow::Result<i32> {
    i32::try_from(index).map_err(|_| malformed(path, format!("index {} exceeds i32", index)))
}

/// Writes `matrix` as a CSC triple under `base`.
pub fn write_csc_binary(base: impl AsRef<Path>, matrix: &CscMatrix<f64>) -> anyhow::Result<()> {
    let base = base.as_ref();

    let mut offsets = Vec::with_capacity(4 * (matrix.ncols() + 1));
    for &offset in matrix.col_offsets() {
        offsets.extend_from_slice(&to_i32(offset, base)?.to_le_bytes());
    }
    let mut indices = Vec::with_capacity(4 * matrix.nnz());
    for &index in matrix.row_indices() {
        indices.extend_from_slice(&to_i32(index, base)?.to_le_bytes());
    }
    let values: Vec<u8> = matrix
        .values()
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();

    for (suffix, bytes) in [(".cp", offsets), (".ri", indices), (".val", values)] {
        let path = with_suffix(base, suffix);
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    }
    debug!(
        "wrote {}x{} CSC matrix with {} nonzeros to {}",
        matrix.nrows(),
        matrix.ncols(),
        matrix.nnz(),
        base.display()
    );
    Ok(())
}
