//! Fixed binary layout for dense and CSR matrices.
//!
//! All integers are little-endian `u64`, all values little-endian IEEE-754
//! `f64`. There is no magic number or version tag.
//!
//! Dense: `[nrows][ncols][nrows * ncols values, row-major, no padding]`.
//!
//! Sparse: `[nrows][ncols][nnz][nnz x (value, row, col)]`, with rows ascending.
//! Decoding rebuilds the row pointers through [`Csr::append`], so a stream
//! whose rows go backwards fails exactly like an out-of-order append.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use csrmm_core::{Csr, Dense, Error, Result};

/// Types with a binary on-disk representation.
pub trait BinaryCodec: Sized {
    /// Read one matrix from the start of `reader`.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] for a truncated or malformed stream, or whatever the
    /// store's constructors reject.
    fn decode<R: Read>(reader: &mut R) -> Result<Self>;

    /// Write `self` to `writer`.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] on write failure.
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()>;

    /// Decode from a file.
    ///
    /// # Errors
    ///
    /// See [`BinaryCodec::decode`]; also fails if the file cannot be opened.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let out = Self::decode(&mut reader)?;
        tracing::debug!(path = %path.display(), "loaded matrix");
        Ok(out)
    }

    /// Encode to a file, replacing any previous contents.
    ///
    /// # Errors
    ///
    /// [`Error::Io`].
    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.encode(&mut writer)?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), "saved matrix");
        Ok(())
    }
}

fn truncated(what: &str) -> impl FnOnce(io::Error) -> Error + '_ {
    move |err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::format(format!("stream ended while reading {what}"))
        } else {
            Error::Io(err)
        }
    }
}

fn read_size<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let raw = reader
        .read_u64::<LittleEndian>()
        .map_err(truncated(what))?;
    usize::try_from(raw).map_err(|_| Error::format(format!("{what} {raw} does not fit in usize")))
}

fn write_size<W: Write>(writer: &mut W, value: usize) -> Result<()> {
    // usize is at most 64 bits on every supported target
    writer.write_u64::<LittleEndian>(value as u64)?;
    Ok(())
}

/// Read a dense matrix.
///
/// # Errors
///
/// [`Error::Format`] if the stream is short or the shape overflows.
pub fn decode_dense<R: Read>(reader: &mut R) -> Result<Dense<f64>> {
    let mut out = Dense::default();
    decode_dense_into(reader, &mut out)?;
    Ok(out)
}

/// Read a dense matrix into an existing store, resizing it to the decoded shape.
///
/// The value bytes are read before `out` is touched, so a header promising
/// more data than the stream holds fails without allocating for it.
///
/// # Errors
///
/// As [`decode_dense`]. On a short stream `out` is left unchanged.
pub fn decode_dense_into<R: Read>(reader: &mut R, out: &mut Dense<f64>) -> Result<()> {
    let nrows = read_size(reader, "dense row count")?;
    let ncols = read_size(reader, "dense column count")?;
    let expected = nrows
        .checked_mul(ncols)
        .and_then(|n| n.checked_mul(size_of::<f64>()))
        .ok_or_else(|| Error::format(format!("dense shape {nrows} x {ncols} overflows")))?;

    // grows only as bytes arrive
    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(expected as u64)
        .read_to_end(&mut bytes)?;
    if bytes.len() != expected {
        return Err(Error::format(format!(
            "stream ended while reading dense values: expected {expected} bytes, got {}",
            bytes.len()
        )));
    }

    out.resize(nrows, ncols)?;
    if ncols > 0 {
        for (row, src) in out
            .rows_mut()
            .zip(bytes.chunks_exact(ncols * size_of::<f64>()))
        {
            LittleEndian::read_f64_into(src, row);
        }
    }
    tracing::debug!(nrows, ncols, "decoded dense matrix");
    Ok(())
}

/// Write a dense matrix without row padding.
///
/// # Errors
///
/// [`Error::Io`].
pub fn encode_dense<W: Write>(matrix: &Dense<f64>, writer: &mut W) -> Result<()> {
    let (nrows, ncols) = matrix.shape();
    write_size(writer, nrows)?;
    write_size(writer, ncols)?;
    for row in matrix.rows() {
        for &v in row {
            writer.write_f64::<LittleEndian>(v)?;
        }
    }
    Ok(())
}

/// Read a CSR matrix from coordinate entries sorted by row.
///
/// # Errors
///
/// [`Error::Format`] for a short stream, [`Error::Sequence`] if rows
/// decrease, [`Error::OutOfRange`] for an entry outside the shape.
pub fn decode_csr<R: Read>(reader: &mut R) -> Result<Csr<f64>> {
    let nrows = read_size(reader, "sparse row count")?;
    let ncols = read_size(reader, "sparse column count")?;
    let nnz = read_size(reader, "nonzero count")?;
    let mut out = Csr::new(nrows, ncols);
    for _ in 0..nnz {
        let value = reader
            .read_f64::<LittleEndian>()
            .map_err(truncated("entry value"))?;
        let row = read_size(reader, "entry row")?;
        let col = read_size(reader, "entry column")?;
        out.append(value, row, col)?;
    }
    tracing::debug!(nrows, ncols, nnz, "decoded sparse matrix");
    Ok(out)
}

/// Write a CSR matrix as row-sorted coordinate entries.
///
/// # Errors
///
/// [`Error::Io`].
pub fn encode_csr<W: Write>(matrix: &Csr<f64>, writer: &mut W) -> Result<()> {
    let (nrows, ncols) = matrix.shape();
    write_size(writer, nrows)?;
    write_size(writer, ncols)?;
    write_size(writer, matrix.nnz())?;
    for (&v, i, j) in matrix.iter() {
        writer.write_f64::<LittleEndian>(v)?;
        write_size(writer, i)?;
        write_size(writer, j)?;
    }
    Ok(())
}

impl BinaryCodec for Dense<f64> {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        decode_dense(reader)
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        encode_dense(self, writer)
    }
}

impl BinaryCodec for Csr<f64> {
    fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        decode_csr(reader)
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        encode_csr(self, writer)
    }
}
