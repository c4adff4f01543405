//! Sparse replication encoding
//!
//! A shard travels from the sampling peer to the aggregating peer as a
//! compact little-endian record. Most bins of a period shard are empty, so
//! the histogram is sent as `(index, count)` pairs for the non-empty bins
//! only:
//!
//! ```text
//! f64 minimum   f64 maximum
//! i32 underflow i32 overflow i32 value_count
//! f64 sum_x_squared  f64 sum_x
//! u8  nonzero_bins
//! nonzero_bins x (u8 bin_index, i32 bin_count)
//! ```
//!
//! The shape is not on the wire: both peers build their accumulators from
//! the same template, and the receiver passes its shape to
//! [`StatAccumulator::decode_sparse`].

use super::accumulator::StatAccumulator;
use super::shape::HistogramShape;
use crate::traits::{DecodeError, EncodeError};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

// Helper macro for format! in both std and no_std
macro_rules! fmt {
    ($($arg:tt)*) => {{
        #[cfg(feature = "std")]
        { format!($($arg)*) }
        #[cfg(not(feature = "std"))]
        { alloc::format!($($arg)*) }
    }};
}

/// Largest bin count whose indices fit the one-byte wire index
pub const MAX_ENCODED_BINS: u32 = u8::MAX as u32;

/// Fixed part of the record, up to and including the pair count
pub const HEADER_LEN: usize = 8 + 8 + 4 + 4 + 4 + 8 + 8 + 1;

const PAIR_LEN: usize = 1 + 4;

impl StatAccumulator {
    /// Exact size of [`encode_sparse`](Self::encode_sparse)'s output
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.nonzero_bins() * PAIR_LEN
    }

    /// Encode into a fresh buffer
    pub fn encode_sparse(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_sparse_into(&mut buf)?;
        Ok(buf)
    }

    /// Append the encoded record to `buf`
    ///
    /// Nothing is written if encoding fails.
    pub fn encode_sparse_into(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        if self.bin_count() > MAX_ENCODED_BINS {
            return Err(EncodeError::TooManyBins {
                bin_count: self.bin_count(),
                max: MAX_ENCODED_BINS,
            });
        }
        let underflow = wire_count(self.underflow_count())?;
        let overflow = wire_count(self.overflow_count())?;
        let values = wire_count(self.value_count())?;

        buf.reserve(self.encoded_len());
        buf.extend_from_slice(&self.minimum_value().to_le_bytes());
        buf.extend_from_slice(&self.maximum_value().to_le_bytes());
        buf.extend_from_slice(&underflow.to_le_bytes());
        buf.extend_from_slice(&overflow.to_le_bytes());
        buf.extend_from_slice(&values.to_le_bytes());
        buf.extend_from_slice(&self.sum_x_squared().to_le_bytes());
        buf.extend_from_slice(&self.sum_x().to_le_bytes());

        // bin_count <= 255 so neither the pair count nor an index can truncate
        buf.push(self.nonzero_bins() as u8);
        for (index, &count) in self.histogram().iter().enumerate() {
            if count > 0 {
                buf.push(index as u8);
                // a bin never holds more than value_count, checked above
                buf.extend_from_slice(&(count as i32).to_le_bytes());
            }
        }
        Ok(())
    }

    /// Decode a complete record into an accumulator of the given shape
    ///
    /// Trailing bytes are an error.
    pub fn decode_sparse(shape: HistogramShape, bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = WireReader::new(bytes);
        let acc = Self::read_sparse(shape, &mut reader)?;
        reader.finish()?;
        Ok(acc)
    }

    /// Decode one record from the front of `reader`
    pub(crate) fn read_sparse(
        shape: HistogramShape,
        reader: &mut WireReader<'_>,
    ) -> Result<Self, DecodeError> {
        reader.require(HEADER_LEN)?;
        let minimum_value = reader.f64()?;
        let maximum_value = reader.f64()?;
        let underflow_count = reader.count("underflow count")?;
        let overflow_count = reader.count("overflow count")?;
        let value_count = reader.count("value count")?;
        let sum_x_squared = reader.f64()?;
        let sum_x = reader.f64()?;

        let pairs = reader.u8()? as usize;
        if pairs > shape.bin_count() as usize {
            return Err(DecodeError::Corrupted(fmt!(
                "{} non-empty bins for a {}-bin histogram",
                pairs,
                shape.bin_count()
            )));
        }
        reader.require(pairs * PAIR_LEN)?;

        let mut histogram = vec![0u32; shape.bin_count() as usize];
        let mut binned = 0u64;
        for _ in 0..pairs {
            let index = reader.u8()? as usize;
            let count = reader.count("bin count")?;
            let slot = histogram.get_mut(index).ok_or_else(|| {
                DecodeError::Corrupted(fmt!(
                    "bin index {} out of range for {} bins",
                    index,
                    shape.bin_count()
                ))
            })?;
            if count == 0 || *slot != 0 {
                return Err(DecodeError::Corrupted(fmt!(
                    "bin {} is empty or listed twice",
                    index
                )));
            }
            *slot = count;
            binned += count as u64;
        }

        if binned != value_count as u64 {
            return Err(DecodeError::Corrupted(fmt!(
                "histogram holds {} samples, value count is {}",
                binned,
                value_count
            )));
        }

        Ok(Self::from_parts(
            shape,
            histogram,
            underflow_count,
            overflow_count,
            value_count,
            sum_x,
            sum_x_squared,
            minimum_value,
            maximum_value,
        ))
    }

    fn nonzero_bins(&self) -> usize {
        self.histogram().iter().filter(|&&c| c > 0).count()
    }
}

fn wire_count(count: u32) -> Result<i32, EncodeError> {
    i32::try_from(count).map_err(|_| EncodeError::CountOverflow { count })
}

/// Little-endian cursor over a received buffer
#[derive(Debug)]
pub(crate) struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Fail early, reporting the whole record length, if `len` more bytes
    /// are not available
    pub(crate) fn require(&self, len: usize) -> Result<(), DecodeError> {
        let remaining = self.bytes.len() - self.pos;
        if remaining < len {
            return Err(DecodeError::BufferTooShort {
                expected: self.pos + len,
                found: self.bytes.len(),
            });
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.require(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    pub(crate) fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    pub(crate) fn f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    /// A non-negative `i32` count
    pub(crate) fn count(&mut self, what: &str) -> Result<u32, DecodeError> {
        let raw = self.i32()?;
        u32::try_from(raw).map_err(|_| DecodeError::Corrupted(fmt!("negative {}: {}", what, raw)))
    }

    /// Error if any bytes are left
    pub(crate) fn finish(self) -> Result<(), DecodeError> {
        let left = self.bytes.len() - self.pos;
        if left > 0 {
            return Err(DecodeError::Corrupted(fmt!("{} trailing bytes", left)));
        }
        Ok(())
    }
}
