// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Record framing.
//!
//! Every record is a byte payload plus a 4-byte big-endian signed length.
//! Two layouts exist over the same primitive:
//!
//! ```text
//! forward frame:  ┌──────────────┬────────────────────┐
//!                 │ Length (4B)  │ Payload (variable) │
//!                 └──────────────┴────────────────────┘
//!
//! reverse frame:  ┌────────────────────┬──────────────┐
//!                 │ Payload (variable) │ Length (4B)  │
//!                 └────────────────────┴──────────────┘
//! ```
//!
//! Forward frames are scanned from the front (FIFO live records). Reverse
//! frames are found by seeking backward from a known end offset, which is how
//! LIFO live records and both engines' checkpoint footers are decoded.
//!
//! Lengths read from disk are bounds-checked against the region the caller
//! knows to be valid before any payload buffer is allocated.

use bytes::{BufMut, Bytes, BytesMut};
use snafu::ensure;

use crate::{
    Result,
    error::{CorruptRecordSnafu, PayloadTooLargeSnafu},
    file::DataFile,
};

/// Size of the length field in bytes.
pub const LENGTH_SIZE: u64 = 4;

/// On-disk size of a frame carrying `payload_len` bytes.
#[inline]
pub const fn frame_size(payload_len: u64) -> u64 { LENGTH_SIZE + payload_len }

fn length_field(payload: &[u8]) -> Result<[u8; 4]> {
    let len = i32::try_from(payload.len())
        .map_err(|_| PayloadTooLargeSnafu { len: payload.len() }.build())?;
    Ok(len.to_be_bytes())
}

/// Encode `[length][payload]`.
pub fn encode_forward(payload: &[u8]) -> Result<Bytes> {
    let length = length_field(payload)?;
    let mut buf = BytesMut::with_capacity(payload.len() + LENGTH_SIZE as usize);
    buf.put_slice(&length);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Encode `[payload][length]`.
pub fn encode_reverse(payload: &[u8]) -> Result<Bytes> {
    let length = length_field(payload)?;
    let mut buf = BytesMut::with_capacity(payload.len() + LENGTH_SIZE as usize);
    buf.put_slice(payload);
    buf.put_slice(&length);
    Ok(buf.freeze())
}

/// Decode a forward frame held entirely in `buf`.
///
/// Returns the payload and the number of bytes the frame occupied.
pub fn decode_forward(buf: &[u8]) -> Result<(Bytes, u64)> {
    let end = buf.len() as u64;
    let length = read_length(buf, 0)?;
    let payload_len = checked_length(0, length, end.saturating_sub(LENGTH_SIZE))?;
    let start = LENGTH_SIZE as usize;
    let payload = Bytes::copy_from_slice(&buf[start..start + payload_len as usize]);
    Ok((payload, frame_size(payload_len)))
}

/// Decode the reverse frame that ends at the end of `buf`.
///
/// Returns the payload and the offset in `buf` where the frame starts.
pub fn decode_reverse(buf: &[u8]) -> Result<(Bytes, u64)> {
    let end = buf.len() as u64;
    ensure!(
        end >= LENGTH_SIZE,
        CorruptRecordSnafu {
            offset: end,
            length: -1_i64,
        }
    );
    let length_at = end - LENGTH_SIZE;
    let length = read_length(buf, length_at)?;
    let payload_len = checked_length(length_at, length, length_at)?;
    let start = length_at - payload_len;
    let payload = Bytes::copy_from_slice(&buf[start as usize..length_at as usize]);
    Ok((payload, start))
}

/// Read the forward frame starting at `offset`, never reading past `limit`.
///
/// Returns the payload and the offset just past the frame.
pub fn read_forward_at(file: &mut DataFile, offset: u64, limit: u64) -> Result<(Bytes, u64)> {
    ensure!(
        offset + LENGTH_SIZE <= limit,
        CorruptRecordSnafu {
            offset,
            length: -1_i64,
        }
    );
    let mut length_buf = [0u8; LENGTH_SIZE as usize];
    file.read_at(offset, &mut length_buf)?;
    let length = i32::from_be_bytes(length_buf);

    let payload_offset = offset + LENGTH_SIZE;
    let payload_len = checked_length(offset, length, limit - payload_offset)?;

    let mut payload = vec![0u8; payload_len as usize];
    file.read_at(payload_offset, &mut payload)?;
    Ok((Bytes::from(payload), payload_offset + payload_len))
}

/// Read the reverse frame ending at `end`.
///
/// Returns the payload and the offset where the frame starts.
pub fn read_reverse_at(file: &mut DataFile, end: u64) -> Result<(Bytes, u64)> {
    ensure!(
        end >= LENGTH_SIZE,
        CorruptRecordSnafu {
            offset: end,
            length: -1_i64,
        }
    );
    let length_at = end - LENGTH_SIZE;
    let mut length_buf = [0u8; LENGTH_SIZE as usize];
    file.read_at(length_at, &mut length_buf)?;
    let length = i32::from_be_bytes(length_buf);

    let payload_len = checked_length(length_at, length, length_at)?;
    let start = length_at - payload_len;

    let mut payload = vec![0u8; payload_len as usize];
    file.read_at(start, &mut payload)?;
    Ok((Bytes::from(payload), start))
}

fn read_length(buf: &[u8], at: u64) -> Result<i32> {
    let at = at as usize;
    let field = buf
        .get(at..at + LENGTH_SIZE as usize)
        .and_then(|s| <[u8; 4]>::try_from(s).ok())
        .ok_or_else(|| {
            CorruptRecordSnafu {
                offset: at as u64,
                length: -1_i64,
            }
            .build()
        })?;
    Ok(i32::from_be_bytes(field))
}

/// Validate a decoded length: non-negative and no larger than `available`.
fn checked_length(offset: u64, length: i32, available: u64) -> Result<u64> {
    u64::try_from(length)
        .ok()
        .filter(|len| *len <= available)
        .ok_or_else(|| {
            CorruptRecordSnafu {
                offset,
                length: i64::from(length),
            }
            .build()
        })
}
