//! Fixed, versioned, little-endian framing for interface messages.
//!
//! Every message exchanged over an interface is
//! `WireHeader | count * T | WireTrailer`. Header and trailer both carry
//! [`MAGIC_NUMBER`]; the receiver rejects a frame whose sentinels do not
//! match and one whose element count differs from its local interface.

use crate::solver_error::SolverError;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

/// Sentinel framing every message.
pub const MAGIC_NUMBER: u32 = 68_753_267;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Which side of the interface sent the frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum WireRole {
    Master = 1,
    Slave = 2,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHeader {
    pub magic_le: u32,
    pub version_le: u16,
    pub role_le: u16,
    pub count_le: u32,
    pub elem_size_le: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireTrailer {
    pub magic_le: u32,
}

const_assert_eq!(size_of::<WireHeader>(), 16);
const_assert_eq!(size_of::<WireTrailer>(), 4);

impl WireHeader {
    pub fn new(role: WireRole, count: usize, elem_size: usize) -> Self {
        Self {
            magic_le: MAGIC_NUMBER.to_le(),
            version_le: WIRE_VERSION.to_le(),
            role_le: (role as u16).to_le(),
            count_le: (count as u32).to_le(),
            elem_size_le: (elem_size as u32).to_le(),
        }
    }
    pub fn magic(&self) -> u32 {
        u32::from_le(self.magic_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn count(&self) -> usize {
        u32::from_le(self.count_le) as usize
    }
    pub fn elem_size(&self) -> usize {
        u32::from_le(self.elem_size_le) as usize
    }
}

/// Pack `values` into one frame.
pub fn encode_frame<T: Pod>(role: WireRole, values: &[T]) -> Vec<u8> {
    let hdr = WireHeader::new(role, values.len(), size_of::<T>());
    let trailer = WireTrailer {
        magic_le: MAGIC_NUMBER.to_le(),
    };
    let payload: &[u8] = bytemuck::cast_slice(values);
    let mut buf = Vec::with_capacity(size_of::<WireHeader>() + payload.len() + 4);
    buf.extend_from_slice(bytemuck::bytes_of(&hdr));
    buf.extend_from_slice(payload);
    buf.extend_from_slice(bytemuck::bytes_of(&trailer));
    buf
}

/// Unpack a frame received from `peer`, checking both sentinels and that it
/// carries exactly `expected_count` elements.
pub fn decode_frame<T: Pod>(
    peer: usize,
    bytes: &[u8],
    expected_count: usize,
) -> Result<Vec<T>, SolverError> {
    let hsz = size_of::<WireHeader>();
    if bytes.len() < hsz + size_of::<WireTrailer>() {
        return Err(SolverError::CommError {
            peer,
            message: format!("frame of {} bytes is shorter than its framing", bytes.len()),
        });
    }
    let hdr: WireHeader = bytemuck::pod_read_unaligned(&bytes[..hsz]);
    if hdr.magic() != MAGIC_NUMBER {
        return Err(SolverError::MagicNumberMismatch {
            peer,
            expected: MAGIC_NUMBER,
            found: hdr.magic(),
        });
    }
    if hdr.version() != WIRE_VERSION {
        return Err(SolverError::CommError {
            peer,
            message: format!("wire version {} (expected {WIRE_VERSION})", hdr.version()),
        });
    }
    if hdr.count() != expected_count {
        return Err(SolverError::InterfaceSizeMismatch {
            peer,
            expected: expected_count,
            found: hdr.count(),
        });
    }
    let elem = size_of::<T>();
    let payload_len = hdr.count() * elem;
    if hdr.elem_size() != elem || bytes.len() != hsz + payload_len + size_of::<WireTrailer>() {
        return Err(SolverError::CommError {
            peer,
            message: format!(
                "expected {} bytes, got {}",
                hsz + payload_len + size_of::<WireTrailer>(),
                bytes.len()
            ),
        });
    }
    let trailer: WireTrailer = bytemuck::pod_read_unaligned(&bytes[hsz + payload_len..]);
    let found = u32::from_le(trailer.magic_le);
    if found != MAGIC_NUMBER {
        return Err(SolverError::MagicNumberMismatch {
            peer,
            expected: MAGIC_NUMBER,
            found,
        });
    }
    // payload may be unaligned inside the frame
    Ok(bytes[hsz..hsz + payload_len]
        .chunks_exact(elem)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}
