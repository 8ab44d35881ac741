//! Network State Exchange
//!
//! Per-actor state blobs and per-source bookkeeping for networked sessions.
//!
//! # Blob Layout
//!
//! ```text
//! offset  size  field
//! 0       4     magic "SBST"
//! 4       2     version (u16)
//! 6       4     time, milliseconds (i32)
//! 10      4     node count (u32)
//! 14      4     brake (f32)
//! 18      4     light mask (u32)
//! 22      12*n  node positions (f32 x, y, z)
//! ```
//!
//! All fields are little-endian. A blob whose length does not match its node
//! count is rejected, so truncated and padded datagrams never reach an actor.

use std::collections::{HashMap, HashSet};

use crate::actor::{Actor, ActorInstanceId};
use crate::error::{SimError, SimResult};
use crate::math::{Real, Vec3};

/// Blob magic
pub const STATE_MAGIC: [u8; 4] = *b"SBST";
/// Current blob version
pub const STATE_VERSION: u16 = 1;
/// Fixed header size in bytes
pub const STATE_HEADER_SIZE: usize = 22;
/// Bytes per encoded node
pub const STATE_NODE_SIZE: usize = 12;
/// Subtracted from every first-seen remote clock difference (ms)
pub const NET_TIME_OFFSET_BIAS_MS: i32 = 100;

// ============================================================================
// Remote State
// ============================================================================

/// Decoded state of one networked actor
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteState {
    /// Sender's simulation clock in milliseconds
    pub time_ms: i32,
    /// Node positions, in node order
    pub positions: Vec<Vec3>,
    /// Brake input
    pub brake: Real,
    /// Light bitmask
    pub light_mask: u32,
}

impl RemoteState {
    /// Snapshot an actor for transmission
    #[must_use]
    pub fn capture(actor: &Actor, time_ms: i32) -> Self {
        Self {
            time_ms,
            positions: actor.nodes.iter().map(|n| n.position).collect(),
            brake: actor.brake,
            light_mask: actor.light_mask,
        }
    }

    /// Encoded size in bytes
    #[inline]
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        STATE_HEADER_SIZE + self.positions.len() * STATE_NODE_SIZE
    }

    /// Serialize to a blob (little-endian)
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&STATE_MAGIC);
        buf.extend_from_slice(&STATE_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.time_ms.to_le_bytes());
        buf.extend_from_slice(&(self.positions.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.brake.to_le_bytes());
        buf.extend_from_slice(&self.light_mask.to_le_bytes());
        for p in &self.positions {
            buf.extend_from_slice(&p.x.to_le_bytes());
            buf.extend_from_slice(&p.y.to_le_bytes());
            buf.extend_from_slice(&p.z.to_le_bytes());
        }
        buf
    }

    /// Deserialize a blob, validating magic, version and length
    pub fn from_bytes(data: &[u8]) -> SimResult<Self> {
        if data.len() < STATE_HEADER_SIZE {
            return Err(SimError::StateDecode { reason: "truncated header" });
        }
        if data[0..4] != STATE_MAGIC {
            return Err(SimError::StateDecode { reason: "bad magic" });
        }
        if u16::from_le_bytes([data[4], data[5]]) != STATE_VERSION {
            return Err(SimError::StateDecode { reason: "unsupported version" });
        }
        let time_ms = i32::from_le_bytes(word(data, 6));
        let count = u32::from_le_bytes(word(data, 10)) as usize;
        let brake = f32::from_le_bytes(word(data, 14));
        let light_mask = u32::from_le_bytes(word(data, 18));

        let expected = count
            .checked_mul(STATE_NODE_SIZE)
            .and_then(|n| n.checked_add(STATE_HEADER_SIZE));
        if expected != Some(data.len()) {
            return Err(SimError::StateDecode { reason: "length does not match node count" });
        }

        let positions = data[STATE_HEADER_SIZE..]
            .chunks_exact(STATE_NODE_SIZE)
            .map(|c| {
                Vec3::new(
                    f32::from_le_bytes(word(c, 0)),
                    f32::from_le_bytes(word(c, 4)),
                    f32::from_le_bytes(word(c, 8)),
                )
            })
            .collect();

        Ok(Self {
            time_ms,
            positions,
            brake,
            light_mask,
        })
    }
}

#[inline]
fn word(data: &[u8], at: usize) -> [u8; 4] {
    [data[at], data[at + 1], data[at + 2], data[at + 3]]
}

/// A blob produced after a frame for an actor with a remote audience
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingState {
    /// Sending actor
    pub actor: ActorInstanceId,
    /// Encoded [`RemoteState`]
    pub blob: Vec<u8>,
}

// ============================================================================
// Stream Registry
// ============================================================================

/// Health of the streams of one remote source
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamHealth {
    /// At least one stream failed to match a local actor
    Mismatch = 0,
    /// All streams matched and a networked actor exists
    Ok = 1,
    /// No networked actor belongs to the source
    NoActors = 2,
}

impl StreamHealth {
    /// Numeric code
    #[inline]
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Per-source time offsets and stream mismatches
#[derive(Clone, Debug, Default)]
pub struct NetStreamRegistry {
    time_offsets: HashMap<i32, i32>,
    mismatches: HashMap<i32, HashSet<i32>>,
}

impl NetStreamRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the clock offset of `source` the first time it is seen.
    ///
    /// Later calls for the same source are ignored.
    pub fn register_time_offset(&mut self, source: i32, remote_time_ms: i32, local_time_ms: i32) {
        self.time_offsets.entry(source).or_insert_with(|| {
            remote_time_ms
                .wrapping_sub(local_time_ms)
                .wrapping_sub(NET_TIME_OFFSET_BIAS_MS)
        });
    }

    /// Adjust a known offset; unknown sources are ignored
    pub fn update_time_offset(&mut self, source: i32, delta_ms: i32) {
        if let Some(offset) = self.time_offsets.get_mut(&source) {
            *offset = offset.wrapping_add(delta_ms);
        }
    }

    /// Offset of `source`, 0 if unknown
    #[must_use]
    pub fn time_offset(&self, source: i32) -> i32 {
        self.time_offsets.get(&source).copied().unwrap_or(0)
    }

    /// Forget the offset of `source`
    pub fn clear_time_offset(&mut self, source: i32) {
        self.time_offsets.remove(&source);
    }

    /// Record a stream of `source` that matched no local actor
    pub fn add_mismatch(&mut self, source: i32, stream: i32) {
        self.mismatches.entry(source).or_default().insert(stream);
    }

    /// Whether any stream of `source` is mismatched
    #[must_use]
    pub fn has_mismatches(&self, source: i32) -> bool {
        self.mismatches.get(&source).is_some_and(|s| !s.is_empty())
    }

    /// Classify `source` given whether a networked actor belongs to it
    #[must_use]
    pub fn health(&self, source: i32, has_networked_actor: bool) -> StreamHealth {
        if self.has_mismatches(source) {
            StreamHealth::Mismatch
        } else if has_networked_actor {
            StreamHealth::Ok
        } else {
            StreamHealth::NoActors
        }
    }

    /// Forget the mismatches recorded for `source`
    pub fn forget_mismatches(&mut self, source: i32) {
        self.mismatches.remove(&source);
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.time_offsets.clear();
        self.mismatches.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RemoteState {
        RemoteState {
            time_ms: 1234,
            positions: vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-4.5, 0.0, 8.25)],
            brake: 0.5,
            light_mask: 0b101,
        }
    }

    #[test]
    fn test_blob_layout() {
        let blob = sample().to_bytes();
        assert_eq!(blob.len(), STATE_HEADER_SIZE + 2 * STATE_NODE_SIZE);
        assert_eq!(&blob[0..4], b"SBST");
        assert_eq!(u16::from_le_bytes([blob[4], blob[5]]), STATE_VERSION);
        assert_eq!(u32::from_le_bytes(word(&blob, 10)), 2);
        assert_eq!(RemoteState::from_bytes(&blob), Ok(sample()));
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let blob = sample().to_bytes();
        assert!(RemoteState::from_bytes(&blob[..10]).is_err());
        assert!(RemoteState::from_bytes(&blob[..blob.len() - 1]).is_err());

        let mut bad_magic = blob.clone();
        bad_magic[0] = b'X';
        assert_eq!(
            RemoteState::from_bytes(&bad_magic),
            Err(SimError::StateDecode { reason: "bad magic" })
        );

        let mut bad_version = blob.clone();
        bad_version[4] = 99;
        assert!(RemoteState::from_bytes(&bad_version).is_err());

        let mut padded = blob;
        padded.push(0);
        assert!(RemoteState::from_bytes(&padded).is_err());
    }

    #[test]
    fn test_huge_node_count_rejected() {
        let mut blob = sample().to_bytes();
        blob[10..14].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(RemoteState::from_bytes(&blob).is_err());
    }

    #[test]
    fn test_time_offset_first_registration_only() {
        let mut reg = NetStreamRegistry::new();
        assert_eq!(reg.time_offset(3), 0);
        reg.register_time_offset(3, 5000, 1000);
        assert_eq!(reg.time_offset(3), 3900);
        reg.register_time_offset(3, 9000, 1000);
        assert_eq!(reg.time_offset(3), 3900);
        reg.update_time_offset(3, -50);
        assert_eq!(reg.time_offset(3), 3850);
    }

    #[test]
    fn test_update_unknown_offset_ignored() {
        let mut reg = NetStreamRegistry::new();
        reg.update_time_offset(7, 20);
        assert_eq!(reg.time_offset(7), 0);
        reg.register_time_offset(7, 100, 0);
        assert_eq!(reg.time_offset(7), 0);
    }

    #[test]
    fn test_stream_health() {
        let mut reg = NetStreamRegistry::new();
        assert_eq!(reg.health(1, false), StreamHealth::NoActors);
        assert_eq!(reg.health(1, true).code(), 1);
        reg.add_mismatch(1, 4);
        assert_eq!(reg.health(1, true), StreamHealth::Mismatch);
        reg.forget_mismatches(1);
        assert_eq!(reg.health(1, true), StreamHealth::Ok);
    }
}
