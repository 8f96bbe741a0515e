use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::decode::decode_parts;
use crate::frame::Fragment;
use crate::Error;

pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A fully reassembled message: the message id from the frame header and the
/// base64-decoded bytes of all parts in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub message_id: String,
    pub bytes: Vec<u8>,
}

struct Bucket {
    started_at: Instant,
    total: Option<usize>,
    parts: BTreeMap<usize, String>,
}

impl Bucket {
    fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            total: None,
            parts: BTreeMap::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.total
            .is_some_and(|total| self.parts.range(..total).count() == total)
    }
}

/// Rebuilds messages that the transport split into `id|index|total|payload`
/// frames.
///
/// Time never advances on its own: every call takes the caller's `now`, and
/// buckets that outlive the timeout are dropped either when a late fragment
/// for them shows up or when [`ChunkReassembler::evict_expired`] sweeps. A
/// message id that expired or completed once stays dead for the rest of the
/// session, so re-sent fragments never decode it again.
pub struct ChunkReassembler {
    buckets: HashMap<String, Bucket>,
    expired: HashSet<String>,
    completed: HashSet<String>,
    timeout: Duration,
}

impl ChunkReassembler {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_CHUNK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            buckets: HashMap::new(),
            expired: HashSet::new(),
            completed: HashSet::new(),
            timeout,
        }
    }

    pub fn push_bytes(&mut self, frame: &[u8], now: Instant) -> Result<Option<Reassembled>, Error> {
        let frame = std::str::from_utf8(frame)?;
        self.push(frame, now)
    }

    pub fn push(&mut self, frame: &str, now: Instant) -> Result<Option<Reassembled>, Error> {
        let fragment = Fragment::parse(frame)?;
        let message_id = fragment.message_id;

        if self.expired.contains(message_id) {
            tracing::debug!(message_id, "chunk_for_expired_message_dropped");
            return Ok(None);
        }

        if self.completed.contains(message_id) {
            tracing::debug!(message_id, index = fragment.index, "chunk_for_completed_message_dropped");
            return Ok(None);
        }

        if let Some(bucket) = self.buckets.get(message_id)
            && now.saturating_duration_since(bucket.started_at) >= self.timeout
        {
            self.expire(message_id);
            return Ok(None);
        }

        let bucket = self
            .buckets
            .entry(message_id.to_string())
            .or_insert_with(|| Bucket::new(now));

        if let Some(total) = fragment.total.known() {
            match bucket.total {
                None => bucket.total = Some(total),
                Some(existing) if existing != total => {
                    tracing::warn!(message_id, existing, total, "chunk_total_mismatch_ignored");
                }
                Some(_) => {}
            }
        } else {
            tracing::debug!(message_id, index = fragment.index, "chunk_total_unknown_waiting");
        }

        if let Some(total) = bucket.total
            && fragment.index >= total
        {
            if bucket.parts.is_empty() {
                self.buckets.remove(message_id);
            }
            return Err(Error::PartOutOfRange {
                index: fragment.index,
                total,
            });
        }

        bucket
            .parts
            .entry(fragment.index)
            .or_insert_with(|| fragment.payload.to_string());

        if !bucket.is_complete() {
            return Ok(None);
        }

        let Some(bucket) = self.buckets.remove(message_id) else {
            return Ok(None);
        };
        self.completed.insert(message_id.to_string());

        // Parts buffered before the total was known may lie beyond it.
        let total = bucket.total.unwrap_or_default();
        let bytes = decode_parts(bucket.parts.range(..total).map(|(_, part)| part.as_str()))?;

        tracing::debug!(message_id, parts = total, "chunk_reassembled");

        Ok(Some(Reassembled {
            message_id: message_id.to_string(),
            bytes,
        }))
    }

    /// Drop every bucket whose first fragment is older than the timeout.
    /// Returns how many buckets were dropped.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let stale: Vec<String> = self
            .buckets
            .iter()
            .filter(|(_, bucket)| now.saturating_duration_since(bucket.started_at) >= self.timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.expire(id);
        }

        stale.len()
    }

    pub fn pending(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.expired.clear();
        self.completed.clear();
    }

    fn expire(&mut self, message_id: &str) {
        if self.buckets.remove(message_id).is_some() {
            tracing::debug!(message_id, "chunk_cache_timeout_dropped");
        }
        self.expired.insert(message_id.to_string());
    }
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn split_frames(message_id: &str, body: &str, parts: usize) -> Vec<String> {
        let encoded = STANDARD.encode(body);
        let size = encoded.len().div_ceil(parts);
        encoded
            .as_bytes()
            .chunks(size)
            .enumerate()
            .map(|(i, chunk)| {
                format!(
                    "{message_id}|{i}|{parts}|{}",
                    std::str::from_utf8(chunk).unwrap()
                )
            })
            .collect()
    }

    fn feed(reassembler: &mut ChunkReassembler, frames: &[String], now: Instant) -> Vec<Reassembled> {
        frames
            .iter()
            .filter_map(|f| reassembler.push(f, now).unwrap())
            .collect()
    }

    #[test]
    fn two_padded_parts_reassemble_once() {
        let mut reassembler = ChunkReassembler::new();
        let now = Instant::now();

        assert!(reassembler.push("m1|0|2|QQ==", now).unwrap().is_none());
        let done = reassembler.push("m1|1|2|Qg==", now).unwrap().unwrap();

        assert_eq!(done.message_id, "m1");
        assert_eq!(done.bytes, b"AB");
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn arrival_order_does_not_matter() {
        let body = r#"{"object":"user.transcription","text":"order should not matter"}"#;
        let frames = split_frames("m2", body, 4);
        let now = Instant::now();

        for order in [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]] {
            let mut reassembler = ChunkReassembler::new();
            let shuffled: Vec<String> = order.iter().map(|&i| frames[i].clone()).collect();
            let done = feed(&mut reassembler, &shuffled, now);
            assert_eq!(done.len(), 1);
            assert_eq!(done[0].bytes, body.as_bytes());
        }
    }

    #[test]
    fn duplicate_parts_do_not_retrigger() {
        let frames = split_frames("m3", "duplicated", 3);
        let mut reassembler = ChunkReassembler::new();
        let now = Instant::now();

        assert!(reassembler.push(&frames[0], now).unwrap().is_none());
        assert!(reassembler.push(&frames[0], now).unwrap().is_none());
        assert!(reassembler.push(&frames[1], now).unwrap().is_none());
        assert!(reassembler.push(&frames[1], now).unwrap().is_none());

        let done = reassembler.push(&frames[2], now).unwrap().unwrap();
        assert_eq!(done.bytes, b"duplicated");
    }

    #[test]
    fn resent_fragments_of_a_completed_message_are_dropped() {
        let frames = split_frames("m11", "spoken once", 2);
        let mut reassembler = ChunkReassembler::new();
        let now = Instant::now();

        let resent = [frames[0].clone(), frames[1].clone(), frames[1].clone(), frames[0].clone()];
        let done = feed(&mut reassembler, &resent, now);

        assert_eq!(done.len(), 1);
        assert_eq!(done[0].bytes, b"spoken once");
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn unknown_total_waits_for_a_later_fragment() {
        let mut reassembler = ChunkReassembler::new();
        let now = Instant::now();

        assert!(reassembler.push("m4|0|???|QQ==", now).unwrap().is_none());
        assert_eq!(reassembler.pending(), 1);

        let done = reassembler.push("m4|1|2|Qg==", now).unwrap().unwrap();
        assert_eq!(done.bytes, b"AB");
    }

    #[test]
    fn stray_parts_beyond_total_do_not_complete_early() {
        let mut reassembler = ChunkReassembler::new();
        let now = Instant::now();

        reassembler.push("m10|0|???|QQ==", now).unwrap();
        reassembler.push("m10|3|???|QQ==", now).unwrap();
        assert!(reassembler.push("m10|1|3|Qg==", now).unwrap().is_none());

        let done = reassembler.push("m10|2|3|Qw==", now).unwrap().unwrap();
        assert_eq!(done.bytes, b"ABC");
    }

    #[test]
    fn expired_bucket_never_completes() {
        let mut reassembler = ChunkReassembler::with_timeout(Duration::from_secs(10));
        let start = Instant::now();

        assert!(reassembler.push("m5|0|2|QQ==", start).unwrap().is_none());
        assert_eq!(reassembler.evict_expired(start + Duration::from_secs(11)), 1);
        assert_eq!(reassembler.pending(), 0);

        let late = start + Duration::from_secs(12);
        assert!(reassembler.push("m5|1|2|Qg==", late).unwrap().is_none());
        assert!(reassembler.push("m5|0|2|QQ==", late).unwrap().is_none());
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn late_fragment_expires_bucket_without_sweep() {
        let mut reassembler = ChunkReassembler::with_timeout(Duration::from_secs(10));
        let start = Instant::now();

        reassembler.push("m6|0|2|QQ==", start).unwrap();
        let late = start + Duration::from_secs(10);
        assert!(reassembler.push("m6|1|2|Qg==", late).unwrap().is_none());
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn sweep_keeps_fresh_buckets() {
        let mut reassembler = ChunkReassembler::with_timeout(Duration::from_secs(10));
        let start = Instant::now();

        reassembler.push("old|0|2|QQ==", start).unwrap();
        reassembler
            .push("new|0|2|QQ==", start + Duration::from_secs(8))
            .unwrap();

        assert_eq!(reassembler.evict_expired(start + Duration::from_secs(10)), 1);
        assert_eq!(reassembler.pending(), 1);
    }

    #[test]
    fn malformed_frames_leave_no_bucket() {
        let mut reassembler = ChunkReassembler::new();
        let now = Instant::now();

        assert!(reassembler.push("garbage", now).is_err());
        assert!(reassembler.push("m7|0|1|***", now).is_err());
        assert!(reassembler.push_bytes(&[0xff, 0xfe], now).is_err());
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn index_beyond_late_total_is_rejected() {
        let mut reassembler = ChunkReassembler::new();
        let now = Instant::now();

        reassembler.push("m8|0|???|QQ==", now).unwrap();
        reassembler.push("m8|1|2|Qg==", now).unwrap();
        assert_eq!(reassembler.pending(), 0);

        reassembler.push("m9|0|2|QQ==", now).unwrap();
        assert!(matches!(
            reassembler.push("m9|5|???|QQ==", now),
            Err(Error::PartOutOfRange { index: 5, total: 2 })
        ));
        assert_eq!(reassembler.pending(), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut reassembler = ChunkReassembler::with_timeout(Duration::from_secs(1));
        let start = Instant::now();

        reassembler.push("a|0|2|QQ==", start).unwrap();
        reassembler.evict_expired(start + Duration::from_secs(2));
        reassembler.push("b|0|2|QQ==", start).unwrap();
        reassembler.clear();
        assert_eq!(reassembler.pending(), 0);

        let later = start + Duration::from_secs(3);
        reassembler.push("a|0|2|QQ==", later).unwrap();
        let done = reassembler.push("a|1|2|Qg==", later).unwrap().unwrap();
        assert_eq!(done.bytes, b"AB");
    }
}
