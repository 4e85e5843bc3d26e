//! Fixed-capacity byte ring used as a replay buffer for late joiners.
//!
//! The ring holds the most recent `capacity` bytes ever pushed, evicting the
//! oldest byte on overflow. A viewer that connects mid-session is handed
//! [`ReplayRing::snapshot`] so it sees the current screen instead of a blank
//! one.
//!
//! Design goals:
//! - Bounded memory: a single arena allocated up front, no growth
//! - O(1) amortized append per byte, index arithmetic modulo capacity
//! - Cheap ordered copy-out for the join path
//!
//! ```
//! # use replay_ring::ReplayRing;
//! let mut ring = ReplayRing::with_capacity(4);
//! ring.push(b"hello");
//! assert_eq!(ring.snapshot(), b"ello");
//! ```

/// Ring buffer over raw bytes with oldest-byte eviction.
///
/// `head` indexes the oldest live byte; the next write lands at
/// `(head + len) % capacity`. `len` never exceeds the arena size.
#[derive(Debug)]
pub struct ReplayRing {
    buf: Box<[u8]>,
    head: usize,
    len: usize,
}

impl ReplayRing {
    /// Creates a ring holding at most `capacity` bytes. A zero capacity is
    /// legal and yields a ring that stays empty forever.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes currently held, at most `capacity`.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a chunk, evicting the oldest bytes once the arena is full.
    /// A chunk longer than the capacity degenerates to its final
    /// `capacity` bytes; the earlier ones would be evicted immediately.
    pub fn push(&mut self, bytes: &[u8]) {
        let cap = self.buf.len();
        if cap == 0 {
            return;
        }
        let src = if bytes.len() > cap {
            &bytes[bytes.len() - cap..]
        } else {
            bytes
        };
        for &byte in src {
            let tail = (self.head + self.len) % cap;
            self.buf[tail] = byte;
            if self.len == cap {
                self.head = (self.head + 1) % cap;
            } else {
                self.len += 1;
            }
        }
    }

    /// Ordered copy of the current contents, oldest byte first. Does not
    /// mutate the ring.
    pub fn snapshot(&self) -> Vec<u8> {
        let cap = self.buf.len();
        let mut out = Vec::with_capacity(self.len);
        for i in 0..self.len {
            out.push(self.buf[(self.head + i) % cap]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_snapshots_empty() {
        let ring = ReplayRing::with_capacity(16);
        assert!(ring.is_empty());
        assert_eq!(ring.snapshot(), Vec::<u8>::new());
    }

    #[test]
    fn small_input_round_trips_exactly() {
        let mut ring = ReplayRing::with_capacity(2000);
        ring.push(b"AAAA");
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.snapshot(), b"AAAA");
    }

    #[test]
    fn overflow_keeps_last_capacity_bytes_in_order() {
        let mut ring = ReplayRing::with_capacity(8);
        for chunk in [&b"abcd"[..], b"efgh", b"ijkl"] {
            ring.push(chunk);
        }
        // 12 bytes pushed, capacity 8: the first 4 are gone.
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.snapshot(), b"efghijkl");
    }

    #[test]
    fn eviction_is_strictly_oldest_first() {
        let mut ring = ReplayRing::with_capacity(4);
        ring.push(b"abcd");
        ring.push(b"e");
        assert_eq!(ring.snapshot(), b"bcde");
        ring.push(b"f");
        assert_eq!(ring.snapshot(), b"cdef");
    }

    #[test]
    fn chunk_larger_than_capacity_degenerates_to_tail() {
        let mut ring = ReplayRing::with_capacity(4);
        ring.push(b"0123456789");
        assert_eq!(ring.snapshot(), b"6789");
        // Ring stays consistent for further pushes.
        ring.push(b"x");
        assert_eq!(ring.snapshot(), b"789x");
    }

    #[test]
    fn many_single_byte_pushes_match_tail_of_stream() {
        let mut ring = ReplayRing::with_capacity(100);
        let stream: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        for &b in &stream {
            ring.push(std::slice::from_ref(&b));
        }
        assert_eq!(ring.snapshot(), &stream[stream.len() - 100..]);
    }

    #[test]
    fn zero_capacity_ring_accepts_and_drops_everything() {
        let mut ring = ReplayRing::with_capacity(0);
        ring.push(b"data");
        assert!(ring.is_empty());
        assert_eq!(ring.snapshot(), Vec::<u8>::new());
    }
}
