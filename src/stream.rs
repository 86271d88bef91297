//! Data model (§3): the per-stream bookkeeping both rings mutate.
//!
//! One `Stream` exists per logical sub-stream of a container, `1..=N`. On
//! the write side only `buf`/`buflen`/`last_head` are live; on the read side
//! all fields are, including the sub-ring indices that carve this stream's
//! `T`-wide slice out of the shared worker pool.

/// Per-stream state, shared between the caller and its ring workers.
pub struct Stream {
    /// Accumulation buffer (write) or current decompressed chunk (read).
    pub buf: Vec<u8>,
    /// Bytes valid in `buf`.
    pub buflen: usize,
    /// Read cursor into `buf` (read side only).
    pub bufp: usize,
    /// Absolute file offset of this stream's most recent header's
    /// `next_off` field (§3 invariants).
    pub last_head: u64,
    /// Set on read once a chunk header advertises `next_off == 0`.
    pub eos: bool,
    /// First slot index of this stream's sub-ring in the shared read pool.
    pub base_thread: usize,
    /// Slot index of the next prefetch submission within the sub-ring.
    pub uthread_no: usize,
    /// Slot index of the next result this stream's caller is waiting on.
    pub unext_thread: usize,
}

impl Stream {
    /// A stream ready for `write`: an empty accumulation buffer of
    /// `bufsize` capacity and `last_head` pointing at its own initial
    /// header's `next_off` field.
    pub fn new_write(bufsize: usize, initial_last_head: u64) -> Self {
        Stream {
            buf: Vec::with_capacity(bufsize),
            buflen: 0,
            bufp: 0,
            last_head: initial_last_head,
            eos: false,
            base_thread: 0,
            uthread_no: 0,
            unext_thread: 0,
        }
    }

    /// A stream ready for `read`: no decompressed data yet, positioned at
    /// its own initial header and claiming slots `[index*t, index*t+t)` of
    /// the shared read-ring pool.
    pub fn new_read(index: usize, t: usize, initial_last_head: u64) -> Self {
        Stream {
            buf: Vec::new(),
            buflen: 0,
            bufp: 0,
            last_head: initial_last_head,
            eos: false,
            base_thread: index * t,
            uthread_no: 0,
            unext_thread: 0,
        }
    }

    /// Bytes still unread in the current decompressed chunk.
    pub fn remaining(&self) -> usize {
        self.buflen - self.bufp
    }
}
