//! Worker ring, write side (C5, §4.5).
//!
//! `T` slots indexed `0..T`, each waiting on its predecessor `(slot - 1) mod
//! T`'s `complete` semaphore before it may touch the file. Compression (and
//! encryption) for a slot runs freely in parallel with every other slot;
//! only the header-patch-and-append critical section is serialized, via the
//! `complete` chain, exactly the FIFO write barrier §4.5 describes.

use crate::codec;
use crate::config::Config;
use crate::crypto;
use crate::error::Result;
use crate::format::{self, ChunkHeader};
use crate::poison::Poison;
use crate::stream::Stream;
use crate::sync::Semaphore;

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error};

/// Shared, worker-visible container state: the file itself, the logical
/// write cursor, and each stream's `last_head` (§3 invariants). Protected by
/// a single mutex; contention is never real because the `complete` chain
/// already allows only one worker at a time into the critical section, but
/// Rust still needs an explicit lock for the aliasing to be sound.
struct WriteState {
    file: File,
    cur_pos: u64,
    last_head: Vec<u64>,
}

/// One slot's persistent pair of binary semaphores, reused across every
/// submission that ever lands on this slot.
struct Slot {
    free: Arc<Semaphore>,
    complete: Arc<Semaphore>,
    handle: Option<JoinHandle<()>>,
}

/// The write-side worker ring plus the shared file state it serializes
/// access to. Owned by [`crate::container::ContainerWriter`].
pub struct WriteRing {
    t: usize,
    thread_no: usize,
    slots: Vec<Slot>,
    shared: Arc<Mutex<WriteState>>,
    config: Arc<Config>,
    poison: Arc<Poison>,
}

impl WriteRing {
    /// `cur_pos` is the logical offset (relative to `initial_pos`) just past
    /// the `N` freshly written initial headers; `last_head` is one entry per
    /// stream, each pointing at that stream's initial header's `next_off`
    /// field (§4.4, §9 open question: `+17`/`+9` from the header's start).
    pub fn new(file: File, cur_pos: u64, last_head: Vec<u64>, config: Arc<Config>, poison: Arc<Poison>) -> Self {
        let t = config.threads;
        let mut slots = Vec::with_capacity(t);
        for i in 0..t {
            slots.push(Slot {
                free: Arc::new(Semaphore::new_posted()),
                // Slot T-1 is seeded so slot 0 may start (§4.5).
                complete: Arc::new(if i == t - 1 {
                    Semaphore::new_posted()
                } else {
                    Semaphore::new()
                }),
                handle: None,
            });
        }
        WriteRing {
            t,
            thread_no: 0,
            slots,
            shared: Arc::new(Mutex::new(WriteState {
                file,
                cur_pos,
                last_head,
            })),
            config,
            poison,
        }
    }

    /// `flush_buffer` (§4.5 "Submission"): hands the stream's accumulated
    /// buffer to the next slot in the ring and spawns its worker.
    pub fn flush_buffer(&mut self, stream_idx: usize, stream: &mut Stream) -> Result<()> {
        self.poison.check()?;
        if stream.buflen == 0 {
            return Ok(());
        }

        let i = self.thread_no;
        self.slots[i].free.wait();

        let bufsize = stream.buf.capacity();
        let s_buf = std::mem::replace(&mut stream.buf, Vec::with_capacity(bufsize));
        let s_len = stream.buflen;
        stream.buflen = 0;

        let wait_on = (i + self.t - 1) % self.t;
        let complete_mine = Arc::clone(&self.slots[i].complete);
        let complete_pred = Arc::clone(&self.slots[wait_on].complete);
        let free_mine = Arc::clone(&self.slots[i].free);
        let shared = Arc::clone(&self.shared);
        let config = Arc::clone(&self.config);
        let poison = Arc::clone(&self.poison);

        let handle = std::thread::spawn(move || {
            compress_worker(
                shared,
                config,
                poison,
                complete_pred,
                complete_mine,
                free_mine,
                stream_idx,
                s_buf,
                s_len,
            );
        });

        if let Some(previous) = self.slots[i].handle.replace(handle) {
            let _ = previous.join();
        }

        self.thread_no = (self.thread_no + 1) % self.t;
        Ok(())
    }

    /// `close_stream_out` (§4.5 "Close"): waits for every slot's `free`,
    /// the signal its worker posts last, then joins the thread.
    pub fn close(&mut self) -> Result<()> {
        for slot in &mut self.slots {
            slot.free.wait();
            if let Some(handle) = slot.handle.take() {
                let _ = handle.join();
            }
        }
        self.poison.check()?;
        let mut state = self.shared.lock().unwrap();
        state.file.flush()?;
        Ok(())
    }

    pub fn last_head(&self, stream_idx: usize) -> u64 {
        self.shared.lock().unwrap().last_head[stream_idx]
    }
}

#[allow(clippy::too_many_arguments)]
fn compress_worker(
    shared: Arc<Mutex<WriteState>>,
    config: Arc<Config>,
    poison: Arc<Poison>,
    complete_pred: Arc<Semaphore>,
    complete_mine: Arc<Semaphore>,
    free_mine: Arc<Semaphore>,
    stream_idx: usize,
    s_buf: Vec<u8>,
    s_len: usize,
) {
    let result = run_compress_worker(&shared, &config, stream_idx, s_buf, s_len, &complete_pred);
    match result {
        Ok(()) => {}
        Err(e) => {
            error!(stream = stream_idx, error = %e, "write worker failed, poisoning container");
            poison.set(e.to_string());
        }
    }
    complete_mine.post();
    free_mine.post();
}

fn run_compress_worker(
    shared: &Arc<Mutex<WriteState>>,
    config: &Arc<Config>,
    stream_idx: usize,
    s_buf: Vec<u8>,
    s_len: usize,
    complete_pred: &Arc<Semaphore>,
) -> Result<()> {
    // Step 1: compress (and optionally encrypt), entirely off the shared
    // state, so every slot's back-end runs fully in parallel.
    let compressed = codec::compress(&s_buf[..s_len], config.codec, config.level, config.lzo_threshold)?;
    let c_type = compressed.codec.tag();
    let payload = match config.master_key() {
        Some(master) => crypto::encrypt_payload(master, &compressed.data)?,
        None => compressed.data,
    };

    // Step 2: the sole write-ordering point.
    complete_pred.wait();

    // Steps 3-6: patch predecessor, append this chunk, advance cur_pos.
    let mut state = shared.lock().unwrap();
    let header_pos = state.cur_pos;
    let predecessor_field = state.last_head[stream_idx];
    let legacy = config.format_version.legacy_header();

    format::patch_next_off(&mut state.file, predecessor_field, header_pos, legacy)?;

    state.file.seek(SeekFrom::Start(header_pos))?;
    let header = ChunkHeader {
        c_type,
        c_len: payload.len() as u64,
        u_len: s_len as u64,
        next_off: 0,
    };
    state.last_head[stream_idx] = format::write_header(&mut state.file, &header, legacy)?;
    crate::io_util::write_exact(&mut state.file, &payload)?;
    state.file.sync_data()?;
    state.cur_pos = header_pos + ChunkHeader::encoded_len(legacy) + payload.len() as u64;

    debug!(stream = stream_idx, c_type, c_len = payload.len(), u_len = s_len, "chunk written");
    Ok(())
}
