//! Worker ring, read side (C6, §4.6).
//!
//! Each stream owns a `T`-wide sub-ring carved out of one shared pool of
//! `N*T` slots (`[stream*T, stream*T+T)`). Unlike the write ring, only the
//! calling thread ever touches the container file; a worker here receives
//! an already-read, already-in-memory payload and does nothing but
//! decompress (and decrypt) it, so no file handle needs to cross a thread
//! boundary at all.

use crate::codec::{self, CodecKind};
use crate::config::Config;
use crate::crypto;
use crate::error::{CoreError, Result};
use crate::format::{self, check_u_len};
use crate::poison::Poison;
use crate::stream::Stream;
use crate::sync::Semaphore;

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error};

struct ReadSlot {
    free: Arc<Semaphore>,
    complete: Arc<Semaphore>,
    ready: Arc<Semaphore>,
    result: Arc<Mutex<Option<Vec<u8>>>>,
    handle: Option<JoinHandle<()>>,
    /// `true` from the moment a worker is spawned for this slot until
    /// `deliver_next` takes its result and posts `ready`. A caller is free
    /// to stop reading before a stream's end (§4.7 names no obligation to
    /// drain), so `close` must recognize slots left in this state and wake
    /// their worker itself rather than joining a thread parked on `ready`.
    outstanding: bool,
}

/// The read-side worker ring. Owned by [`crate::container::ContainerReader`],
/// shared across all `N` streams as one flat pool of `N*T` slots.
pub struct ReadRing {
    t: usize,
    slots: Vec<ReadSlot>,
    /// Submitted-but-undelivered chunk count per stream, so `fill_buffer`
    /// can tell a momentary gap (still filling the ring) from true
    /// end-of-stream (nothing left to prefetch *and* nothing outstanding).
    pending: Vec<usize>,
    config: Arc<Config>,
    poison: Arc<Poison>,
}

impl ReadRing {
    pub fn new(num_streams: usize, config: Arc<Config>, poison: Arc<Poison>) -> Self {
        let t = config.threads;
        let total = num_streams * t;
        let mut slots = Vec::with_capacity(total);
        for _ in 0..total {
            slots.push(ReadSlot {
                free: Arc::new(Semaphore::new_posted()),
                complete: Arc::new(Semaphore::new()),
                ready: Arc::new(Semaphore::new()),
                result: Arc::new(Mutex::new(None)),
                handle: None,
                outstanding: false,
            });
        }
        ReadRing {
            t,
            slots,
            pending: vec![0; num_streams],
            config,
            poison,
        }
    }

    /// `fill_buffer` (§4.6): submits prefetches (with the step-5 lookahead
    /// chain) for `stream`, then delivers the oldest outstanding result into
    /// `stream.buf`. Returns `false` only once both the chain is exhausted
    /// (`eos`) and nothing remains to deliver: true end of stream.
    pub fn fill_buffer(&mut self, file: &mut File, stream_idx: usize, stream: &mut Stream) -> Result<bool> {
        self.poison.check()?;

        if !stream.eos {
            self.submit_prefetch(file, stream_idx, stream)?;
        }

        if self.pending[stream_idx] == 0 {
            return Ok(false);
        }

        self.deliver_next(stream_idx, stream)?;
        Ok(true)
    }

    fn submit_prefetch(&mut self, file: &mut File, stream_idx: usize, stream: &mut Stream) -> Result<()> {
        if stream.eos {
            return Ok(());
        }

        let legacy = self.config.format_version.legacy_header();
        let header_pos = stream.last_head;
        file.seek(SeekFrom::Start(header_pos))?;
        let header = format::read_header(file, legacy)?;

        // `c_len` is an untrusted on-disk field; a corrupt or malicious
        // chunk header must surface as a `FormatError`, not an allocation
        // that aborts the process before the normal error path ever runs.
        let remaining = file.metadata()?.len().saturating_sub(file.stream_position()?);
        if header.c_len > remaining {
            return Err(CoreError::Format(format!(
                "chunk claims c_len {} but only {remaining} bytes remain in the file",
                header.c_len
            )));
        }

        let slot = stream.base_thread + stream.uthread_no;
        self.slots[slot].free.wait();

        let mut payload = vec![0u8; header.c_len as usize];
        crate::io_util::read_exact(file, &mut payload)?;

        stream.last_head = header.next_off;
        if header.next_off == 0 {
            stream.eos = true;
        }

        let result = Arc::clone(&self.slots[slot].result);
        let complete = Arc::clone(&self.slots[slot].complete);
        let ready = Arc::clone(&self.slots[slot].ready);
        let free = Arc::clone(&self.slots[slot].free);
        let config = Arc::clone(&self.config);
        let poison = Arc::clone(&self.poison);
        let c_type = header.c_type;
        let u_len = header.u_len as usize;

        let handle = std::thread::spawn(move || {
            decompress_worker(config, poison, result, complete, ready, free, c_type, u_len, payload);
        });
        if let Some(previous) = self.slots[slot].handle.replace(handle) {
            let _ = previous.join();
        }
        self.slots[slot].outstanding = true;
        self.pending[stream_idx] += 1;

        stream.uthread_no = (stream.uthread_no + 1) % self.t;

        // Step 5: peek the new slot's `free` without consuming it for real;
        // if it's already available, another chunk is worth prefetching now.
        let next_slot = stream.base_thread + stream.uthread_no;
        if self.slots[next_slot].free.try_wait() {
            self.slots[next_slot].free.post();
            self.submit_prefetch(file, stream_idx, stream)?;
        }

        Ok(())
    }

    fn deliver_next(&mut self, stream_idx: usize, stream: &mut Stream) -> Result<()> {
        let slot = stream.base_thread + stream.unext_thread;
        self.slots[slot].complete.wait();

        // The slot's only `complete` token is now consumed, so its worker
        // must be released (posting `ready`) and its bookkeeping cleared
        // here, before any early return. Otherwise a poisoned container
        // leaves this slot `outstanding` with no token left for `close` to
        // wait on, and it hangs forever on `complete.wait()` there.
        let data = self.slots[slot].result.lock().unwrap().take();
        self.slots[slot].ready.post();
        self.slots[slot].outstanding = false;
        stream.unext_thread = (stream.unext_thread + 1) % self.t;
        self.pending[stream_idx] -= 1;

        self.poison.check()?;

        match data {
            Some(buf) => {
                stream.buflen = buf.len();
                stream.buf = buf;
                stream.bufp = 0;
                Ok(())
            }
            None => Err(CoreError::Format(
                "read worker finished without producing a result".into(),
            )),
        }
    }

    /// Drains every outstanding worker so no thread or semaphore token
    /// survives `close_in` (§4.7, testable property 7; its write-side
    /// analogue). A caller may stop reading a stream before its end, so any
    /// slot still `outstanding` has a worker parked on `ready`: wake it by
    /// waiting out its `complete` (bounded, decompression always finishes)
    /// and posting `ready` on its behalf, discarding the result, before
    /// joining.
    pub fn close(&mut self) -> Result<()> {
        for slot in &mut self.slots {
            if slot.outstanding {
                slot.complete.wait();
                slot.result.lock().unwrap().take();
                slot.ready.post();
                slot.outstanding = false;
            }
            if let Some(handle) = slot.handle.take() {
                let _ = handle.join();
            }
        }
        self.poison.check()
    }
}

#[allow(clippy::too_many_arguments)]
fn decompress_worker(
    config: Arc<Config>,
    poison: Arc<Poison>,
    result: Arc<Mutex<Option<Vec<u8>>>>,
    complete: Arc<Semaphore>,
    ready: Arc<Semaphore>,
    free: Arc<Semaphore>,
    c_type: u8,
    u_len: usize,
    payload: Vec<u8>,
) {
    let outcome = run_decompress_worker(&config, c_type, u_len, payload);
    match outcome {
        Ok(data) => {
            *result.lock().unwrap() = Some(data);
        }
        Err(e) => {
            error!(error = %e, "read worker failed, poisoning container");
            poison.set(e.to_string());
        }
    }
    complete.post();
    ready.wait();
    free.post();
}

fn run_decompress_worker(config: &Arc<Config>, c_type: u8, u_len: usize, payload: Vec<u8>) -> Result<Vec<u8>> {
    let codec_kind = CodecKind::from_tag(c_type)?;
    let compressed = match config.master_key() {
        Some(master) => crypto::decrypt_payload(master, &payload)?,
        None => payload,
    };
    let data = codec::decompress(&compressed, codec_kind, u_len)?;
    check_u_len(u_len as u64, data.len())?;
    debug!(c_type, u_len, "chunk decompressed");
    Ok(data)
}
