//! Binary semaphore substitute for the write/read ring's ordering chain
//! (§9 redesign note: "prefer a condition-variable + counter abstraction, or
//! a bounded channel per slot").
//!
//! A bounded `crossbeam_channel` of capacity 1 gives exactly the binary
//! semaphore contract §5 describes: `post` never blocks (the channel either
//! has room or the previous token is still unconsumed, which cannot happen
//! for a correctly used binary semaphore), `wait` blocks until a token is
//! available, and `try_wait` is a non-blocking poll. Unlike POSIX semaphores
//! there is no EINTR to retry: a blocking channel `recv` simply resumes when
//! a sender shows up.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

pub struct Semaphore {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Semaphore {
    /// A semaphore starting at 0 (must be `post`-ed before anyone can `wait`).
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Semaphore { tx, rx }
    }

    /// A semaphore starting at 1, i.e. already posted once. Used to seed the
    /// write ring's `complete[T-1]` so slot 0 may start (§4.5).
    pub fn new_posted() -> Self {
        let sem = Self::new();
        sem.post();
        sem
    }

    pub fn post(&self) {
        // A binary semaphore used correctly never has two posts outstanding
        // at once; a full channel here would indicate a contract violation
        // upstream, not a recoverable condition, so drop the duplicate token
        // rather than block the poster forever.
        let _ = self.tx.try_send(());
    }

    pub fn wait(&self) {
        // recv() on a crossbeam channel cannot return Err while `self.tx` is
        // alive, which it always is here (owned by the same Semaphore).
        self.rx.recv().expect("semaphore sender dropped unexpectedly");
    }

    /// Non-blocking wait; `true` if a token was available and consumed.
    pub fn try_wait(&self) -> bool {
        match self.rx.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => false,
        }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}
