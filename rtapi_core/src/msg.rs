//! Deferred, level-filtered messages (`print` / `print_msg`).
//!
//! Tasks stash records into a fixed [`MessageStash`]; the non-RT side
//! later flushes them through a [`MsgHandler`].
//!
//! ## Record layout
//! `[level: u8][stashf record]`, back to back, oldest first.

use crate::buffer::{Buffer, Cursor};
use crate::stashf::{self, Arg, Catalog, NoTranslation};
use rtapi_common::error::{RtapiError, RtapiResult};
use rtapi_common::level::MsgLevel;
use std::cell::{Cell, RefCell};
use std::io::Write;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

// ─── Handlers ───────────────────────────────────────────────────────

/// Sink for rendered messages.
pub trait MsgHandler {
    /// Emit one message.
    fn handle(&mut self, level: MsgLevel, text: &str);
}

impl<F: FnMut(MsgLevel, &str)> MsgHandler for F {
    fn handle(&mut self, level: MsgLevel, text: &str) {
        self(level, text)
    }
}

/// Forwards messages to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHandler;

impl MsgHandler for TracingHandler {
    fn handle(&mut self, level: MsgLevel, text: &str) {
        let text = text.trim_end_matches('\n');
        match level {
            MsgLevel::Err => error!(target: "rtapi::msg", "{text}"),
            MsgLevel::Warn => warn!(target: "rtapi::msg", "{text}"),
            MsgLevel::Dbg => debug!(target: "rtapi::msg", "{text}"),
            MsgLevel::None | MsgLevel::Info | MsgLevel::All => info!(target: "rtapi::msg", "{text}"),
        }
    }
}

/// Writes errors and warnings to stderr, everything else to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleHandler;

impl MsgHandler for ConsoleHandler {
    fn handle(&mut self, level: MsgLevel, text: &str) {
        // Output failures have nowhere to be reported.
        let _ = match level {
            MsgLevel::Err | MsgLevel::Warn => std::io::stderr().lock().write_all(text.as_bytes()),
            _ => std::io::stdout().lock().write_all(text.as_bytes()),
        };
    }
}

// ─── Stash ──────────────────────────────────────────────────────────

/// Fixed-capacity queue of encoded messages.
#[derive(Debug)]
pub struct MessageStash {
    buf: Buffer,
    /// Bytes in use.
    len: usize,
    records: usize,
    dropped: u64,
}

impl MessageStash {
    /// Empty stash of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Buffer::new(capacity),
            len: 0,
            records: 0,
            dropped: 0,
        }
    }

    /// Append one record.
    ///
    /// # Errors
    /// `OutOfSpace` if the record does not fit (counted as dropped), or
    /// any `stashf::encode` error.
    pub fn push(&mut self, level: MsgLevel, format: &str, args: &[Arg<'_>]) -> RtapiResult<()> {
        let mut cur = self.buf.cursor_mut();
        cur.set_position(self.len)?;
        let result = cur
            .put_u8(level as u8)
            .and_then(|()| stashf::encode(&mut cur, format, args));
        match result {
            Ok(()) => {
                self.len = cur.position();
                self.records += 1;
                Ok(())
            }
            Err(e) => {
                if matches!(e, RtapiError::OutOfSpace { .. }) {
                    self.dropped += 1;
                }
                Err(e)
            }
        }
    }

    /// Decode every record, oldest first, and empty the stash.
    ///
    /// The stash is emptied even if a record fails to decode.
    pub fn drain<C: Catalog + ?Sized>(&mut self, catalog: &C) -> RtapiResult<Vec<(MsgLevel, String)>> {
        let mut out = Vec::with_capacity(self.records);
        let result = decode_records(&self.buf.as_bytes()[..self.len], catalog, &mut out);
        self.len = 0;
        self.records = 0;
        result.map(|()| out)
    }

    /// Decode every record into `handler` and empty the stash.
    pub fn flush<H: MsgHandler + ?Sized>(&mut self, handler: &mut H) -> RtapiResult<usize> {
        let records = self.drain(&NoTranslation)?;
        for (level, text) in &records {
            handler.handle(*level, text);
        }
        Ok(records.len())
    }

    /// Records waiting.
    pub fn len(&self) -> usize {
        self.records
    }

    /// Whether no record is waiting.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Bytes in use.
    pub fn used(&self) -> usize {
        self.len
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Records rejected for lack of space since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

fn decode_records<C: Catalog + ?Sized>(
    bytes: &[u8],
    catalog: &C,
    out: &mut Vec<(MsgLevel, String)>,
) -> RtapiResult<()> {
    let mut cur = Cursor::new(bytes);
    while cur.remaining() > 0 {
        let level = MsgLevel::from_u8(cur.get_u8()?)
            .ok_or(RtapiError::InvalidArgument("corrupt message level"))?;
        out.push((level, stashf::decode(&mut cur, catalog)?));
    }
    Ok(())
}

// ─── Messenger ──────────────────────────────────────────────────────

struct MessengerInner {
    stash: MessageStash,
    catalog: Box<dyn Catalog>,
}

/// Shared handle to the message level and stash.
///
/// Cloned into task bodies; every clone feeds the same stash. Confined
/// to the scheduling thread.
#[derive(Clone)]
pub struct Messenger {
    level: Rc<Cell<MsgLevel>>,
    inner: Rc<RefCell<MessengerInner>>,
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Messenger")
                .field("level", &self.level.get())
                .field("stash", &inner.stash)
                .finish_non_exhaustive(),
            Err(_) => f.write_str("Messenger { <borrowed> }"),
        }
    }
}

impl Messenger {
    /// Messenger with `level` threshold and a stash of `capacity` bytes.
    pub fn new(level: MsgLevel, capacity: usize) -> Self {
        Self {
            level: Rc::new(Cell::new(level)),
            inner: Rc::new(RefCell::new(MessengerInner {
                stash: MessageStash::new(capacity),
                catalog: Box::new(NoTranslation),
            })),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut MessengerInner) -> T) -> RtapiResult<T> {
        let mut inner = self.inner.try_borrow_mut().map_err(|_| RtapiError::WouldBlock)?;
        Ok(f(&mut inner))
    }

    /// Stash a message if `level` passes the current threshold.
    ///
    /// A filtered message is not an error.
    pub fn print_msg(&self, level: MsgLevel, format: &str, args: &[Arg<'_>]) -> RtapiResult<()> {
        if !self.level.get().passes(level) {
            return Ok(());
        }
        self.with(|inner| inner.stash.push(level, format, args))?
    }

    /// Stash a message regardless of the threshold.
    pub fn print(&self, format: &str, args: &[Arg<'_>]) -> RtapiResult<()> {
        self.with(|inner| inner.stash.push(MsgLevel::All, format, args))?
    }

    /// Change the threshold. Allowed during a flush.
    pub fn set_msg_level(&self, level: MsgLevel) -> RtapiResult<()> {
        self.level.set(level);
        Ok(())
    }

    /// Current threshold.
    pub fn get_msg_level(&self) -> MsgLevel {
        self.level.get()
    }

    /// Install the catalog used when flushing.
    pub fn set_catalog<C: Catalog + 'static>(&self, catalog: C) -> RtapiResult<()> {
        self.with(|inner| inner.catalog = Box::new(catalog))
    }

    /// Render every stashed message into `handler`.
    ///
    /// The handler may itself print; those messages wait for the next
    /// flush.
    pub fn flush(&self, handler: &mut dyn MsgHandler) -> RtapiResult<usize> {
        let records = self.with(|inner| inner.stash.drain(&*inner.catalog))??;
        for (level, text) in &records {
            handler.handle(*level, text);
        }
        Ok(records.len())
    }

    /// Messages waiting.
    ///
    /// `WouldBlock` while a flush is decoding the stash.
    pub fn pending(&self) -> RtapiResult<usize> {
        self.with(|inner| inner.stash.len())
    }

    /// Messages dropped for lack of space.
    ///
    /// `WouldBlock` while a flush is decoding the stash.
    pub fn dropped(&self) -> RtapiResult<u64> {
        self.with(|inner| inner.stash.dropped())
    }
}
