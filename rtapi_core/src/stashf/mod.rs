//! Deferred printf ("stashf").
//!
//! [`encode`] stores a format string and its arguments in a [`Buffer`]
//! from time-critical code; [`decode`] and its front-ends rebuild the text
//! later where blocking output is allowed.
//!
//! ## Record layout
//!
//! ```text
//! [format\0][arg 0][arg 1]...
//! ```
//!
//! Each argument is stored with the width its conversion implies:
//! `int`, or `long` under `l` and `%p`, `double` for every float
//! conversion, NUL-terminated bytes for `%s`. There is no type tag, so a
//! record must be decoded with the format it was encoded with. Decoding
//! a record from a different schema is a caller error and is not
//! detected.
//!
//! ## Example
//!
//! ```rust
//! use rtapi_core::buffer::Buffer;
//! use rtapi_core::stashf::{self, Arg, NoTranslation};
//!
//! let mut buf = Buffer::new(64);
//! stashf::encode(&mut buf.cursor_mut(), "x=%d y=%s", &[Arg::from(42), Arg::from("ok")]).unwrap();
//! let text = stashf::decode(&mut buf.cursor(), &NoTranslation).unwrap();
//! assert_eq!(text, "x=42 y=ok");
//! ```
//!
//! [`Buffer`]: crate::buffer::Buffer

pub mod format;
pub mod render;

use crate::buffer::Cursor;
use core::ffi::{c_int, c_long};
use format::{Class, Piece, Pieces, same_schema};
use render::Value;
use rtapi_common::error::{RtapiError, RtapiResult};
use std::collections::HashMap;
use std::io::Write;

/// Tagged argument for [`encode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    /// Integer, character or pointer conversions.
    Int(i64),
    /// Floating-point conversions.
    Float(f64),
    /// `%s`.
    Str(&'a str),
}

macro_rules! int_arg {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg<'_> {
            fn from(v: $t) -> Self {
                Arg::Int(v as i64)
            }
        })*
    };
}

int_arg!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, char, bool);

impl From<f32> for Arg<'_> {
    fn from(v: f32) -> Self {
        Arg::Float(f64::from(v))
    }
}

impl From<f64> for Arg<'_> {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(v: &'a str) -> Self {
        Arg::Str(v)
    }
}

impl<T> From<*const T> for Arg<'_> {
    fn from(v: *const T) -> Self {
        Arg::Int(v as usize as i64)
    }
}

impl<T> From<*mut T> for Arg<'_> {
    fn from(v: *mut T) -> Self {
        Arg::Int(v as usize as i64)
    }
}

/// Message catalog consulted at decode time.
///
/// Applied to the stored format and to every `%s` argument. A translated
/// format is only used if it consumes the same storage classes as the
/// stored one.
pub trait Catalog {
    /// Translation of `msgid`, if the catalog has one.
    fn lookup(&self, msgid: &str) -> Option<&str>;
}

/// Catalog that never translates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslation;

impl Catalog for NoTranslation {
    fn lookup(&self, _msgid: &str) -> Option<&str> {
        None
    }
}

impl Catalog for HashMap<String, String> {
    fn lookup(&self, msgid: &str) -> Option<&str> {
        self.get(msgid).map(String::as_str)
    }
}

/// Store `format` and `args` at the cursor.
///
/// On error nothing is considered written: the cursor is restored to
/// where it started.
///
/// # Errors
/// - `InvalidFormat` for an unknown or incomplete conversion, an argument
///   whose tag does not match its conversion, or too few/many arguments
/// - `OutOfSpace` if the record does not fit
pub fn encode(cur: &mut Cursor<&mut [u8]>, format: &str, args: &[Arg<'_>]) -> RtapiResult<()> {
    let start = cur.position();
    let result = encode_record(cur, format, args);
    if result.is_err() {
        cur.set_position(start)?;
    }
    result
}

fn encode_record(cur: &mut Cursor<&mut [u8]>, format: &str, args: &[Arg<'_>]) -> RtapiResult<()> {
    if format.as_bytes().contains(&0) {
        return Err(RtapiError::InvalidFormat {
            offset: format.find('\0').unwrap_or(0),
            reason: "NUL byte inside format",
        });
    }
    cur.put_str(format)?;

    let mut args = args.iter();
    for piece in Pieces::new(format) {
        let Piece::Conv(spec) = piece? else {
            continue;
        };
        let invalid = |reason| RtapiError::InvalidFormat {
            offset: spec.offset,
            reason,
        };
        let arg = args.next().ok_or_else(|| invalid("missing argument"))?;
        match (spec.class(), arg) {
            (Class::Int, Arg::Int(v)) => cur.put_int(*v as c_int)?,
            (Class::Long, Arg::Int(v)) => cur.put_long(*v as c_long)?,
            (Class::Float, Arg::Float(v)) => cur.put_f64(*v)?,
            (Class::Str, Arg::Str(s)) => cur.put_str(*s)?,
            _ => return Err(invalid("argument type does not match conversion")),
        }
    }

    if args.next().is_some() {
        return Err(RtapiError::InvalidFormat {
            offset: format.len(),
            reason: "more arguments than conversions",
        });
    }
    Ok(())
}

/// Rebuild the text of the record at the cursor.
///
/// On error the cursor is restored to where it started.
///
/// # Errors
/// - `WouldBlock` if the record is truncated
/// - `InvalidFormat` if the stored format is malformed or not UTF-8
pub fn decode<C: Catalog + ?Sized>(cur: &mut Cursor<&[u8]>, catalog: &C) -> RtapiResult<String> {
    let start = cur.position();
    let result = decode_record(cur, catalog);
    if result.is_err() {
        cur.set_position(start)?;
    }
    result
}

fn utf8(bytes: &[u8], offset: usize) -> RtapiResult<&str> {
    core::str::from_utf8(bytes).map_err(|_| RtapiError::InvalidFormat {
        offset,
        reason: "stored text is not UTF-8",
    })
}

fn decode_record<C: Catalog + ?Sized>(cur: &mut Cursor<&[u8]>, catalog: &C) -> RtapiResult<String> {
    let format = utf8(cur.get_str()?, 0)?;

    let mut values = Vec::new();
    for piece in Pieces::new(format) {
        let Piece::Conv(spec) = piece? else {
            continue;
        };
        let value = match spec.class() {
            Class::Int => Value::Int(i64::from(cur.get_int()?)),
            Class::Long => Value::Long(i64::from(cur.get_long()?)),
            Class::Float => Value::Float(cur.get_f64()?),
            Class::Str => {
                let s = utf8(cur.get_str()?, spec.offset)?;
                Value::Str(catalog.lookup(s).unwrap_or(s))
            }
        };
        values.push(value);
    }

    let shown = catalog
        .lookup(format)
        .filter(|t| same_schema(format, t))
        .unwrap_or(format);

    let mut out = String::with_capacity(shown.len() + 16 * values.len());
    let mut values = values.into_iter();
    for piece in Pieces::new(shown) {
        match piece? {
            Piece::Literal(s) => out.push_str(s),
            Piece::Percent => out.push('%'),
            Piece::Conv(spec) => {
                let value = values.next().ok_or(RtapiError::InvalidFormat {
                    offset: spec.offset,
                    reason: "missing argument",
                })?;
                render::conversion(&mut out, &spec, value)?;
            }
        }
    }
    Ok(out)
}

/// Decode into `out` with `snprintf` semantics.
///
/// Writes at most `out.len() - 1` bytes plus a NUL and returns the length
/// the full text would have had.
pub fn snprint<C: Catalog + ?Sized>(
    out: &mut [u8],
    cur: &mut Cursor<&[u8]>,
    catalog: &C,
) -> RtapiResult<usize> {
    let text = decode(cur, catalog)?;
    if let Some(room) = out.len().checked_sub(1) {
        let n = text.len().min(room);
        out[..n].copy_from_slice(&text.as_bytes()[..n]);
        out[n] = 0;
    }
    Ok(text.len())
}

/// Decode and write to `w`, returning the number of bytes written.
pub fn fprint<W: Write + ?Sized, C: Catalog + ?Sized>(
    w: &mut W,
    cur: &mut Cursor<&[u8]>,
    catalog: &C,
) -> RtapiResult<usize> {
    let text = decode(cur, catalog)?;
    w.write_all(text.as_bytes())?;
    Ok(text.len())
}

/// Decode and write to standard output.
pub fn print<C: Catalog + ?Sized>(cur: &mut Cursor<&[u8]>, catalog: &C) -> RtapiResult<usize> {
    fprint(&mut std::io::stdout().lock(), cur, catalog)
}
