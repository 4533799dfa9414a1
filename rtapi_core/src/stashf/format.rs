//! printf-subset grammar shared by encode and decode.
//!
//! ```text
//! %[flags][width][.precision][l]conversion
//! flags       := { '-' | '+' | ' ' | '#' | '0' }
//! conversion  := c d i u x X e E f F g G s p %
//! ```

use bitflags::bitflags;
use rtapi_common::error::{RtapiError, RtapiResult};

bitflags! {
    /// C flag characters between `%` and the conversion.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FormatFlags: u8 {
        /// `-` left-justify within the field
        const LEFT    = 1 << 0;
        /// `+` always print a sign
        const PLUS    = 1 << 1;
        /// ` ` space in place of a `+` sign
        const SPACE   = 1 << 2;
        /// `#` alternate form
        const ALT     = 1 << 3;
        /// `0` pad with zeros
        const ZERO    = 1 << 4;
    }
}

impl FormatFlags {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'-' => Some(Self::LEFT),
            b'+' => Some(Self::PLUS),
            b' ' => Some(Self::SPACE),
            b'#' => Some(Self::ALT),
            b'0' => Some(Self::ZERO),
            _ => None,
        }
    }
}

/// Conversion character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// `c`
    Char,
    /// `d` / `i`
    Signed,
    /// `u`
    Unsigned,
    /// `x`
    Hex,
    /// `X`
    HexUpper,
    /// `e` / `E`
    Exp { upper: bool },
    /// `f` / `F`
    Fixed { upper: bool },
    /// `g` / `G`
    General { upper: bool },
    /// `s`
    Str,
    /// `p`
    Pointer,
}

impl Conversion {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            b'c' => Self::Char,
            b'd' | b'i' => Self::Signed,
            b'u' => Self::Unsigned,
            b'x' => Self::Hex,
            b'X' => Self::HexUpper,
            b'e' => Self::Exp { upper: false },
            b'E' => Self::Exp { upper: true },
            b'f' => Self::Fixed { upper: false },
            b'F' => Self::Fixed { upper: true },
            b'g' => Self::General { upper: false },
            b'G' => Self::General { upper: true },
            b's' => Self::Str,
            b'p' => Self::Pointer,
            _ => return None,
        })
    }
}

/// Width of the value a conversion stores in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// native `int`
    Int,
    /// native `long`
    Long,
    /// `double`
    Float,
    /// NUL-terminated string
    Str,
}

/// One parsed conversion specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spec {
    pub flags: FormatFlags,
    pub width: Option<usize>,
    pub precision: Option<usize>,
    pub long: bool,
    pub conv: Conversion,
    /// Byte offset of the `%` in the format string.
    pub offset: usize,
}

impl Spec {
    /// Storage class: `l` and `p` widen integers to `long`, floats are
    /// always `double`.
    pub fn class(&self) -> Class {
        match self.conv {
            Conversion::Pointer => Class::Long,
            Conversion::Char
            | Conversion::Signed
            | Conversion::Unsigned
            | Conversion::Hex
            | Conversion::HexUpper => {
                if self.long {
                    Class::Long
                } else {
                    Class::Int
                }
            }
            Conversion::Exp { .. } | Conversion::Fixed { .. } | Conversion::General { .. } => {
                Class::Float
            }
            Conversion::Str => Class::Str,
        }
    }
}

/// Segment of a format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'f> {
    /// Text copied through unchanged.
    Literal(&'f str),
    /// `%%`
    Percent,
    /// A conversion consuming one argument.
    Conv(Spec),
}

/// Iterator over the pieces of a format string.
///
/// Yields at most one error, then stops.
pub struct Pieces<'f> {
    fmt: &'f str,
    pos: usize,
}

impl<'f> Pieces<'f> {
    pub fn new(fmt: &'f str) -> Self {
        Self { fmt, pos: 0 }
    }

    fn conversion(&mut self, start: usize) -> RtapiResult<Piece<'f>> {
        let bytes = self.fmt.as_bytes();
        let mut i = start + 1;
        let invalid = |offset, reason| RtapiError::InvalidFormat { offset, reason };

        if bytes.get(i) == Some(&b'%') {
            self.pos = i + 1;
            return Ok(Piece::Percent);
        }

        let mut flags = FormatFlags::empty();
        while let Some(flag) = bytes.get(i).copied().and_then(FormatFlags::from_byte) {
            flags |= flag;
            i += 1;
        }

        let width = self.number(&mut i)?;

        let precision = if bytes.get(i) == Some(&b'.') {
            i += 1;
            Some(self.number(&mut i)?.unwrap_or(0))
        } else {
            None
        };

        let long = bytes.get(i) == Some(&b'l');
        if long {
            i += 1;
        }

        let Some(&c) = bytes.get(i) else {
            return Err(invalid(start, "incomplete conversion at end of format"));
        };
        let conv = match Conversion::from_byte(c) {
            Some(conv) => conv,
            None if c == b'*' => return Err(invalid(i, "`*` width or precision not supported")),
            None => return Err(invalid(i, "unknown conversion")),
        };

        self.pos = i + 1;
        Ok(Piece::Conv(Spec {
            flags,
            width,
            precision,
            long,
            conv,
            offset: start,
        }))
    }

    fn number(&self, i: &mut usize) -> RtapiResult<Option<usize>> {
        let bytes = self.fmt.as_bytes();
        let begin = *i;
        let mut value: usize = 0;
        while let Some(d) = bytes.get(*i).filter(|b| b.is_ascii_digit()) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(usize::from(d - b'0')))
                .ok_or(RtapiError::InvalidFormat {
                    offset: begin,
                    reason: "field width overflow",
                })?;
            *i += 1;
        }
        Ok((*i > begin).then_some(value))
    }
}

impl<'f> Iterator for Pieces<'f> {
    type Item = RtapiResult<Piece<'f>>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.fmt.get(self.pos..).filter(|r| !r.is_empty())?;
        match rest.find('%') {
            Some(0) => {
                let start = self.pos;
                let piece = self.conversion(start);
                if piece.is_err() {
                    self.pos = self.fmt.len();
                }
                Some(piece)
            }
            Some(n) => {
                self.pos += n;
                Some(Ok(Piece::Literal(&rest[..n])))
            }
            None => {
                self.pos = self.fmt.len();
                Some(Ok(Piece::Literal(rest)))
            }
        }
    }
}

fn classes(fmt: &str) -> impl Iterator<Item = Option<Class>> + '_ {
    Pieces::new(fmt).filter_map(|p| match p {
        Ok(Piece::Conv(spec)) => Some(Some(spec.class())),
        Ok(_) => None,
        Err(_) => Some(None),
    })
}

/// Whether two well-formed formats consume the same sequence of storage
/// classes.
pub fn same_schema(a: &str, b: &str) -> bool {
    classes(a).eq(classes(b)) && classes(a).all(|c| c.is_some())
}
