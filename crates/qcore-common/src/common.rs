// common.rs -- console output, message codec and command-line arguments

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{QError, QResult};
use crate::qcommon::{SizeBuf, SizeBufState};

pub const MAX_NUM_ARGVS: usize = 50;

// ============================================================
// Console -- Com_Printf sink
// ============================================================

#[derive(Debug, Default)]
struct ConsoleState {
    redirect: Option<String>,
}

/// Shared handle to the console output sink.
///
/// Clones refer to the same sink, so the command system, the cvar store and
/// the client can all print through it. Output goes to stdout unless a
/// redirect is active, in which case it is collected into a string.
#[derive(Debug, Clone, Default)]
pub struct Console {
    state: Rc<RefCell<ConsoleState>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// A console that starts out redirected.
    pub fn captured() -> Self {
        let con = Self::new();
        con.begin_redirect();
        con
    }

    pub fn printf(&self, msg: &str) {
        let mut state = self.state.borrow_mut();
        match state.redirect {
            Some(ref mut buf) => buf.push_str(msg),
            None => print!("{}", msg),
        }
    }

    /// Developer-only output.
    pub fn dprintf(&self, msg: &str) {
        tracing::debug!(target: "qcore::console", "{}", msg.trim_end());
    }

    pub fn begin_redirect(&self) {
        self.state.borrow_mut().redirect = Some(String::new());
    }

    /// End redirect and return the captured output.
    pub fn end_redirect(&self) -> Option<String> {
        self.state.borrow_mut().redirect.take()
    }

    /// Drain what has been captured so far, keeping the redirect active.
    pub fn take_output(&self) -> String {
        match self.state.borrow_mut().redirect {
            Some(ref mut buf) => std::mem::take(buf),
            None => String::new(),
        }
    }
}

// ============================================================
// SizeBuf operations
// ============================================================

impl SizeBuf {
    /// Reserve `length` bytes and return the offset they start at.
    pub fn get_space(&mut self, length: usize) -> QResult<usize> {
        if self.cursize + length > self.maxsize {
            if !self.allow_overflow {
                return Err(QError::Overflow);
            }
            if length > self.maxsize {
                return Err(QError::OversizedWrite(length));
            }
            tracing::warn!(maxsize = self.maxsize, length, "SZ_GetSpace: overflow");
            self.clear();
            self.overflowed = true;
        }

        let start = self.cursize;
        self.cursize += length;
        Ok(start)
    }

    pub fn write(&mut self, src: &[u8]) -> QResult<()> {
        let start = self.get_space(src.len())?;
        self.data[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Append a null-terminated string, writing over a trailing null left by
    /// a previous print so consecutive prints concatenate.
    pub fn print(&mut self, s: &str) -> QResult<()> {
        let text = null_terminated(s);
        let merge = self.cursize > 0 && self.data[self.cursize - 1] == 0;
        if merge {
            self.cursize -= 1;
        }
        match self.write(&text) {
            Err(e) => {
                if merge {
                    self.cursize += 1;
                }
                Err(e)
            }
            ok => ok,
        }
    }

    /// Replace the contents with `src`.
    pub fn fill_from(&mut self, src: &[u8]) -> QResult<()> {
        self.clear();
        self.write(src)
    }

    /// Append the contents of another buffer.
    pub fn append_from(&mut self, other: &SizeBuf) -> QResult<()> {
        self.write(other.as_slice())
    }

    pub fn save_state(&self) -> SizeBufState {
        SizeBufState {
            data: self.as_slice().to_vec(),
            overflowed: self.overflowed,
        }
    }

    pub fn restore_state(&mut self, state: &SizeBufState) {
        let len = state.data.len().min(self.maxsize);
        self.data[..len].copy_from_slice(&state.data[..len]);
        self.cursize = len;
        self.overflowed = state.overflowed;
    }
}

// ============================================================
// MSG write functions
// ============================================================

pub fn msg_write_char(sb: &mut SizeBuf, c: i32) -> QResult<()> {
    sb.write(&[c as i8 as u8])
}

pub fn msg_write_byte(sb: &mut SizeBuf, c: i32) -> QResult<()> {
    sb.write(&[c as u8])
}

pub fn msg_write_short(sb: &mut SizeBuf, c: i32) -> QResult<()> {
    sb.write(&(c as i16).to_le_bytes())
}

pub fn msg_write_long(sb: &mut SizeBuf, c: i32) -> QResult<()> {
    sb.write(&c.to_le_bytes())
}

pub fn msg_write_float(sb: &mut SizeBuf, f: f32) -> QResult<()> {
    sb.write(&f.to_le_bytes())
}

pub fn msg_write_string(sb: &mut SizeBuf, s: &str) -> QResult<()> {
    sb.write(&null_terminated(s))
}

fn null_terminated(s: &str) -> Vec<u8> {
    let mut text = Vec::with_capacity(s.len() + 1);
    text.extend_from_slice(s.as_bytes());
    text.push(0);
    text
}

/// 1/8 unit fixed point.
pub fn msg_write_coord(sb: &mut SizeBuf, f: f32) -> QResult<()> {
    msg_write_short(sb, (f * 8.0).round() as i32)
}

/// Whole degrees mapped onto 256 steps.
pub fn msg_write_angle(sb: &mut SizeBuf, f: f32) -> QResult<()> {
    msg_write_byte(sb, ((f.floor() as i32).wrapping_mul(256) / 360) & 255)
}

// ============================================================
// MsgReader -- read cursor over a message
// ============================================================

/// Cursor over a message buffer.
///
/// A read past the end sets the sticky `badread` flag and returns a sentinel
/// instead of failing, so a batch of reads can be checked once at the end.
#[derive(Debug, Clone)]
pub struct MsgReader<'a> {
    data: &'a [u8],
    pub readcount: usize,
    pub badread: bool,
}

impl<'a> MsgReader<'a> {
    pub fn new(sb: &'a SizeBuf) -> Self {
        Self::from_bytes(sb.as_slice())
    }

    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self {
            data,
            readcount: 0,
            badread: false,
        }
    }

    /// MSG_BeginReading
    pub fn reset(&mut self) {
        self.readcount = 0;
        self.badread = false;
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.readcount
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.readcount + n > self.data.len() {
            self.badread = true;
            return None;
        }
        let bytes = &self.data[self.readcount..self.readcount + n];
        self.readcount += n;
        Some(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N).and_then(|b| b.try_into().ok())
    }

    pub fn read_char(&mut self) -> i32 {
        self.take(1).map_or(-1, |b| b[0] as i8 as i32)
    }

    pub fn read_byte(&mut self) -> i32 {
        self.take(1).map_or(-1, |b| b[0] as i32)
    }

    pub fn read_short(&mut self) -> i32 {
        self.take_array::<2>().map_or(-1, |b| i16::from_le_bytes(b) as i32)
    }

    pub fn read_long(&mut self) -> i32 {
        self.take_array::<4>().map_or(-1, i32::from_le_bytes)
    }

    pub fn read_float(&mut self) -> f32 {
        self.take_array::<4>().map_or(-1.0, f32::from_le_bytes)
    }

    /// Reads up to a null terminator or the end of the message.
    pub fn read_string(&mut self) -> String {
        self.read_string_until(|c| c == 0)
    }

    /// Like `read_string` but also stops at a newline.
    pub fn read_string_line(&mut self) -> String {
        self.read_string_until(|c| c == 0 || c == b'\n')
    }

    fn read_string_until(&mut self, stop: impl Fn(u8) -> bool) -> String {
        let mut out = Vec::new();
        while let Some(b) = self.take(1) {
            if stop(b[0]) {
                break;
            }
            out.push(b[0]);
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    pub fn read_coord(&mut self) -> f32 {
        self.take_array::<2>()
            .map_or(0.0, |b| i16::from_le_bytes(b) as f32 * (1.0 / 8.0))
    }

    pub fn read_angle(&mut self) -> f32 {
        self.take(1).map_or(0.0, |b| b[0] as f32 * (360.0 / 256.0))
    }

    pub fn read_data(&mut self, len: usize) -> Option<&'a [u8]> {
        self.take(len)
    }
}

// ============================================================
// COM argument handling
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct ComArgs {
    argv: Vec<String>,
}

impl ComArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: args.into_iter().take(MAX_NUM_ARGVS).map(Into::into).collect(),
        }
    }

    pub fn com_argc(&self) -> usize {
        self.argv.len()
    }

    pub fn com_argv(&self, arg: usize) -> &str {
        self.argv.get(arg).map_or("", String::as_str)
    }

    pub fn com_clear_argv(&mut self, arg: usize) {
        if let Some(a) = self.argv.get_mut(arg) {
            a.clear();
        }
    }

    /// Position (1..argc) of `parm` on the command line, or 0.
    pub fn com_check_parm(&self, parm: &str) -> usize {
        self.argv
            .iter()
            .skip(1)
            .position(|a| a == parm)
            .map_or(0, |i| i + 1)
    }

    /// The argument following `parm`, if both are present.
    pub fn com_parm_value(&self, parm: &str) -> Option<&str> {
        let i = self.com_check_parm(parm);
        if i == 0 || i + 1 >= self.argv.len() {
            return None;
        }
        Some(&self.argv[i + 1])
    }
}

// ============================================================
// Tests
// ============================================================
