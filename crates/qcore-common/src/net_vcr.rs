// net_vcr.rs -- deterministic record/replay of network operations
//
// A VCR file is a sequence of records, each a 20 byte little-endian header
// {f64 host time, i32 op, i64 session} followed by an op-specific payload:
//
//   CONNECT        64 byte null-padded address, absent when session is 0
//   GETMESSAGE     i32 ret, then i32 len + len bytes when ret > 0
//   SENDMESSAGE    i32 ret
//   CANSENDMESSAGE i32 ret
//
// Playback checks every operation against the next record. Any difference in
// time, op or session means the program no longer behaves as recorded and is
// fatal.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{QError, QResult};
use crate::net::{NetDriver, QSocket};
use crate::qcommon::{SizeBuf, NET_MAXMESSAGE, NET_NAMELEN};

pub const VCR_OP_CONNECT: i32 = 1;
pub const VCR_OP_GETMESSAGE: i32 = 2;
pub const VCR_OP_SENDMESSAGE: i32 = 3;
pub const VCR_OP_CANSENDMESSAGE: i32 = 4;
pub const VCR_MAX_MESSAGE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VcrRecord {
    pub time: f64,
    pub op: i32,
    pub session: i64,
}

impl VcrRecord {
    pub const SIZE: usize = 20;

    /// Read a header. A clean or partial end of file yields `None`.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Option<Self>> {
        let mut buf = [0u8; Self::SIZE];
        let mut filled = 0;
        while filled < Self::SIZE {
            match r.read(&mut buf[filled..]) {
                Ok(0) => return Ok(None),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        let mut time = [0u8; 8];
        let mut op = [0u8; 4];
        let mut session = [0u8; 8];
        time.copy_from_slice(&buf[0..8]);
        op.copy_from_slice(&buf[8..12]);
        session.copy_from_slice(&buf[12..20]);
        Ok(Some(Self {
            time: f64::from_le_bytes(time),
            op: i32::from_le_bytes(op),
            session: i64::from_le_bytes(session),
        }))
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.time.to_le_bytes())?;
        w.write_all(&self.op.to_le_bytes())?;
        w.write_all(&self.session.to_le_bytes())
    }
}

fn op_name(op: i32) -> &'static str {
    match op {
        VCR_OP_CONNECT => "connect",
        VCR_OP_GETMESSAGE => "getmessage",
        VCR_OP_SENDMESSAGE => "sendmessage",
        VCR_OP_CANSENDMESSAGE => "cansendmessage",
        _ => "unknown",
    }
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(i32::from_le_bytes(b))
}

// ============================================================
// Playback
// ============================================================

/// Serves every network operation from a recording.
pub struct VcrPlayer<R: Read = BufReader<File>> {
    reader: R,
    next: Option<VcrRecord>,
    host_time: f64,
}

impl VcrPlayer<BufReader<File>> {
    pub fn open(path: &Path) -> QResult<Self> {
        let file = File::open(path)?;
        tracing::info!(path = %path.display(), "VCR playback");
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> VcrPlayer<R> {
    pub fn new(reader: R) -> QResult<Self> {
        let mut player = Self {
            reader,
            next: None,
            host_time: 0.0,
        };
        player.read_next()?;
        Ok(player)
    }

    /// The record the next operation must match.
    pub fn peek(&self) -> Option<&VcrRecord> {
        self.next.as_ref()
    }

    fn read_next(&mut self) -> QResult<()> {
        self.next = VcrRecord::read_from(&mut self.reader)?;
        if let Some(rec) = self.next {
            if rec.op < 1 || rec.op > VCR_MAX_MESSAGE {
                return Err(QError::VcrBadOp(rec.op));
            }
        }
        Ok(())
    }

    /// Check the pending record against the requested operation.
    fn expect(&self, op: i32, session: Option<i64>) -> QResult<VcrRecord> {
        let next = self.next.ok_or(QError::VcrEndOfPlayback)?;
        let session_ok = session.map_or(true, |s| s == next.session);
        if next.time != self.host_time || next.op != op || !session_ok {
            return Err(QError::vcr_mismatch(format!(
                "{} session {} at {:.6}, recorded {} session {} at {:.6}",
                op_name(op),
                session.unwrap_or(0),
                self.host_time,
                op_name(next.op),
                next.session,
                next.time
            )));
        }
        Ok(next)
    }
}

impl<R: Read> NetDriver for VcrPlayer<R> {
    fn name(&self) -> &str {
        "VCR"
    }

    fn frame(&mut self, host_time: f64) {
        self.host_time = host_time;
    }

    fn check_new_connections(&mut self) -> QResult<Option<QSocket>> {
        let rec = self.expect(VCR_OP_CONNECT, None)?;
        if rec.session == 0 {
            self.read_next()?;
            return Ok(None);
        }

        let mut name = [0u8; NET_NAMELEN];
        self.reader.read_exact(&mut name)?;
        let end = name.iter().position(|&b| b == 0).unwrap_or(NET_NAMELEN);
        let address = String::from_utf8_lossy(&name[..end]).into_owned();

        self.read_next()?;
        Ok(Some(QSocket {
            session: rec.session,
            address,
        }))
    }

    fn get_message(&mut self, sock: &QSocket, msg: &mut SizeBuf) -> QResult<i32> {
        self.expect(VCR_OP_GETMESSAGE, Some(sock.session))?;

        let ret = read_i32(&mut self.reader)?;
        if ret > 0 {
            let len = read_i32(&mut self.reader)?;
            if len < 0 || len as usize > NET_MAXMESSAGE {
                return Err(QError::vcr_mismatch(format!("bad message length {}", len)));
            }
            let mut data = vec![0u8; len as usize];
            self.reader.read_exact(&mut data)?;
            msg.fill_from(&data)?;
        }

        self.read_next()?;
        Ok(ret)
    }

    fn send_message(&mut self, sock: &QSocket, _data: &SizeBuf) -> QResult<i32> {
        self.expect(VCR_OP_SENDMESSAGE, Some(sock.session))?;
        let ret = read_i32(&mut self.reader)?;
        self.read_next()?;
        Ok(ret)
    }

    /// Unreliable traffic isn't recorded; it always "succeeds".
    fn send_unreliable_message(&mut self, _sock: &QSocket, _data: &SizeBuf) -> QResult<i32> {
        Ok(1)
    }

    fn can_send_message(&mut self, sock: &QSocket) -> QResult<bool> {
        self.expect(VCR_OP_CANSENDMESSAGE, Some(sock.session))?;
        let ret = read_i32(&mut self.reader)?;
        self.read_next()?;
        Ok(ret != 0)
    }
}

// ============================================================
// Recording
// ============================================================

/// Passes every operation through to a live driver and logs the results.
pub struct VcrRecorder<D: NetDriver, W: Write = BufWriter<File>> {
    inner: D,
    writer: W,
    host_time: f64,
}

impl<D: NetDriver> VcrRecorder<D, BufWriter<File>> {
    pub fn create(inner: D, path: &Path) -> QResult<Self> {
        let file = File::create(path)?;
        tracing::info!(path = %path.display(), driver = inner.name(), "VCR recording");
        Ok(Self::new(inner, BufWriter::new(file)))
    }
}

impl<D: NetDriver, W: Write> VcrRecorder<D, W> {
    pub fn new(inner: D, writer: W) -> Self {
        Self {
            inner,
            writer,
            host_time: 0.0,
        }
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    /// Flush and hand back the driver and the writer.
    pub fn finish(mut self) -> QResult<(D, W)> {
        self.writer.flush()?;
        Ok((self.inner, self.writer))
    }

    fn header(&mut self, op: i32, session: i64) -> io::Result<()> {
        VcrRecord {
            time: self.host_time,
            op,
            session,
        }
        .write_to(&mut self.writer)
    }
}

impl<D: NetDriver, W: Write> NetDriver for VcrRecorder<D, W> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn frame(&mut self, host_time: f64) {
        self.host_time = host_time;
        self.inner.frame(host_time);
    }

    fn check_new_connections(&mut self) -> QResult<Option<QSocket>> {
        let sock = self.inner.check_new_connections()?;
        match sock {
            Some(ref s) => {
                self.header(VCR_OP_CONNECT, s.session)?;
                let mut name = [0u8; NET_NAMELEN];
                let bytes = s.address.as_bytes();
                let len = bytes.len().min(NET_NAMELEN - 1);
                name[..len].copy_from_slice(&bytes[..len]);
                self.writer.write_all(&name)?;
            }
            None => self.header(VCR_OP_CONNECT, 0)?,
        }
        Ok(sock)
    }

    fn get_message(&mut self, sock: &QSocket, msg: &mut SizeBuf) -> QResult<i32> {
        let ret = self.inner.get_message(sock, msg)?;
        self.header(VCR_OP_GETMESSAGE, sock.session)?;
        self.writer.write_all(&ret.to_le_bytes())?;
        if ret > 0 {
            self.writer.write_all(&(msg.cursize as i32).to_le_bytes())?;
            self.writer.write_all(msg.as_slice())?;
        }
        Ok(ret)
    }

    fn send_message(&mut self, sock: &QSocket, data: &SizeBuf) -> QResult<i32> {
        let ret = self.inner.send_message(sock, data)?;
        self.header(VCR_OP_SENDMESSAGE, sock.session)?;
        self.writer.write_all(&ret.to_le_bytes())?;
        Ok(ret)
    }

    fn send_unreliable_message(&mut self, sock: &QSocket, data: &SizeBuf) -> QResult<i32> {
        self.inner.send_unreliable_message(sock, data)
    }

    fn can_send_message(&mut self, sock: &QSocket) -> QResult<bool> {
        let ret = self.inner.can_send_message(sock)?;
        self.header(VCR_OP_CANSENDMESSAGE, sock.session)?;
        self.writer.write_all(&(ret as i32).to_le_bytes())?;
        Ok(ret)
    }

    fn close(&mut self, sock: &QSocket) {
        self.inner.close(sock);
    }

    fn shutdown(&mut self) -> QResult<()> {
        self.writer.flush()?;
        self.inner.shutdown()
    }
}

// ============================================================
// Tests
// ============================================================
