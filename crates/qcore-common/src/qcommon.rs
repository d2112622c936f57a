// qcommon.rs -- definitions shared by the client, the drivers and the tools

// ============================================================
// Version / paths
// ============================================================

pub const VERSION: f32 = 1.09;
pub const BASEDIRNAME: &str = "base";
pub const CONFIG_FILE: &str = "config.cfg";
pub const DEMO_EXTENSION: &str = ".dem";

// ============================================================
// SizeBuf -- fixed capacity message buffer
// ============================================================

/// Byte buffer with a fixed capacity and an explicit overflow policy.
///
/// Writes go through `get_space` (see `common.rs`). Exceeding `maxsize` is an
/// error unless `allow_overflow` is set, in which case the buffer is emptied
/// and `overflowed` is raised for the owner to check.
#[derive(Debug, Clone, Default)]
pub struct SizeBuf {
    pub allow_overflow: bool,
    pub overflowed: bool,
    pub data: Vec<u8>,
    pub maxsize: usize,
    pub cursize: usize,
}

/// Snapshot of a `SizeBuf` taken with `save_state`.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeBufState {
    pub data: Vec<u8>,
    pub overflowed: bool,
}

impl SizeBuf {
    pub fn new(maxsize: usize) -> Self {
        Self {
            allow_overflow: false,
            overflowed: false,
            data: vec![0u8; maxsize],
            maxsize,
            cursize: 0,
        }
    }

    /// A buffer that resets instead of failing when it fills up.
    pub fn new_overflowable(maxsize: usize) -> Self {
        Self {
            allow_overflow: true,
            ..Self::new(maxsize)
        }
    }

    pub fn clear(&mut self) {
        self.cursize = 0;
        self.overflowed = false;
    }

    /// The bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.cursize]
    }

    pub fn is_empty(&self) -> bool {
        self.cursize == 0
    }

    pub fn free_space(&self) -> usize {
        self.maxsize - self.cursize
    }
}

// ============================================================
// Protocol
// ============================================================

pub const PROTOCOL_VERSION: i32 = 15;

/// Largest message a demo frame or a reliable network message may carry.
pub const MAX_MSGLEN: usize = 8000;
/// Largest unreliable datagram.
pub const MAX_DATAGRAM: usize = 1024;
/// Capacity of the network receive buffer.
pub const NET_MAXMESSAGE: usize = 8192;
pub const NET_NAMELEN: usize = 64;

/// Number of signon messages a client must process before it is in game.
pub const SIGNONS: i32 = 4;

// server to client
pub const SVC_BAD: u8 = 0;
pub const SVC_NOP: u8 = 1;
pub const SVC_DISCONNECT: u8 = 2;
pub const SVC_TIME: u8 = 7;
pub const SVC_PRINT: u8 = 8;
pub const SVC_STUFFTEXT: u8 = 9;
pub const SVC_SIGNONNUM: u8 = 25;

// client to server
pub const CLC_BAD: u8 = 0;
pub const CLC_NOP: u8 = 1;
pub const CLC_DISCONNECT: u8 = 2;
pub const CLC_MOVE: u8 = 3;
pub const CLC_STRINGCMD: u8 = 4;

// ============================================================
// Command buffer
// ============================================================

/// Fixed capacity of the pending command text.
pub const CMD_TEXT_SIZE: usize = 8192;
pub const MAX_ALIAS_NAME: usize = 32;

// ============================================================
// Demo loop
// ============================================================

pub const MAX_DEMOS: usize = 8;
pub const MAX_DEMONAME: usize = 16;
