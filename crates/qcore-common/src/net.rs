// net.rs -- the message-exchange primitive the core runs on
//
// Reliability, retransmission and addressing are the driver's business. The
// core only sees sockets identified by a session number and four operations.

use crate::error::QResult;
use crate::qcommon::SizeBuf;

/// `get_message` results.
pub const MSG_NONE: i32 = 0;
pub const MSG_RELIABLE: i32 = 1;
pub const MSG_UNRELIABLE: i32 = 2;
pub const MSG_ERROR: i32 = -1;

/// A connection as seen through a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QSocket {
    /// Driver-assigned identifier, never 0 for a live socket.
    pub session: i64,
    pub address: String,
}

pub trait NetDriver {
    fn name(&self) -> &str;

    /// Called once per host frame with the virtual host time.
    fn frame(&mut self, _host_time: f64) {}

    /// Accept a pending incoming connection, if any.
    fn check_new_connections(&mut self) -> QResult<Option<QSocket>>;

    /// Fill `msg` with the next message for `sock`. Returns one of the
    /// `MSG_*` codes; `msg` is only meaningful for positive results.
    fn get_message(&mut self, sock: &QSocket, msg: &mut SizeBuf) -> QResult<i32>;

    /// Returns 1 if queued, 0 if the driver can't take it now, -1 on error.
    fn send_message(&mut self, sock: &QSocket, data: &SizeBuf) -> QResult<i32>;

    fn send_unreliable_message(&mut self, sock: &QSocket, data: &SizeBuf) -> QResult<i32>;

    fn can_send_message(&mut self, sock: &QSocket) -> QResult<bool>;

    fn close(&mut self, _sock: &QSocket) {}

    /// Release the driver at host shutdown.
    fn shutdown(&mut self) -> QResult<()> {
        Ok(())
    }
}
