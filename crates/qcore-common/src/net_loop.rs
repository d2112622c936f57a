// net_loop.rs -- in-process driver
//
// Connections and messages are queued by the owner instead of arriving from
// the wire. Used by the headless host and as the live side of VCR recording.

use std::collections::{HashMap, VecDeque};

use crate::error::QResult;
use crate::net::{NetDriver, QSocket, MSG_NONE};
use crate::qcommon::SizeBuf;

#[derive(Debug, Default)]
pub struct LoopbackDriver {
    next_session: i64,
    pending: VecDeque<QSocket>,
    inbox: HashMap<i64, VecDeque<(i32, Vec<u8>)>>,
    /// Everything sent, reliable or not, in order.
    pub sent: Vec<(i64, Vec<u8>)>,
    /// When false, `can_send_message` reports the channel busy.
    pub ready: bool,
}

impl LoopbackDriver {
    pub fn new() -> Self {
        Self {
            next_session: 1,
            ready: true,
            ..Default::default()
        }
    }

    /// Queue an incoming connection and return the socket it will produce.
    pub fn push_connection(&mut self, address: &str) -> QSocket {
        let sock = QSocket {
            session: self.next_session,
            address: address.to_string(),
        };
        self.next_session += 1;
        self.pending.push_back(sock.clone());
        sock
    }

    /// Queue a message of kind `kind` (`MSG_RELIABLE` or `MSG_UNRELIABLE`).
    pub fn push_message(&mut self, sock: &QSocket, kind: i32, data: &[u8]) {
        self.inbox
            .entry(sock.session)
            .or_default()
            .push_back((kind, data.to_vec()));
    }
}

impl NetDriver for LoopbackDriver {
    fn name(&self) -> &str {
        "Loopback"
    }

    fn check_new_connections(&mut self) -> QResult<Option<QSocket>> {
        let sock = self.pending.pop_front();
        if let Some(sock) = &sock {
            tracing::debug!(session = sock.session, address = %sock.address, "loopback connection");
        }
        Ok(sock)
    }

    fn get_message(&mut self, sock: &QSocket, msg: &mut SizeBuf) -> QResult<i32> {
        let next = self
            .inbox
            .get_mut(&sock.session)
            .and_then(VecDeque::pop_front);
        match next {
            Some((kind, data)) => {
                msg.fill_from(&data)?;
                Ok(kind)
            }
            None => Ok(MSG_NONE),
        }
    }

    fn send_message(&mut self, sock: &QSocket, data: &SizeBuf) -> QResult<i32> {
        if !self.ready {
            return Ok(0);
        }
        self.sent.push((sock.session, data.as_slice().to_vec()));
        Ok(1)
    }

    fn send_unreliable_message(&mut self, sock: &QSocket, data: &SizeBuf) -> QResult<i32> {
        self.sent.push((sock.session, data.as_slice().to_vec()));
        Ok(1)
    }

    fn can_send_message(&mut self, _sock: &QSocket) -> QResult<bool> {
        Ok(self.ready)
    }

    fn close(&mut self, sock: &QSocket) {
        self.inbox.remove(&sock.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::MSG_RELIABLE;
    use crate::qcommon::NET_MAXMESSAGE;

    #[test]
    fn test_connect_and_exchange() {
        let mut drv = LoopbackDriver::new();
        assert!(drv.check_new_connections().unwrap().is_none());

        let sock = drv.push_connection("local:1");
        assert_eq!(drv.check_new_connections().unwrap(), Some(sock.clone()));

        drv.push_message(&sock, MSG_RELIABLE, b"hello");
        let mut msg = SizeBuf::new(NET_MAXMESSAGE);
        assert_eq!(drv.get_message(&sock, &mut msg).unwrap(), MSG_RELIABLE);
        assert_eq!(msg.as_slice(), b"hello");
        assert_eq!(drv.get_message(&sock, &mut msg).unwrap(), MSG_NONE);

        drv.ready = false;
        assert!(!drv.can_send_message(&sock).unwrap());
        assert_eq!(drv.send_message(&sock, &msg).unwrap(), 0);
        drv.ready = true;
        assert_eq!(drv.send_message(&sock, &msg).unwrap(), 1);
        assert_eq!(drv.sent, vec![(sock.session, b"hello".to_vec())]);
    }
}
