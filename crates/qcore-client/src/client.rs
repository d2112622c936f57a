// client.rs -- client state types
//
// ClientStatic survives server connections (it owns the demo session);
// ClientState is cleared every time a new connection or demo starts.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use qcore_common::net::QSocket;
use qcore_common::q_shared::Vec3;
use qcore_common::qcommon::{SizeBuf, MAX_MSGLEN};

// ============================================================
// connstate_t
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ConnState {
    #[default]
    Disconnected, // not talking to a server
    Connected,    // valid netcon or demo playback, talking to a server
}

// ============================================================
// Demo session
// ============================================================

/// What the demo layer is doing. The open file lives in the variant so a
/// handle can't outlast the state it belongs to.
#[derive(Debug, Default)]
pub enum DemoState {
    #[default]
    Idle,
    Recording(BufWriter<File>),
    Playing(BufReader<File>),
}

impl DemoState {
    pub fn is_recording(&self) -> bool {
        matches!(self, DemoState::Recording(_))
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, DemoState::Playing(_))
    }
}

/// Result of the last finished timedemo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeDemoSummary {
    pub frames: i32,
    pub seconds: f64,
    pub fps: f64,
}

// ============================================================
// client_static_t -- persistent through server connections
// ============================================================

pub struct ClientStatic {
    pub state: ConnState,

    // personalization data sent to server
    pub signon: i32, // 0 to SIGNONS

    /// Reliable text commands waiting to go to the server.
    pub message: SizeBuf,
    pub netcon: Option<QSocket>,

    // demo recording info must be here, because record is started before
    // entering a map (and clearing client_state_t)
    pub demo: DemoState,
    pub forcetrack: i32, // -1 = use normal cd track

    pub timedemo: bool,
    pub td_lastframe: i32,  // to meter out one message a frame
    pub td_startframe: i32, // host_framecount at start
    pub td_starttime: f64,  // realtime at second frame of timedemo
    pub timedemo_result: Option<TimeDemoSummary>,

    // demo loop control
    pub demonum: i32, // -1 = don't play demos
    pub demos: Vec<String>,
}

impl Default for ClientStatic {
    fn default() -> Self {
        Self {
            state: ConnState::Disconnected,
            signon: 0,
            message: SizeBuf::new_overflowable(MAX_MSGLEN),
            netcon: None,
            demo: DemoState::Idle,
            forcetrack: -1,
            timedemo: false,
            td_lastframe: -1,
            td_startframe: 0,
            td_starttime: 0.0,
            timedemo_result: None,
            demonum: 0,
            demos: Vec::new(),
        }
    }
}

impl ClientStatic {
    pub fn demoplayback(&self) -> bool {
        self.demo.is_playing()
    }

    pub fn demorecording(&self) -> bool {
        self.demo.is_recording()
    }
}

// ============================================================
// client_state_t -- wiped completely at every server signon
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub viewangles: Vec3,
    /// Angles from the last two demo frames, newest first.
    pub mviewangles: [Vec3; 2],

    /// Server times of the last two messages, newest first.
    pub mtime: [f64; 2],
    pub time: f64, // clients view of time, should be between mtime[1] and mtime[0]
    pub oldtime: f64,
}

impl ClientState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cls = ClientStatic::default();
        assert_eq!(cls.state, ConnState::Disconnected);
        assert_eq!(cls.forcetrack, -1);
        assert!(!cls.demoplayback() && !cls.demorecording());
        assert!(cls.message.allow_overflow);
        assert_eq!(cls.message.maxsize, MAX_MSGLEN);
    }

    #[test]
    fn test_demo_state_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.dem");
        let file = File::create(&path).unwrap();
        let rec = DemoState::Recording(BufWriter::new(file));
        assert!(rec.is_recording() && !rec.is_playing());

        let play = DemoState::Playing(BufReader::new(File::open(&path).unwrap()));
        assert!(play.is_playing() && !play.is_recording());
    }
}
