// cl_demo.rs -- demo recording and playback
//
// A demo file starts with the forced cd track as a decimal line, then one
// frame per message received from the server:
//
//   i32 length | f32 pitch | f32 yaw | f32 roll | length bytes
//
// all little-endian. Recording stops by appending an svc_disconnect frame so
// playback of a finished demo always ends the game cleanly.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

use qcore_common::cmd::{cmd_execute_string, CmdSource};
use qcore_common::common::msg_write_byte;
use qcore_common::error::{QError, QResult};
use qcore_common::files::FsContext;
use qcore_common::q_shared::{com_default_extension, q_atoi, Vec3};
use qcore_common::qcommon::{
    SizeBuf, DEMO_EXTENSION, MAX_DEMONAME, MAX_DEMOS, MAX_MSGLEN, SIGNONS, SVC_DISCONNECT,
};

use crate::cl_main::{cl_disconnect, Client};
use crate::client::{ConnState, DemoState, TimeDemoSummary};

// ============================================================
// Frame I/O
// ============================================================

fn write_demo_frame<W: Write>(w: &mut W, data: &[u8], angles: &Vec3) -> io::Result<()> {
    w.write_all(&(data.len() as i32).to_le_bytes())?;
    for a in angles {
        w.write_all(&a.to_le_bytes())?;
    }
    w.write_all(data)
}

/// `Ok(false)` on a short read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    match r.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read one frame into `msg`. `None` means the file ran out.
fn read_demo_frame<R: Read>(r: &mut R, msg: &mut SizeBuf) -> QResult<Option<Vec3>> {
    let mut b = [0u8; 4];
    if !read_full(r, &mut b)? {
        return Ok(None);
    }
    let size = i32::from_le_bytes(b);
    if size > MAX_MSGLEN as i32 {
        return Err(QError::DemoMessageTooLong(size));
    }
    if size < 0 {
        return Err(QError::DemoCorrupt(size));
    }

    let mut angles: Vec3 = [0.0; 3];
    for a in angles.iter_mut() {
        if !read_full(r, &mut b)? {
            return Ok(None);
        }
        *a = f32::from_le_bytes(b);
    }

    let mut data = vec![0u8; size as usize];
    if !read_full(r, &mut data)? {
        return Ok(None);
    }
    msg.fill_from(&data)?;
    Ok(Some(angles))
}

/// The forced track line: an optional '-' and digits up to '\n'.
fn read_forcetrack<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut track: i32 = 0;
    let mut neg = false;
    let mut c = [0u8; 1];
    while r.read(&mut c)? == 1 {
        match c[0] {
            b'\n' => break,
            b'-' => neg = true,
            d @ b'0'..=b'9' => track = track.wrapping_mul(10).wrapping_add((d - b'0') as i32),
            _ => {}
        }
    }
    Ok(if neg { track.wrapping_neg() } else { track })
}

fn demo_write_failed(client: &mut Client, e: io::Error) {
    tracing::warn!(error = %e, "demo write failed");
    client
        .con
        .printf(&format!("ERROR: demo write failed ({}), recording stopped\n", e));
    client.cls.demo = DemoState::Idle;
}

// ============================================================
// Recording
// ============================================================

/// Dumps the current net message, prefixed by the length and view angles.
pub fn cl_write_demo_message(client: &mut Client) {
    let DemoState::Recording(ref mut f) = client.cls.demo else {
        return;
    };
    if let Err(e) = write_demo_frame(f, client.net_message.as_slice(), &client.cl.viewangles) {
        demo_write_failed(client, e);
    }
}

/// record <demoname> [<map> [cd track]]
pub fn cl_record_f(client: &mut Client) -> QResult<()> {
    if client.cmd.cmd_source() != CmdSource::Command {
        return Ok(());
    }

    let c = client.cmd.cmd_argc();
    if !(2..=4).contains(&c) {
        client.con.printf("record <demoname> [<map> [cd track]]\n");
        return Ok(());
    }

    let demoname = client.cmd.cmd_argv(1).to_string();
    if demoname.contains("..") {
        client.con.printf("Relative pathnames are not allowed.\n");
        return Ok(());
    }

    if c == 2 && client.cls.state == ConnState::Connected {
        client.con.printf(
            "Can not record - already connected to server\n\
             Client demo recording must be started before connecting\n",
        );
        return Ok(());
    }

    if client.cls.demorecording() {
        client.con.printf("Already recording.\n");
        return Ok(());
    }

    // write the forced cd track number, or -1
    let track = if c == 4 {
        let track = q_atoi(client.cmd.cmd_argv(3));
        client
            .con
            .printf(&format!("Forcing CD track to {}\n", track));
        track
    } else {
        -1
    };

    let mapname = client.cmd.cmd_argv(2).to_string();
    let path = client
        .fs
        .gamedir_path(&com_default_extension(&demoname, DEMO_EXTENSION));

    // start the map up
    if c > 2 {
        cmd_execute_string(client, &format!("map {}", mapname), CmdSource::Command)?;
    }

    // open the demo file
    client
        .con
        .printf(&format!("recording to {}.\n", path.display()));
    let opened = FsContext::create_path(&path)
        .and_then(|_| File::create(&path))
        .map(BufWriter::new)
        .and_then(|mut f| writeln!(f, "{}", track).map(|_| f));

    match opened {
        Ok(f) => {
            tracing::info!(path = %path.display(), track, "demo recording started");
            client.cls.forcetrack = track;
            client.cls.demo = DemoState::Recording(f);
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "couldn't open demo");
            client.con.printf("ERROR: couldn't open.\n");
        }
    }
    Ok(())
}

/// stop recording a demo
pub fn cl_stop_f(client: &mut Client) -> QResult<()> {
    if client.cmd.cmd_source() != CmdSource::Command {
        return Ok(());
    }
    cl_stop_recording(client)
}

/// Finish the demo being recorded with a disconnect frame and close it.
pub fn cl_stop_recording(client: &mut Client) -> QResult<()> {
    let mut f = match std::mem::take(&mut client.cls.demo) {
        DemoState::Recording(f) => f,
        other => {
            client.cls.demo = other;
            client.con.printf("Not recording a demo.\n");
            return Ok(());
        }
    };

    // write a disconnect message to the demo file
    let mut msg = SizeBuf::new(1);
    msg_write_byte(&mut msg, SVC_DISCONNECT as i32)?;
    let written =
        write_demo_frame(&mut f, msg.as_slice(), &client.cl.viewangles).and_then(|_| f.flush());

    // finish up
    drop(f);
    match written {
        Ok(()) => {
            tracing::info!("demo recording completed");
            client.con.printf("Completed demo\n");
        }
        Err(e) => demo_write_failed(client, e),
    }
    Ok(())
}

// ============================================================
// Playback
// ============================================================

/// Open `name` and switch the client to playing it. Returns false if it
/// couldn't be opened.
pub fn cl_play_demo(client: &mut Client, name: &str) -> QResult<bool> {
    // disconnect from server
    cl_disconnect(client)?;

    client
        .con
        .printf(&format!("Playing demo from {}.\n", name));

    let file = match client.fs.find_file(name) {
        Some(path) => match File::open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "couldn't open demo");
                None
            }
        },
        None => None,
    };
    let mut f = match file {
        Some(file) => BufReader::new(file),
        None => {
            client.con.printf("ERROR: couldn't open.\n");
            client.cls.demonum = -1; // stop demo loop
            return Ok(false);
        }
    };

    let forcetrack = read_forcetrack(&mut f)?;
    tracing::info!(name, forcetrack, "demo playback started");

    client.cl.clear();
    client.cls.forcetrack = forcetrack;
    client.cls.demo = DemoState::Playing(f);
    client.cls.state = ConnState::Connected;
    client.cls.signon = 0;
    Ok(true)
}

/// play <demoname>
pub fn cl_play_demo_f(client: &mut Client) -> QResult<()> {
    if client.cmd.cmd_source() != CmdSource::Command {
        return Ok(());
    }
    if client.cmd.cmd_argc() != 2 {
        client.con.printf("play <demoname> : plays a demo\n");
        return Ok(());
    }
    let name = com_default_extension(client.cmd.cmd_argv(1), DEMO_EXTENSION);
    cl_play_demo(client, &name)?;
    Ok(())
}

/// timedemo <demoname>
pub fn cl_timedemo_f(client: &mut Client) -> QResult<()> {
    if client.cmd.cmd_source() != CmdSource::Command {
        return Ok(());
    }
    if client.cmd.cmd_argc() != 2 {
        client.con.printf("timedemo <demoname> : gets demo speeds\n");
        return Ok(());
    }
    let name = com_default_extension(client.cmd.cmd_argv(1), DEMO_EXTENSION);
    if !cl_play_demo(client, &name)? {
        return Ok(());
    }

    // td_starttime will be grabbed at the second frame of the demo, so
    // all the loading time doesn't get counted
    client.cls.timedemo = true;
    client.cls.td_startframe = client.host_framecount;
    client.cls.td_starttime = client.realtime;
    client.cls.td_lastframe = -1; // get a new message this frame
    Ok(())
}

/// Next demo frame, or 0 when it isn't time for one yet. Until the client
/// is fully signed on every call returns a frame.
pub fn cl_get_demo_message(client: &mut Client) -> QResult<i32> {
    let cls = &mut client.cls;

    // decide if it is time to grab the next message
    if cls.signon == SIGNONS {
        if cls.timedemo {
            if client.host_framecount == cls.td_lastframe {
                return Ok(0); // already read this frame's message
            }
            cls.td_lastframe = client.host_framecount;
            // if this is the second frame, grab the real td_starttime
            // so the bogus time on the first frame doesn't count
            if client.host_framecount == cls.td_startframe + 1 {
                cls.td_starttime = client.realtime;
            }
        } else if client.cl.time <= client.cl.mtime[0] {
            return Ok(0); // don't need another message yet
        }
    }

    let DemoState::Playing(ref mut f) = cls.demo else {
        return Ok(0);
    };

    match read_demo_frame(f, &mut client.net_message)? {
        Some(angles) => {
            client.cl.mviewangles[1] = client.cl.mviewangles[0];
            client.cl.mviewangles[0] = angles;
            Ok(1)
        }
        None => {
            cl_stop_playback(client);
            Ok(0)
        }
    }
}

/// Called when a demo file runs out, or the user starts a game.
pub fn cl_stop_playback(client: &mut Client) {
    if !client.cls.demoplayback() {
        return;
    }

    client.cls.demo = DemoState::Idle;
    client.cls.state = ConnState::Disconnected;
    tracing::info!("demo playback stopped");

    if client.cls.timedemo {
        cl_finish_timedemo(client);
    }
}

pub fn cl_finish_timedemo(client: &mut Client) {
    client.cls.timedemo = false;

    // the first frame didn't count
    let frames = (client.host_framecount - client.cls.td_startframe - 1).max(0);
    let mut time = client.realtime - client.cls.td_starttime;
    if time.abs() < 0.001 {
        time = 1.0;
    }
    let fps = frames as f64 / time;

    client.con.printf(&format!(
        "{} frames {:.5} seconds {:.2} fps\n",
        frames, time, fps
    ));
    tracing::info!(frames, seconds = time, fps, "timedemo finished");
    client.cls.timedemo_result = Some(TimeDemoSummary {
        frames,
        seconds: time,
        fps,
    });
}

// ============================================================
// Demo loop
// ============================================================

/// Queue the next demo in the loop.
pub fn cl_next_demo(client: &mut Client) {
    if client.cls.demonum == -1 {
        return; // don't play demos
    }

    if client.cls.demonum as usize >= client.cls.demos.len() {
        client.cls.demonum = 0;
        if client.cls.demos.is_empty() {
            client.con.printf("No demos listed with startdemos\n");
            client.cls.demonum = -1;
            return;
        }
    }

    let text = format!("play {}\n", client.cls.demos[client.cls.demonum as usize]);
    client.cmd.cbuf_insert_text(&text);
    client.cls.demonum += 1;
}

/// startdemos <demo1> [demo2 ...]
pub fn host_startdemos_f(client: &mut Client) -> QResult<()> {
    let mut c = client.cmd.cmd_argc().saturating_sub(1);
    if c > MAX_DEMOS {
        client
            .con
            .printf(&format!("Max {} demos in demoloop\n", MAX_DEMOS));
        c = MAX_DEMOS;
    }
    client.con.printf(&format!("{} demo(s) in loop\n", c));

    client.cls.demos = (1..=c)
        .map(|i| client.cmd.cmd_argv(i).chars().take(MAX_DEMONAME - 1).collect())
        .collect();

    if client.cls.demonum != -1 && !client.cls.demoplayback() {
        client.cls.demonum = 0;
        cl_next_demo(client);
    } else {
        client.cls.demonum = -1;
    }
    Ok(())
}

/// Return to looping demos.
pub fn host_demos_f(client: &mut Client) -> QResult<()> {
    if client.cls.demonum == -1 {
        client.cls.demonum = 1;
    }
    cl_disconnect(client)?;
    cl_next_demo(client);
    Ok(())
}

/// Stop the current demo; the loop position is kept.
pub fn host_stopdemo_f(client: &mut Client) -> QResult<()> {
    if !client.cls.demoplayback() {
        return Ok(());
    }
    cl_stop_playback(client);
    cl_disconnect(client)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cl_main::{cl_get_message, host_frame};
    use qcore_common::common::Console;
    use qcore_common::qcommon::{SVC_NOP, SVC_SIGNONNUM, SVC_TIME};
    use std::path::Path;

    fn client(dir: &Path) -> Client {
        Client::new(FsContext::new(dir), Console::captured())
    }

    fn exec(client: &mut Client, text: &str) {
        cmd_execute_string(client, text, CmdSource::Command).unwrap();
    }

    /// Record `frames` (payload, angles) into `<name>.dem`.
    fn record(client: &mut Client, name: &str, frames: &[(Vec<u8>, Vec3)]) {
        exec(client, &format!("record {}", name));
        assert!(client.cls.demorecording());
        for (payload, angles) in frames {
            client.net_message.fill_from(payload).unwrap();
            client.cl.viewangles = *angles;
            cl_write_demo_message(client);
        }
        exec(client, "stop");
        client.con.take_output();
    }

    fn write_raw(client: &Client, name: &str, bytes: &[u8]) {
        let path = client.fs.gamedir_path(name);
        FsContext::create_path(&path).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn frame_header(len: i32) -> Vec<u8> {
        let mut v = len.to_le_bytes().to_vec();
        for a in [0.0f32, 90.0, 0.0] {
            v.extend_from_slice(&a.to_le_bytes());
        }
        v
    }

    #[test]
    fn test_demo_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());

        let frames: Vec<(Vec<u8>, Vec3)> = (0..5)
            .map(|i| {
                let payload: Vec<u8> = (0..=i as u8 * 7).collect();
                (payload, [i as f32 * 1.5, i as f32 * -30.0, 0.25])
            })
            .collect();
        record(&mut c, "rt", &frames);

        let bytes = std::fs::read(c.fs.gamedir_path("rt.dem")).unwrap();
        assert!(bytes.starts_with(b"-1\n"));

        exec(&mut c, "play rt");
        assert_eq!(c.con.take_output(), "Playing demo from rt.dem.\n");
        assert!(c.cls.demoplayback());
        assert_eq!(c.cls.state, ConnState::Connected);
        assert_eq!(c.cls.forcetrack, -1);

        let mut played = Vec::new();
        while cl_get_message(&mut c).unwrap() == 1 {
            played.push((c.net_message.as_slice().to_vec(), c.cl.mviewangles[0]));
        }

        assert_eq!(played.len(), frames.len() + 1);
        assert_eq!(&played[..frames.len()], &frames[..]);
        // stop appended a disconnect
        assert_eq!(played[frames.len()].0, vec![SVC_DISCONNECT]);
        assert_eq!(c.cl.mviewangles[1], frames[4].1);

        assert!(!c.cls.demoplayback());
        assert_eq!(c.cls.state, ConnState::Disconnected);
    }

    #[test]
    fn test_record_argument_checks() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());

        exec(&mut c, "record");
        assert_eq!(c.con.take_output(), "record <demoname> [<map> [cd track]]\n");
        exec(&mut c, "record a b c d");
        assert_eq!(c.con.take_output(), "record <demoname> [<map> [cd track]]\n");

        exec(&mut c, "record ../escape");
        assert_eq!(c.con.take_output(), "Relative pathnames are not allowed.\n");

        c.cls.state = ConnState::Connected;
        exec(&mut c, "record late");
        assert!(c
            .con
            .take_output()
            .starts_with("Can not record - already connected to server\n"));
        c.cls.state = ConnState::Disconnected;

        // remote sources can't record
        cmd_execute_string(&mut c, "record remote", CmdSource::Client).unwrap();
        assert!(!c.cls.demorecording());
        assert!(!c.fs.gamedir_path("remote.dem").exists());
    }

    #[test]
    fn test_record_map_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());

        exec(&mut c, "record m1 start 5");
        let out = c.con.take_output();
        assert!(out.starts_with("Forcing CD track to 5\nUnknown command \"map\"\nrecording to "));
        assert!(out.ends_with("m1.dem.\n"));
        assert_eq!(c.cls.forcetrack, 5);

        exec(&mut c, "record other");
        assert_eq!(c.con.take_output(), "Already recording.\n");

        exec(&mut c, "stop");
        assert_eq!(c.con.take_output(), "Completed demo\n");
        let bytes = std::fs::read(c.fs.gamedir_path("m1.dem")).unwrap();
        assert!(bytes.starts_with(b"5\n"));

        exec(&mut c, "play m1");
        assert_eq!(c.cls.forcetrack, 5);
    }

    #[test]
    fn test_stop_writes_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());

        exec(&mut c, "stop");
        assert_eq!(c.con.take_output(), "Not recording a demo.\n");

        exec(&mut c, "record d.dem");
        c.cl.viewangles = [0.0, 90.0, 0.0];
        exec(&mut c, "stop");
        assert!(!c.cls.demorecording());

        let mut expected = b"-1\n".to_vec();
        expected.extend(frame_header(1));
        expected.push(SVC_DISCONNECT);
        assert_eq!(std::fs::read(c.fs.gamedir_path("d.dem")).unwrap(), expected);
    }

    #[test]
    fn test_play_usage_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());

        exec(&mut c, "play");
        assert_eq!(c.con.take_output(), "play <demoname> : plays a demo\n");
        exec(&mut c, "timedemo");
        assert_eq!(c.con.take_output(), "timedemo <demoname> : gets demo speeds\n");

        exec(&mut c, "play nothere");
        assert_eq!(
            c.con.take_output(),
            "Playing demo from nothere.dem.\nERROR: couldn't open.\n"
        );
        assert_eq!(c.cls.demonum, -1);
        assert!(!c.cls.demoplayback());

        exec(&mut c, "timedemo nothere");
        assert!(!c.cls.timedemo);
    }

    #[test]
    fn test_oversized_message_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        let mut bytes = b"-1\n".to_vec();
        bytes.extend(frame_header(MAX_MSGLEN as i32 + 1));
        write_raw(&c, "big.dem", &bytes);

        exec(&mut c, "play big");
        match cl_get_message(&mut c) {
            Err(QError::DemoMessageTooLong(n)) => assert_eq!(n, MAX_MSGLEN as i32 + 1),
            other => panic!("expected fatal error, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_length_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        let mut bytes = b"-1\n".to_vec();
        bytes.extend(frame_header(-5));
        write_raw(&c, "neg.dem", &bytes);

        exec(&mut c, "play neg");
        assert!(matches!(cl_get_message(&mut c), Err(QError::DemoCorrupt(-5))));
    }

    #[test]
    fn test_truncated_demo_ends_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        let mut bytes = b"12\n".to_vec();
        bytes.extend(frame_header(2));
        bytes.extend([SVC_NOP, SVC_NOP]);
        bytes.extend(frame_header(10));
        bytes.extend([1, 2, 3]);
        write_raw(&c, "cut.dem", &bytes);

        exec(&mut c, "play cut");
        assert_eq!(c.cls.forcetrack, 12);
        assert_eq!(cl_get_message(&mut c).unwrap(), 1);
        assert_eq!(c.net_message.as_slice(), &[SVC_NOP, SVC_NOP]);
        assert_eq!(cl_get_message(&mut c).unwrap(), 0);
        assert!(!c.cls.demoplayback());
        assert_eq!(c.cls.state, ConnState::Disconnected);
    }

    #[test]
    fn test_forcetrack_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        let mut bytes = b"-2147483648\n".to_vec();
        bytes.extend(frame_header(1));
        bytes.push(SVC_NOP);
        write_raw(&c, "min.dem", &bytes);

        exec(&mut c, "play min");
        assert!(c.cls.demoplayback());
        assert_eq!(c.cls.forcetrack, i32::MIN);
        assert_eq!(cl_get_message(&mut c).unwrap(), 1);
    }

    #[test]
    fn test_timedemo_of_empty_demo() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        write_raw(&c, "empty.dem", b"0\n");

        // left over from an earlier run
        c.cls.td_starttime = 1.0;
        c.realtime = 5.0;
        exec(&mut c, "timedemo empty");
        assert_eq!(cl_get_message(&mut c).unwrap(), 0);

        assert!(!c.cls.demoplayback());
        assert_eq!(
            c.cls.timedemo_result,
            Some(TimeDemoSummary {
                frames: 0,
                seconds: 1.0,
                fps: 0.0
            })
        );
    }

    #[test]
    fn test_timedemo_meters_one_message_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());

        let mut frames = vec![(vec![SVC_SIGNONNUM, SIGNONS as u8], [0.0; 3])];
        frames.extend((0..5).map(|_| (vec![SVC_NOP], [0.0; 3])));
        record(&mut c, "td", &frames);

        c.cmd.cbuf_add_text("timedemo td\n");
        let mut ran = 0;
        while ran < 20 {
            host_frame(&mut c, 0.125).unwrap();
            ran += 1;
            if !c.cls.demoplayback() {
                break;
            }
        }

        // signon frame plus one message on each of the six frames
        assert_eq!(ran, 6);
        assert!(!c.cls.timedemo);
        assert_eq!(
            c.cls.timedemo_result,
            Some(TimeDemoSummary {
                frames: 4,
                seconds: 0.5,
                fps: 8.0
            })
        );
        let out = c.con.take_output();
        assert!(out.contains("4 frames 0.50000 seconds 8.00 fps\n"));
    }

    #[test]
    fn test_playback_paced_by_server_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());

        let time_msg = |t: f32| {
            let mut m = vec![SVC_TIME];
            m.extend_from_slice(&t.to_le_bytes());
            (m, [0.0; 3])
        };
        let frames = vec![
            (vec![SVC_SIGNONNUM, SIGNONS as u8], [0.0; 3]),
            time_msg(1.0),
            time_msg(2.0),
        ];
        record(&mut c, "paced", &frames);

        c.cmd.cbuf_add_text("play paced\n");
        host_frame(&mut c, 0.5).unwrap();
        assert_eq!(c.cls.signon, SIGNONS);
        assert_eq!(c.cl.mtime[0], 1.0);

        // cl.time == mtime: nothing new
        host_frame(&mut c, 0.5).unwrap();
        assert_eq!(c.cl.mtime[0], 1.0);

        host_frame(&mut c, 0.5).unwrap();
        assert_eq!(c.cl.mtime, [2.0, 1.0]);
        assert!(c.cls.demoplayback());
    }

    #[test]
    fn test_demo_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());

        exec(&mut c, "startdemos a b");
        assert_eq!(c.con.take_output(), "2 demo(s) in loop\n");
        assert_eq!(c.cmd.cbuf_pending(), "play a\n");
        assert_eq!(c.cls.demonum, 1);

        c.cmd.cbuf_clear();
        cl_next_demo(&mut c);
        assert_eq!(c.cmd.cbuf_pending(), "play b\n");
        c.cmd.cbuf_clear();
        cl_next_demo(&mut c);
        assert_eq!(c.cmd.cbuf_pending(), "play a\n");
        c.cmd.cbuf_clear();

        // stopdemo does nothing when no demo is playing
        exec(&mut c, "stopdemo");
        assert_eq!(c.cls.demonum, 1);

        c.cls.demonum = -1;
        exec(&mut c, "demos");
        assert_eq!(c.cmd.cbuf_pending(), "play b\n");
        assert_eq!(c.cls.demonum, 2);
    }

    #[test]
    fn test_startdemos_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        exec(&mut c, "startdemos 1 2 3 4 5 6 7 8 9 averyveryverylongdemoname");
        assert_eq!(
            c.con.take_output(),
            "Max 8 demos in demoloop\n8 demo(s) in loop\n"
        );
        assert_eq!(c.cls.demos.len(), MAX_DEMOS);

        let mut c = client(dir.path());
        exec(&mut c, "startdemos averyveryverylongdemoname");
        assert_eq!(c.cls.demos[0], "averyveryverylo");
    }

    #[test]
    fn test_loop_plays_demos_in_turn() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        record(&mut c, "one", &[]);
        record(&mut c, "two", &[]);

        c.cmd.cbuf_add_text("startdemos one two\n");
        // each demo is a single disconnect frame, so one demo per frame
        for _ in 0..3 {
            host_frame(&mut c, 0.1).unwrap();
        }
        let out = c.con.take_output();
        let played: Vec<&str> = out
            .lines()
            .filter(|l| l.starts_with("Playing demo from"))
            .collect();
        assert_eq!(
            played,
            vec![
                "Playing demo from one.dem.",
                "Playing demo from two.dem.",
                "Playing demo from one.dem.",
            ]
        );
    }

    #[test]
    fn test_stopdemo_stops_playback() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        record(&mut c, "s", &[(vec![SVC_NOP], [0.0; 3])]);

        exec(&mut c, "play s");
        assert!(c.cls.demoplayback());
        exec(&mut c, "stopdemo");
        assert!(!c.cls.demoplayback());
        assert_eq!(c.cls.state, ConnState::Disconnected);
    }
}
