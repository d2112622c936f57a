// cl_main.rs -- client main loop
//
// `Client` owns every table the command system works on (command buffer,
// cvars, aliases) together with the connection and demo state, and is the
// `CmdHost` all handlers receive.

use std::fs::File;
use std::io::{BufWriter, Write};

use qcore_common::cmd::{cbuf_execute, cmd_init, cmd_register, native, CmdContext, CmdHost, CmdSource};
use qcore_common::common::{msg_write_byte, ComArgs, Console};
use qcore_common::cvar::{cvar_register, CvarContext, CvarFlags};
use qcore_common::error::QResult;
use qcore_common::files::FsContext;
use qcore_common::net::{NetDriver, MSG_RELIABLE, MSG_UNRELIABLE};
use qcore_common::qcommon::{
    SizeBuf, CLC_DISCONNECT, CLC_STRINGCMD, CONFIG_FILE, NET_MAXMESSAGE, SVC_NOP,
};

use crate::cl_demo;
use crate::cl_parse::cl_parse_server_message;
use crate::client::{ClientState, ClientStatic, ConnState};

pub struct Client {
    pub cmd: CmdContext<Client>,
    pub cvars: CvarContext,
    pub con: Console,
    pub fs: FsContext,

    pub cls: ClientStatic,
    pub cl: ClientState,

    /// Last message received from the server or read from a demo.
    pub net_message: SizeBuf,
    pub net: Option<Box<dyn NetDriver>>,

    pub host_framecount: i32,
    pub realtime: f64,
    /// Set by `quit`; the frame driver stops after the current frame.
    pub quit: bool,
}

impl CmdHost for Client {
    fn cmd(&mut self) -> &mut CmdContext<Self> {
        &mut self.cmd
    }

    fn cvars(&mut self) -> &mut CvarContext {
        &mut self.cvars
    }

    fn console(&self) -> &Console {
        &self.con
    }

    fn load_file(&mut self, name: &str) -> Option<Vec<u8>> {
        self.fs.load_file(name)
    }

    fn forward_to_server(&mut self) -> QResult<()> {
        cl_forward_to_server(self)
    }

    fn forwards_unknown_commands(&self) -> bool {
        self.cls.state == ConnState::Connected && !self.cls.demoplayback()
    }
}

impl Client {
    pub fn new(fs: FsContext, con: Console) -> Self {
        let mut client = Self {
            cmd: CmdContext::new(con.clone()),
            cvars: CvarContext::new(con.clone()),
            con,
            fs,
            cls: ClientStatic::default(),
            cl: ClientState::default(),
            net_message: SizeBuf::new(NET_MAXMESSAGE),
            net: None,
            host_framecount: 0,
            realtime: 0.0,
            quit: false,
        };
        cmd_init(&mut client);
        cl_init(&mut client);
        client
    }

    /// Install the network driver the client talks through.
    pub fn set_net_driver(&mut self, driver: Box<dyn NetDriver>) {
        tracing::info!(driver = driver.name(), "network driver");
        self.net = Some(driver);
    }

    /// Hand the command line to the command system.
    pub fn set_com_args(&mut self, args: ComArgs) {
        self.cmd.cmd_set_com_args(args);
    }
}

/// Register client cvars and commands.
pub fn cl_init(client: &mut Client) {
    cvar_register(client, "_cl_name", "player", CvarFlags::ARCHIVE);

    cmd_register(client, "disconnect", native(cl_disconnect_f));
    cmd_register(client, "quit", native(host_quit_f));
    cmd_register(client, "writeconfig", native(host_writeconfig_f));

    cmd_register(client, "record", native(cl_demo::cl_record_f));
    cmd_register(client, "stop", native(cl_demo::cl_stop_f));
    cmd_register(client, "play", native(cl_demo::cl_play_demo_f));
    cmd_register(client, "timedemo", native(cl_demo::cl_timedemo_f));

    cmd_register(client, "startdemos", native(cl_demo::host_startdemos_f));
    cmd_register(client, "demos", native(cl_demo::host_demos_f));
    cmd_register(client, "stopdemo", native(cl_demo::host_stopdemo_f));
}

// ============================================================
// Host_Frame
// ============================================================

/// Run one frame: advance the clocks, execute queued commands and exchange
/// messages with the server or the demo being played.
pub fn host_frame(client: &mut Client, frametime: f64) -> QResult<()> {
    client.realtime += frametime;
    let realtime = client.realtime;
    if let Some(net) = client.net.as_mut() {
        net.frame(realtime);
    }

    cbuf_execute(client)?;

    if client.cls.state == ConnState::Disconnected {
        cl_check_connection(client)?;
    }

    if client.cls.state == ConnState::Connected {
        cl_send_cmd(client)?;

        client.cl.oldtime = client.cl.time;
        client.cl.time += frametime;
        cl_read_from_server(client)?;
    }

    client.host_framecount += 1;
    Ok(())
}

/// Orderly exit: finish any demo, drop the connection, save the config and
/// release the network driver.
pub fn host_shutdown(client: &mut Client) -> QResult<()> {
    if client.cls.demorecording() {
        cl_demo::cl_stop_recording(client)?;
    }
    cl_disconnect(client)?;
    host_writeconfig(client)?;
    if let Some(net) = client.net.as_mut() {
        net.shutdown()?;
    }
    Ok(())
}

fn host_quit_f(client: &mut Client) -> QResult<()> {
    if client.cmd.cmd_source() != CmdSource::Command {
        return Ok(());
    }
    client.quit = true;
    Ok(())
}

/// Fatal for the current game only: stop the demo loop and drop the
/// connection.
pub fn host_error(client: &mut Client, message: &str) -> QResult<()> {
    client.con.printf(&format!("Host_Error: {}\n", message));
    tracing::warn!(message, "host error");
    client.cls.demonum = -1;
    cl_disconnect(client)
}

/// The server went away or the demo ended: move on to the next demo in the
/// loop, if there is one.
pub fn host_end_game(client: &mut Client, message: &str) -> QResult<()> {
    client.con.dprintf(&format!("Host_EndGame: {}\n", message));
    cl_disconnect(client)?;
    if client.cls.demonum != -1 {
        cl_demo::cl_next_demo(client);
    }
    Ok(())
}

// ============================================================
// Connection
// ============================================================

/// Pick up a connection offered by the driver.
pub fn cl_check_connection(client: &mut Client) -> QResult<()> {
    if client.cls.demoplayback() {
        return Ok(());
    }
    let sock = match client.net.as_mut() {
        Some(net) => net.check_new_connections()?,
        None => return Ok(()),
    };
    if let Some(sock) = sock {
        client.con.dprintf(&format!("CL_EstablishConnection: {}\n", sock.address));
        client.cl.clear();
        client.cls.netcon = Some(sock);
        client.cls.state = ConnState::Connected;
        client.cls.signon = 0;
        client.cls.message.clear();
    }
    Ok(())
}

/// Sends a disconnect message to the server and stops any demo.
pub fn cl_disconnect(client: &mut Client) -> QResult<()> {
    if client.cls.demoplayback() {
        cl_demo::cl_stop_playback(client);
    } else if client.cls.state == ConnState::Connected {
        if client.cls.demorecording() {
            cl_demo::cl_stop_recording(client)?;
        }

        client.con.dprintf("Sending clc_disconnect\n");
        if let (Some(net), Some(sock)) = (client.net.as_mut(), client.cls.netcon.take()) {
            let mut msg = SizeBuf::new(16);
            msg_write_byte(&mut msg, CLC_DISCONNECT as i32)?;
            net.send_unreliable_message(&sock, &msg)?;
            net.close(&sock);
        }
    }

    client.cls.netcon = None;
    client.cls.state = ConnState::Disconnected;
    client.cls.signon = 0;
    Ok(())
}

fn cl_disconnect_f(client: &mut Client) -> QResult<()> {
    cl_disconnect(client)
}

/// Queue the current command line as a string command for the server.
pub fn cl_forward_to_server(client: &mut Client) -> QResult<()> {
    let argv0 = client.cmd.cmd_argv(0).to_string();

    if client.cls.state != ConnState::Connected {
        client
            .con
            .printf(&format!("Can't \"{}\", not connected\n", argv0));
        return Ok(());
    }

    if client.cls.demoplayback() {
        return Ok(()); // not really connected
    }

    let msg = &mut client.cls.message;
    msg_write_byte(msg, CLC_STRINGCMD as i32)?;
    if !argv0.eq_ignore_ascii_case("cmd") {
        msg.print(&argv0)?;
        msg.print(" ")?;
    }
    if client.cmd.cmd_argc() > 1 {
        msg.print(client.cmd.cmd_args())?;
    } else {
        msg.print("\n")?;
    }
    Ok(())
}

/// Flush queued reliable commands to the server.
pub fn cl_send_cmd(client: &mut Client) -> QResult<()> {
    if client.cls.demoplayback() || client.cls.message.is_empty() {
        return Ok(());
    }

    if client.cls.message.overflowed {
        tracing::warn!("cls.message overflowed");
        client.con.printf("CL_SendCmd: message overflowed, dropped\n");
        client.cls.message.clear();
        return Ok(());
    }

    let (net, sock) = match (client.net.as_mut(), client.cls.netcon.as_ref()) {
        (Some(net), Some(sock)) => (net, sock),
        _ => return Ok(()),
    };

    if !net.can_send_message(sock)? {
        client.con.dprintf("CL_WriteToServer: can't send\n");
        return Ok(());
    }

    if net.send_message(sock, &client.cls.message)? == -1 {
        return host_error(client, "CL_WriteToServer: lost server connection");
    }
    client.cls.message.clear();
    Ok(())
}

// ============================================================
// CL_GetMessage
// ============================================================

/// Next message for the parser: from the demo when playing one, else from
/// the network (recording it when a demo is being recorded). Returns 0 when
/// nothing is available this frame.
pub fn cl_get_message(client: &mut Client) -> QResult<i32> {
    if client.cls.demoplayback() {
        return cl_demo::cl_get_demo_message(client);
    }

    let (net, sock) = match (client.net.as_mut(), client.cls.netcon.as_ref()) {
        (Some(net), Some(sock)) => (net, sock),
        _ => return Ok(0),
    };

    let r = loop {
        let r = net.get_message(sock, &mut client.net_message)?;
        if r != MSG_RELIABLE && r != MSG_UNRELIABLE {
            return Ok(r);
        }

        // discard nop keepalive message
        if client.net_message.as_slice() == [SVC_NOP] {
            client.con.printf("<-- server to client keepalive\n");
        } else {
            break r;
        }
    };

    if client.cls.demorecording() {
        cl_demo::cl_write_demo_message(client);
    }

    Ok(r)
}

/// Read and parse everything available this frame.
pub fn cl_read_from_server(client: &mut Client) -> QResult<()> {
    loop {
        let ret = cl_get_message(client)?;
        if ret == -1 {
            return host_error(client, "CL_ReadFromServer: lost server connection");
        }
        if ret == 0 {
            break;
        }

        cl_parse_server_message(client)?;
        if client.cls.state != ConnState::Connected {
            break;
        }
    }
    Ok(())
}

// ============================================================
// Host_WriteConfiguration
// ============================================================

/// Writes key bindings and archived variables to config.cfg.
pub fn host_writeconfig(client: &mut Client) -> QResult<()> {
    let path = client.fs.gamedir_path(CONFIG_FILE);
    let result = FsContext::create_path(&path)
        .and_then(|_| File::create(&path))
        .and_then(|file| {
            let mut f = BufWriter::new(file);
            client.cvars.write_variables(&mut f)?;
            client.cmd.cmd_write_aliases(&mut f)?;
            f.flush()
        });

    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "write config failed");
        client.con.printf(&format!("Couldn't write {}.\n", CONFIG_FILE));
    }
    Ok(())
}

fn host_writeconfig_f(client: &mut Client) -> QResult<()> {
    if client.cmd.cmd_source() != CmdSource::Command {
        return Ok(());
    }
    host_writeconfig(client)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use qcore_common::cmd::cmd_execute_string;
    use qcore_common::net::QSocket;
    use qcore_common::net_loop::LoopbackDriver;
    use qcore_common::qcommon::{SVC_PRINT, SVC_STUFFTEXT};
    use std::path::Path;

    fn client(dir: &Path) -> Client {
        Client::new(FsContext::new(dir), Console::captured())
    }

    fn exec(client: &mut Client, text: &str) {
        cmd_execute_string(client, text, CmdSource::Command).unwrap();
    }

    fn connected(dir: &Path) -> Client {
        let mut c = client(dir);
        let mut drv = LoopbackDriver::new();
        drv.push_connection("server:26000");
        c.set_net_driver(Box::new(drv));
        host_frame(&mut c, 0.1).unwrap();
        assert_eq!(c.cls.state, ConnState::Connected);
        c.con.take_output();
        c
    }

    #[test]
    fn test_forward_not_connected() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        exec(&mut c, "cmd say hi");
        assert_eq!(c.con.take_output(), "Can't \"cmd\", not connected\n");
        exec(&mut c, "say hi");
        assert_eq!(c.con.take_output(), "Unknown command \"say\"\n");
    }

    #[test]
    fn test_forward_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = connected(dir.path());

        exec(&mut c, "say hello there");
        assert_eq!(c.cls.message.as_slice(), b"\x04say hello there\0");

        c.cls.message.clear();
        exec(&mut c, "cmd kill");
        assert_eq!(c.cls.message.as_slice(), b"\x04kill\0");

        c.cls.message.clear();
        exec(&mut c, "spawn");
        assert_eq!(c.cls.message.as_slice(), b"\x04spawn \n\0");

        // +commands are never forwarded
        c.cls.message.clear();
        exec(&mut c, "+attack");
        assert!(c.cls.message.is_empty());
        assert_eq!(c.con.take_output(), "Unknown command \"+attack\"\n");
    }

    #[test]
    fn test_remote_source_not_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = connected(dir.path());
        cmd_execute_string(&mut c, "cmd kill", CmdSource::Client).unwrap();
        assert!(c.cls.message.is_empty());
    }

    #[test]
    fn test_frame_sends_and_receives() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        let mut drv = LoopbackDriver::new();
        let sock: QSocket = drv.push_connection("server:26000");

        let mut msg = vec![SVC_NOP];
        drv.push_message(&sock, MSG_RELIABLE, &msg);
        msg.clear();
        msg.push(SVC_PRINT);
        msg.extend_from_slice(b"welcome\n\0");
        msg.push(SVC_STUFFTEXT);
        msg.extend_from_slice(b"echo stuffed\n\0");
        drv.push_message(&sock, MSG_RELIABLE, &msg);
        c.set_net_driver(Box::new(drv));

        c.cmd.cbuf_add_text("say hi\n");
        host_frame(&mut c, 0.1).unwrap();
        assert_eq!(c.cls.netcon, Some(sock));
        // not connected yet when the buffer ran
        let out = c.con.take_output();
        assert!(out.starts_with("Unknown command \"say\"\n"));
        assert!(out.contains("<-- server to client keepalive\n"));
        assert!(out.contains("welcome\n"));

        c.cmd.cbuf_add_text("say hi\n");
        host_frame(&mut c, 0.1).unwrap();
        assert!(c.con.take_output().contains("stuffed\n"));
        assert!(c.cls.message.is_empty());
        assert_eq!(c.host_framecount, 2);
    }

    #[test]
    fn test_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = connected(dir.path());
        exec(&mut c, "disconnect");
        assert_eq!(c.cls.state, ConnState::Disconnected);
        assert!(c.cls.netcon.is_none());
    }

    #[test]
    fn test_writeconfig() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        exec(&mut c, "_cl_name \"Ranger\"");
        cvar_register(&mut c, "scratch", "1", CvarFlags::empty());
        exec(&mut c, "alias jump \"+jump;wait;-jump\"");
        exec(&mut c, "writeconfig");

        let text = std::fs::read_to_string(c.fs.gamedir_path(CONFIG_FILE)).unwrap();
        assert_eq!(text, "_cl_name \"Ranger\"\nalias jump \"+jump;wait;-jump\"\n");
    }

    #[test]
    fn test_quit_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = connected(dir.path());
        // the map form may start while connected; "map" goes to the server
        exec(&mut c, "record r start");
        assert!(c.cls.demorecording());
        assert_eq!(c.cls.message.as_slice(), b"\x04map start\0");
        c.cmd.cbuf_add_text("quit\n");
        host_frame(&mut c, 0.1).unwrap();
        assert!(c.quit);

        host_shutdown(&mut c).unwrap();
        assert!(!c.cls.demorecording());
        assert_eq!(c.cls.state, ConnState::Disconnected);
        assert!(c.fs.gamedir_path(CONFIG_FILE).is_file());
        let demo = std::fs::read(c.fs.gamedir_path("r.dem")).unwrap();
        assert_eq!(demo.last(), Some(&qcore_common::qcommon::SVC_DISCONNECT));
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = client(dir.path());
        exec(&mut c, "_cl_name Ranger");
        exec(&mut c, "alias hi \"echo hello\"");
        host_writeconfig(&mut c).unwrap();

        let mut fresh = client(dir.path());
        exec(&mut fresh, "exec config.cfg");
        cbuf_execute(&mut fresh).unwrap();
        assert_eq!(fresh.cvars.variable_string("_cl_name"), "Ranger");
        assert_eq!(fresh.cmd.alias_value("hi"), Some("echo hello\n"));
    }
}
