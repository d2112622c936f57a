// sys_null.rs -- headless system driver
//
// No window, no sound, no real network: the host runs fixed-length frames
// against the loopback driver or a VCR recording until `quit` or a frame
// limit. Fixed frames keep the virtual clock identical between a recorded
// run and its playback.

use std::path::PathBuf;

use qcore_client::cl_main::{host_frame, host_shutdown, Client};
use qcore_common::cmd::cbuf_execute;
use qcore_common::common::{ComArgs, Console};
use qcore_common::error::QResult;
use qcore_common::files::FsContext;
use qcore_common::net::NetDriver;
use qcore_common::net_loop::LoopbackDriver;
use qcore_common::net_vcr::{VcrPlayer, VcrRecorder};
use qcore_common::q_shared::q_atof;
use qcore_common::qcommon::{CONFIG_FILE, VERSION};

pub const DEFAULT_FRAMETIME: f64 = 0.1;

/// Startup options taken from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct SysOptions {
    pub basedir: PathBuf,
    pub game: Option<String>,
    pub playback: Option<PathBuf>,
    pub record: Option<PathBuf>,
    pub connect: Option<String>,
    pub frames: Option<u64>,
    pub frametime: f64,
}

impl SysOptions {
    pub fn from_args(args: &ComArgs) -> Self {
        let frametime = args
            .com_parm_value("-frametime")
            .map(|v| q_atof(v) as f64)
            .filter(|&t| t > 0.0)
            .unwrap_or(DEFAULT_FRAMETIME);

        Self {
            basedir: PathBuf::from(args.com_parm_value("-basedir").unwrap_or(".")),
            game: args.com_parm_value("-game").map(String::from),
            playback: args.com_parm_value("-playback").map(PathBuf::from),
            record: args.com_parm_value("-record").map(PathBuf::from),
            connect: args.com_parm_value("-connect").map(String::from),
            frames: args
                .com_parm_value("-frames")
                .and_then(|v| v.parse().ok()),
            frametime,
        }
    }
}

/// Pick the network driver: VCR playback replaces the network entirely,
/// otherwise the loopback driver, optionally recorded.
fn net_driver(opts: &SysOptions) -> QResult<Box<dyn NetDriver>> {
    if let Some(path) = &opts.playback {
        return Ok(Box::new(VcrPlayer::open(path)?));
    }

    let mut loopback = LoopbackDriver::new();
    if let Some(address) = &opts.connect {
        loopback.push_connection(address);
    }

    match &opts.record {
        Some(path) => Ok(Box::new(VcrRecorder::create(loopback, path)?)),
        None => Ok(Box::new(loopback)),
    }
}

/// Build the host: file system, command system, network driver, then run
/// `+set` arguments, the config file and the remaining `+cmd` arguments.
pub fn host_init(mut args: ComArgs, con: Console) -> QResult<Client> {
    let opts = SysOptions::from_args(&args);

    let mut fs = FsContext::new(&opts.basedir);
    if let Some(game) = &opts.game {
        fs.add_game_directory(&opts.basedir.join(game));
    }
    tracing::info!(gamedir = %fs.gamedir.display(), "file system");

    let mut client = Client::new(fs, con);
    client.set_net_driver(net_driver(&opts)?);

    client.cmd.cbuf_add_early_commands(&mut args);
    cbuf_execute(&mut client)?;

    if client.fs.find_file(CONFIG_FILE).is_some() {
        client.cmd.cbuf_add_text(&format!("exec {}\n", CONFIG_FILE));
    }
    client.set_com_args(args);
    client.cmd.cbuf_add_text("stuffcmds\n");

    client
        .con
        .printf(&format!("====== qcore {:.2} initialized ======\n", VERSION));
    Ok(client)
}

/// Run frames until `quit`, or until `frames` have run when a limit is
/// given. Returns the number of frames run.
pub fn host_run(client: &mut Client, frames: Option<u64>, frametime: f64) -> QResult<u64> {
    let mut ran = 0;
    while !client.quit && frames.map_or(true, |limit| ran < limit) {
        host_frame(client, frametime)?;
        ran += 1;
    }
    Ok(ran)
}

/// Full headless session. Any `Err` is fatal and ends the process.
pub fn sys_main(args: ComArgs, con: Console) -> QResult<u64> {
    let opts = SysOptions::from_args(&args);
    let mut client = host_init(args, con)?;

    let ran = host_run(&mut client, opts.frames, opts.frametime)?;
    tracing::info!(frames = ran, "host stopped");

    host_shutdown(&mut client)?;
    Ok(ran)
}
