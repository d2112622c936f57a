// cmd.rs -- script command processing
//
// Commands, aliases and cvars share one case-insensitive namespace. Command
// text is queued in the command buffer and executed a line at a time by
// `cbuf_execute`, once per frame; `wait` defers the rest to the next frame.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::common::{ComArgs, Console};
use crate::cvar::CvarContext;
use crate::error::QResult;
use crate::q_shared::{com_parse, MAX_STRING_TOKENS};
use crate::qcommon::{CMD_TEXT_SIZE, MAX_ALIAS_NAME};
use crate::wildcards::wildcardfit;

/// Alias expansions allowed in one `cbuf_execute`.
pub const ALIAS_LOOP_COUNT: i32 = 16;

/// Where a command line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdSource {
    /// Local console, script file or command line.
    Command,
    /// A remote peer; handlers must not trust it.
    Client,
}

pub type CmdFn<H> = Rc<dyn Fn(&mut H) -> QResult<()>>;

pub enum CmdHandler<H> {
    Native(CmdFn<H>),
    /// Sent to the server verbatim as a string command.
    Forward,
}

impl<H> Clone for CmdHandler<H> {
    fn clone(&self) -> Self {
        match self {
            CmdHandler::Native(f) => CmdHandler::Native(Rc::clone(f)),
            CmdHandler::Forward => CmdHandler::Forward,
        }
    }
}

/// Wrap a closure as a native command handler.
pub fn native<H, F>(f: F) -> CmdHandler<H>
where
    F: Fn(&mut H) -> QResult<()> + 'static,
{
    CmdHandler::Native(Rc::new(f))
}

pub struct CmdFunction<H> {
    pub name: String,
    pub handler: CmdHandler<H>,
}

#[derive(Debug, Clone)]
pub struct CmdAlias {
    pub name: String,
    pub value: String,
}

/// Pending command text with a fixed capacity.
#[derive(Debug)]
pub struct CmdTextBuf {
    text: String,
    maxsize: usize,
}

impl CmdTextBuf {
    pub fn new(maxsize: usize) -> Self {
        Self {
            text: String::with_capacity(maxsize),
            maxsize,
        }
    }

    fn fits(&self, extra: usize) -> bool {
        self.text.len() + extra < self.maxsize
    }
}

/// Everything the command system owns: the buffer, the tokenized line, the
/// command and alias tables.
pub struct CmdContext<H> {
    cmd_text: CmdTextBuf,
    pub cmd_wait: bool,
    alias_count: i32,

    cmd_alias: Vec<CmdAlias>,
    cmd_alias_index: HashMap<String, usize>,

    cmd_argv: Vec<String>,
    cmd_args: String,
    cmd_source: CmdSource,

    cmd_functions: Vec<CmdFunction<H>>,
    cmd_functions_index: HashMap<String, usize>,

    com_args: ComArgs,
    con: Console,
}

/// The object that owns a `CmdContext` and the tables commands operate on.
pub trait CmdHost: Sized + 'static {
    fn cmd(&mut self) -> &mut CmdContext<Self>;
    fn cvars(&mut self) -> &mut CvarContext;
    fn console(&self) -> &Console;

    /// Contents of a script file for `exec`.
    fn load_file(&mut self, _name: &str) -> Option<Vec<u8>> {
        None
    }

    /// Send the current command line to the server.
    fn forward_to_server(&mut self) -> QResult<()> {
        let name = self.cmd().cmd_argv(0).to_string();
        self.console()
            .printf(&format!("Can't \"{}\", not connected\n", name));
        Ok(())
    }

    /// Whether a local command nobody recognizes goes to the server instead
    /// of being reported as unknown.
    fn forwards_unknown_commands(&self) -> bool {
        false
    }
}

impl<H> CmdContext<H> {
    pub fn new(con: Console) -> Self {
        Self {
            cmd_text: CmdTextBuf::new(CMD_TEXT_SIZE),
            cmd_wait: false,
            alias_count: 0,
            cmd_alias: Vec::new(),
            cmd_alias_index: HashMap::new(),
            cmd_argv: Vec::new(),
            cmd_args: String::new(),
            cmd_source: CmdSource::Command,
            cmd_functions: Vec::new(),
            cmd_functions_index: HashMap::new(),
            com_args: ComArgs::new(),
            con,
        }
    }

    // ========================================================
    // Command buffer (Cbuf_*)
    // ========================================================

    /// Add command text at the end of the buffer.
    pub fn cbuf_add_text(&mut self, text: &str) {
        if !self.cmd_text.fits(text.len()) {
            self.con.printf("Cbuf_AddText: overflow\n");
            tracing::warn!(len = text.len(), "Cbuf_AddText: overflow");
            return;
        }
        self.cmd_text.text.push_str(text);
    }

    /// Add command text ahead of everything already queued.
    pub fn cbuf_insert_text(&mut self, text: &str) {
        if !self.cmd_text.fits(text.len()) {
            self.con.printf("Cbuf_InsertText: overflow\n");
            tracing::warn!(len = text.len(), "Cbuf_InsertText: overflow");
            return;
        }
        self.cmd_text.text.insert_str(0, text);
    }

    pub fn cbuf_pending(&self) -> &str {
        &self.cmd_text.text
    }

    pub fn cbuf_clear(&mut self) {
        self.cmd_text.text.clear();
    }

    /// Remove and return the next line, split at `\n` or at a `;` outside
    /// quotes.
    pub fn cbuf_next_line(&mut self) -> Option<String> {
        if self.cmd_text.text.is_empty() {
            return None;
        }

        let bytes = self.cmd_text.text.as_bytes();
        let mut quotes = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'"' {
                quotes += 1;
            }
            if quotes & 1 == 0 && bytes[i] == b';' {
                break;
            }
            if bytes[i] == b'\n' {
                break;
            }
            i += 1;
        }

        let line = self.cmd_text.text[..i].to_string();
        if i >= self.cmd_text.text.len() {
            self.cmd_text.text.clear();
        } else {
            self.cmd_text.text.drain(..=i);
        }
        Some(line)
    }

    /// Queue `+set name value` pairs from the command line so they run
    /// before config files. Consumed arguments are blanked.
    pub fn cbuf_add_early_commands(&mut self, args: &mut ComArgs) {
        let mut i = 1;
        while i < args.com_argc() {
            if args.com_argv(i) != "+set" {
                i += 1;
                continue;
            }
            let text = format!("set {} {}\n", args.com_argv(i + 1), args.com_argv(i + 2));
            self.cbuf_add_text(&text);
            for j in i..i + 3 {
                args.com_clear_argv(j);
            }
            i += 3;
        }
    }

    /// Remember the command line for `stuffcmds`.
    pub fn cmd_set_com_args(&mut self, args: ComArgs) {
        self.com_args = args;
    }

    // ========================================================
    // Tokenization
    // ========================================================

    /// Split `text` into argv. `cmd_args` keeps the raw text after argv[0].
    pub fn cmd_tokenize_string(&mut self, text: &str) {
        self.cmd_argv.clear();
        self.cmd_args.clear();

        let mut rest = Some(text);
        while let Some(t) = rest {
            if self.cmd_argv.len() == 1 {
                self.cmd_args = t.trim().to_string();
            }

            let (token, remainder) = com_parse(t);
            if token.is_empty() {
                break;
            }
            if self.cmd_argv.len() < MAX_STRING_TOKENS {
                self.cmd_argv.push(token);
            }
            rest = remainder;
        }
    }

    pub fn cmd_argc(&self) -> usize {
        self.cmd_argv.len()
    }

    /// Argument by index; "" past the end.
    pub fn cmd_argv(&self, arg: usize) -> &str {
        self.cmd_argv.get(arg).map_or("", String::as_str)
    }

    /// Everything after argv[0], untokenized.
    pub fn cmd_args(&self) -> &str {
        &self.cmd_args
    }

    pub fn cmd_source(&self) -> CmdSource {
        self.cmd_source
    }

    // ========================================================
    // Command registration
    // ========================================================

    /// Add a command. Only checks the command and alias tables; use
    /// `cmd_register` to also check cvars.
    pub fn cmd_add_command(&mut self, name: &str, handler: CmdHandler<H>) -> bool {
        let key = name.to_ascii_lowercase();
        if self.cmd_functions_index.contains_key(&key) || self.cmd_alias_index.contains_key(&key) {
            self.con
                .printf(&format!("Cmd_AddCommand: {} already defined\n", name));
            return false;
        }

        self.cmd_functions_index.insert(key, self.cmd_functions.len());
        self.cmd_functions.push(CmdFunction {
            name: name.to_string(),
            handler,
        });
        true
    }

    pub fn cmd_remove_command(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();
        let Some(idx) = self.cmd_functions_index.remove(&key) else {
            self.con
                .printf(&format!("Cmd_RemoveCommand: {} not added\n", name));
            return;
        };
        self.cmd_functions.remove(idx);
        for v in self.cmd_functions_index.values_mut() {
            if *v > idx {
                *v -= 1;
            }
        }
    }

    pub fn cmd_exists(&self, name: &str) -> bool {
        self.cmd_functions_index
            .contains_key(&name.to_ascii_lowercase())
    }

    fn find_handler(&self, name: &str) -> Option<CmdHandler<H>> {
        self.cmd_functions_index
            .get(&name.to_ascii_lowercase())
            .map(|&idx| self.cmd_functions[idx].handler.clone())
    }

    /// Exact command or alias name first, then the first one `partial` prefixes.
    pub fn cmd_complete_command(&self, partial: &str) -> Option<&str> {
        if partial.is_empty() {
            return None;
        }
        let names = || {
            self.cmd_functions
                .iter()
                .map(|c| c.name.as_str())
                .chain(self.cmd_alias.iter().map(|a| a.name.as_str()))
        };
        names()
            .find(|n| n.eq_ignore_ascii_case(partial))
            .or_else(|| {
                let partial = partial.to_ascii_lowercase();
                names().find(|n| n.to_ascii_lowercase().starts_with(&partial))
            })
    }

    pub fn cmd_list(&self, pattern: Option<&str>) -> (usize, usize) {
        let pat = pattern.unwrap_or("*");
        let mut matching = 0;
        for cmd in &self.cmd_functions {
            if wildcardfit(pat, &cmd.name) {
                self.con.printf(&format!("{}\n", cmd.name));
                matching += 1;
            }
        }
        let total = self.cmd_functions.len();
        self.con
            .printf(&format!("{} commands, {} matching\n", total, matching));
        (total, matching)
    }

    // ========================================================
    // Aliases
    // ========================================================

    pub fn alias_exists(&self, name: &str) -> bool {
        self.cmd_alias_index.contains_key(&name.to_ascii_lowercase())
    }

    pub fn alias_value(&self, name: &str) -> Option<&str> {
        self.cmd_alias_index
            .get(&name.to_ascii_lowercase())
            .map(|&idx| self.cmd_alias[idx].value.as_str())
    }

    /// Create or replace an alias.
    fn alias_insert(&mut self, name: &str, value: &str) -> bool {
        if name.len() >= MAX_ALIAS_NAME {
            self.con.printf("Alias name is too long\n");
            return false;
        }
        let key = name.to_ascii_lowercase();
        if self.cmd_functions_index.contains_key(&key) {
            self.con
                .printf(&format!("Can't alias \"{}\", it is a command\n", name));
            return false;
        }

        match self.cmd_alias_index.get(&key) {
            Some(&idx) => self.cmd_alias[idx].value = value.to_string(),
            None => {
                self.cmd_alias_index.insert(key, self.cmd_alias.len());
                self.cmd_alias.push(CmdAlias {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        true
    }

    pub fn cmd_alias_remove(&mut self, name: &str) -> bool {
        let Some(idx) = self.cmd_alias_index.remove(&name.to_ascii_lowercase()) else {
            return false;
        };
        self.cmd_alias.remove(idx);
        for v in self.cmd_alias_index.values_mut() {
            if *v > idx {
                *v -= 1;
            }
        }
        true
    }

    /// Write `alias` lines that recreate every alias.
    pub fn cmd_write_aliases(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        for alias in &self.cmd_alias {
            writeln!(writer, "alias {} \"{}\"", alias.name, alias.value.trim_end())?;
        }
        Ok(())
    }

    pub fn cmd_alias_list(&self, pattern: Option<&str>) -> (usize, usize) {
        let pat = pattern.unwrap_or("*");
        let mut matching = 0;
        for alias in &self.cmd_alias {
            if wildcardfit(pat, &alias.name) {
                self.con
                    .printf(&format!("{} : {}\n", alias.name, alias.value.trim_end()));
                matching += 1;
            }
        }
        let total = self.cmd_alias.len();
        self.con
            .printf(&format!("{} aliases, {} matching\n", total, matching));
        (total, matching)
    }
}

// ============================================================
// Dispatch
// ============================================================

/// Add a command, refusing names already used by a cvar, command or alias.
pub fn cmd_register<H: CmdHost>(host: &mut H, name: &str, handler: CmdHandler<H>) -> bool {
    if host.cvars().exists(name) {
        host.console()
            .printf(&format!("Cmd_AddCommand: {} already defined as a var\n", name));
        return false;
    }
    host.cmd().cmd_add_command(name, handler)
}

/// Add or replace an alias, refusing names taken by a cvar or command.
pub fn cmd_alias_set<H: CmdHost>(host: &mut H, name: &str, value: &str) -> bool {
    if host.cvars().exists(name) {
        host.console()
            .printf(&format!("Can't alias \"{}\", it is a variable\n", name));
        return false;
    }
    host.cmd().alias_insert(name, value)
}

/// Tokenize and run one line: command, then alias, then cvar, then the
/// unknown command fallback. Only fatal conditions come back as `Err`.
pub fn cmd_execute_string<H: CmdHost>(host: &mut H, text: &str, src: CmdSource) -> QResult<()> {
    let cmd = host.cmd();
    cmd.cmd_source = src;
    cmd.cmd_tokenize_string(text);
    if cmd.cmd_argc() == 0 {
        return Ok(());
    }
    let name = cmd.cmd_argv(0).to_string();

    if let Some(handler) = cmd.find_handler(&name) {
        return match handler {
            CmdHandler::Native(f) => f(host),
            CmdHandler::Forward => cmd_forward_to_server(host),
        };
    }

    if let Some(value) = cmd.alias_value(&name) {
        let mut text = value.to_string();
        cmd.alias_count += 1;
        if cmd.alias_count >= ALIAS_LOOP_COUNT {
            cmd.con.printf("ALIAS_LOOP_COUNT\n");
            return Ok(());
        }
        if !text.ends_with('\n') {
            text.push('\n');
        }
        cmd.cbuf_insert_text(&text);
        return Ok(());
    }

    let argc = cmd.cmd_argc();
    let argv1 = cmd.cmd_argv(1).to_string();
    if host.cvars().command(&name, argc, &argv1) {
        return Ok(());
    }

    if src == CmdSource::Command
        && host.forwards_unknown_commands()
        && !name.starts_with(['+', '-'])
    {
        return host.forward_to_server();
    }

    host.console()
        .printf(&format!("Unknown command \"{}\"\n", name));
    Ok(())
}

/// Forward the current line to the server; ignored for remote sources.
pub fn cmd_forward_to_server<H: CmdHost>(host: &mut H) -> QResult<()> {
    if host.cmd().cmd_source() != CmdSource::Command {
        return Ok(());
    }
    host.forward_to_server()
}

/// Run queued lines until the buffer is empty or `wait` defers the rest.
pub fn cbuf_execute<H: CmdHost>(host: &mut H) -> QResult<()> {
    host.cmd().alias_count = 0;

    while let Some(line) = host.cmd().cbuf_next_line() {
        if line.trim().is_empty() {
            continue;
        }
        cmd_execute_string(host, &line, CmdSource::Command)?;

        if host.cmd().cmd_wait {
            host.cmd().cmd_wait = false;
            break;
        }
    }
    Ok(())
}

// ============================================================
// Built-in commands
// ============================================================

fn cmd_wait_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    host.cmd().cmd_wait = true;
    Ok(())
}

fn cmd_echo_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    let cmd = host.cmd();
    let line = (1..cmd.cmd_argc())
        .map(|i| cmd.cmd_argv(i))
        .collect::<Vec<_>>()
        .join(" ");
    host.console().printf(&format!("{}\n", line));
    Ok(())
}

fn cmd_exec_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    if host.cmd().cmd_argc() != 2 {
        host.console()
            .printf("exec <filename> : execute a script file\n");
        return Ok(());
    }

    let filename = host.cmd().cmd_argv(1).to_string();
    match host.load_file(&filename) {
        Some(data) => {
            host.console().printf(&format!("execing {}\n", filename));
            let mut text = String::from_utf8_lossy(&data).into_owned();
            text.push('\n');
            host.cmd().cbuf_insert_text(&text);
        }
        None => {
            host.console()
                .printf(&format!("couldn't exec {}\n", filename));
        }
    }
    Ok(())
}

fn cmd_alias_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    let cmd = host.cmd();
    let argc = cmd.cmd_argc();

    if argc == 1 {
        cmd.con.printf("Current alias commands:\n");
        for alias in &cmd.cmd_alias {
            cmd.con
                .printf(&format!("{} : {}", alias.name, alias.value));
        }
        return Ok(());
    }

    let name = cmd.cmd_argv(1).to_string();
    let mut value = (2..argc)
        .map(|i| cmd.cmd_argv(i))
        .collect::<Vec<_>>()
        .join(" ");
    value.push('\n');
    cmd_alias_set(host, &name, &value);
    Ok(())
}

fn cmd_unalias_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    let cmd = host.cmd();
    if cmd.cmd_argc() != 2 {
        cmd.con.printf("unalias <name> : delete an alias\n");
        return Ok(());
    }
    let name = cmd.cmd_argv(1).to_string();
    if !cmd.cmd_alias_remove(&name) {
        cmd.con.printf(&format!("{} is not an alias\n", name));
    }
    Ok(())
}

fn list_pattern<H: CmdHost>(host: &mut H) -> Option<String> {
    let cmd = host.cmd();
    if cmd.cmd_argc() == 2 {
        Some(cmd.cmd_argv(1).to_string())
    } else {
        None
    }
}

fn cmd_list_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    let pattern = list_pattern(host);
    host.cmd().cmd_list(pattern.as_deref());
    Ok(())
}

fn cmd_alias_list_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    let pattern = list_pattern(host);
    host.cmd().cmd_alias_list(pattern.as_deref());
    Ok(())
}

fn cvar_list_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    let pattern = list_pattern(host);
    host.cvars().list(pattern.as_deref());
    Ok(())
}

fn cvar_set_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    let cmd = host.cmd();
    if cmd.cmd_argc() != 3 {
        cmd.con.printf("usage: set <variable> <value>\n");
        return Ok(());
    }
    let name = cmd.cmd_argv(1).to_string();
    let value = cmd.cmd_argv(2).to_string();
    host.cvars().set(&name, &value);
    Ok(())
}

/// Text for the `+cmd args` arguments on the command line, one per line.
/// A `-` argument ends a command unless it looks like a negative number.
pub fn late_commands_text(args: &ComArgs) -> String {
    let mut build = String::new();
    let mut in_cmd = false;

    for i in 1..args.com_argc() {
        let arg = args.com_argv(i);
        let starts_option = arg.starts_with('-')
            && !arg[1..].starts_with(|c: char| c.is_ascii_digit() || c == '.');

        if let Some(cmd) = arg.strip_prefix('+') {
            if in_cmd {
                build.push('\n');
            }
            build.push_str(cmd);
            in_cmd = true;
        } else if starts_option {
            if in_cmd {
                build.push('\n');
            }
            in_cmd = false;
        } else if in_cmd && !arg.is_empty() {
            build.push(' ');
            build.push_str(arg);
        }
    }
    if in_cmd {
        build.push('\n');
    }
    build
}

fn cmd_stuff_cmds_f<H: CmdHost>(host: &mut H) -> QResult<()> {
    let cmd = host.cmd();
    if cmd.cmd_argc() != 1 {
        cmd.con.printf("stuffcmds : execute command line parameters\n");
        return Ok(());
    }
    let text = late_commands_text(&cmd.com_args);
    if !text.is_empty() {
        cmd.cbuf_insert_text(&text);
    }
    Ok(())
}

/// Register the built-in commands.
pub fn cmd_init<H: CmdHost>(host: &mut H) {
    cmd_register(host, "cmdlist", native(cmd_list_f::<H>));
    cmd_register(host, "exec", native(cmd_exec_f::<H>));
    cmd_register(host, "echo", native(cmd_echo_f::<H>));
    cmd_register(host, "alias", native(cmd_alias_f::<H>));
    cmd_register(host, "unalias", native(cmd_unalias_f::<H>));
    cmd_register(host, "aliaslist", native(cmd_alias_list_f::<H>));
    cmd_register(host, "wait", native(cmd_wait_f::<H>));
    cmd_register(host, "stuffcmds", native(cmd_stuff_cmds_f::<H>));
    cmd_register(host, "set", native(cvar_set_f::<H>));
    cmd_register(host, "cvarlist", native(cvar_list_f::<H>));
    cmd_register(host, "cmd", native(cmd_forward_to_server::<H>));
}

// ============================================================
// Tests
// ============================================================
