// cvar.rs -- dynamic variable tracking

use std::collections::HashMap;
use std::io::Write;

use crate::cmd::CmdHost;
use crate::common::Console;
use crate::q_shared::{format_value, q_atof};
use crate::wildcards::wildcardfit;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CvarFlags: u32 {
        /// Saved to config.cfg by `host_writeconfig`.
        const ARCHIVE = 0x01;
        /// Changes are announced to connected peers.
        const SERVER  = 0x02;
    }
}

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: CvarFlags,
    /// Set on every change, cleared by whoever polls it.
    pub modified: bool,
    pub value: f32,
}

/// Called after a SERVER flagged cvar changes.
pub type CvarNotifyFn = Box<dyn FnMut(&Cvar)>;

/// Flat registry of every cvar, keyed by lowercase name.
pub struct CvarContext {
    cvar_vars: Vec<Cvar>,
    cvar_index: HashMap<String, usize>,
    pub notify: Option<CvarNotifyFn>,
    con: Console,
}

impl CvarContext {
    pub fn new(con: Console) -> Self {
        Self {
            cvar_vars: Vec::new(),
            cvar_index: HashMap::new(),
            notify: None,
            con,
        }
    }

    fn find_var_index(&self, name: &str) -> Option<usize> {
        self.cvar_index.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.find_var_index(name).map(|idx| &self.cvar_vars[idx])
    }

    pub fn exists(&self, name: &str) -> bool {
        self.find_var_index(name).is_some()
    }

    /// Numeric value, 0 if the cvar doesn't exist.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |v| v.value)
    }

    /// String value, "" if the cvar doesn't exist.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |v| v.string.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cvar> {
        self.cvar_vars.iter()
    }

    /// First cvar whose name is `partial`, else the first one it prefixes.
    pub fn complete_variable(&self, partial: &str) -> Option<&str> {
        if partial.is_empty() {
            return None;
        }
        let partial = partial.to_ascii_lowercase();
        self.cvar_vars
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(&partial))
            .or_else(|| {
                self.cvar_vars
                    .iter()
                    .find(|v| v.name.to_ascii_lowercase().starts_with(&partial))
            })
            .map(|v| v.name.as_str())
    }

    /// Add a new cvar. Only checks this registry; `cvar_register` also checks
    /// the command and alias tables.
    pub fn register(&mut self, name: &str, value: &str, flags: CvarFlags) -> bool {
        if self.exists(name) {
            self.con
                .printf(&format!("Can't register variable {}, already defined\n", name));
            return false;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            flags,
            modified: true,
            value: q_atof(value),
        });
        self.cvar_index.insert(name.to_ascii_lowercase(), idx);
        true
    }

    pub fn set(&mut self, name: &str, value: &str) {
        let idx = match self.find_var_index(name) {
            Some(idx) => idx,
            None => {
                self.con
                    .printf(&format!("Cvar_Set: variable {} not found\n", name));
                return;
            }
        };

        let var = &mut self.cvar_vars[idx];
        if var.string == value {
            return;
        }
        var.string = value.to_string();
        var.value = q_atof(value);
        var.modified = true;

        if var.flags.contains(CvarFlags::SERVER) {
            if let Some(mut notify) = self.notify.take() {
                notify(&self.cvar_vars[idx]);
                self.notify = Some(notify);
            }
        }
    }

    pub fn set_value(&mut self, name: &str, value: f32) {
        self.set(name, &format_value(value));
    }

    /// Console shorthand: `name` prints the cvar, `name value` sets it.
    /// Returns false if `argv0` isn't a cvar.
    pub fn command(&mut self, argv0: &str, argc: usize, argv1: &str) -> bool {
        let idx = match self.find_var_index(argv0) {
            Some(idx) => idx,
            None => return false,
        };

        if argc == 1 {
            let var = &self.cvar_vars[idx];
            self.con
                .printf(&format!("\"{}\" is \"{}\"\n", var.name, var.string));
            return true;
        }

        let name = self.cvar_vars[idx].name.clone();
        self.set(&name, argv1);
        true
    }

    /// Write `name "value"` lines for every ARCHIVE cvar.
    pub fn write_variables(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        for var in &self.cvar_vars {
            if var.flags.contains(CvarFlags::ARCHIVE) {
                writeln!(writer, "{} \"{}\"", var.name, var.string)?;
            }
        }
        Ok(())
    }

    pub fn list(&self, pattern: Option<&str>) -> (usize, usize) {
        let wc = pattern.unwrap_or("*");
        let mut matching = 0;

        for var in &self.cvar_vars {
            if !wildcardfit(wc, &var.name) {
                continue;
            }
            matching += 1;
            let archive = if var.flags.contains(CvarFlags::ARCHIVE) { '*' } else { ' ' };
            let server = if var.flags.contains(CvarFlags::SERVER) { 'S' } else { ' ' };
            self.con.printf(&format!(
                "{}{} {} \"{}\"\n",
                archive, server, var.name, var.string
            ));
        }

        let total = self.cvar_vars.len();
        self.con
            .printf(&format!("{} cvars, {} matching\n", total, matching));
        (total, matching)
    }
}

/// Register a cvar, refusing names already taken by a command or an alias.
pub fn cvar_register<H: CmdHost>(host: &mut H, name: &str, value: &str, flags: CvarFlags) -> bool {
    if host.cmd().cmd_exists(name) || host.cmd().alias_exists(name) {
        host.console()
            .printf(&format!("Cvar_RegisterVariable: {} is a command\n", name));
        return false;
    }
    host.cvars().register(name, value, flags)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ctx() -> (CvarContext, Console) {
        let con = Console::captured();
        (CvarContext::new(con.clone()), con)
    }

    #[test]
    fn test_register_and_lookup() {
        let (mut cv, _) = ctx();
        assert!(cv.register("sensitivity", "3.5", CvarFlags::ARCHIVE));
        assert_eq!(cv.variable_value("sensitivity"), 3.5);
        assert_eq!(cv.variable_string("SENSITIVITY"), "3.5");
        assert_eq!(cv.variable_string("missing"), "");
        assert_eq!(cv.variable_value("missing"), 0.0);
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let (mut cv, con) = ctx();
        assert!(cv.register("fov", "90", CvarFlags::empty()));
        assert!(!cv.register("FOV", "100", CvarFlags::empty()));
        assert_eq!(cv.variable_string("fov"), "90");
        assert!(con.take_output().contains("already defined"));
    }

    #[test]
    fn test_set_reparses_value() {
        let (mut cv, _) = ctx();
        cv.register("volume", "0.7", CvarFlags::empty());
        cv.set("volume", "0.25junk");
        assert_eq!(cv.variable_string("volume"), "0.25junk");
        assert_eq!(cv.variable_value("volume"), 0.25);
        cv.set_value("volume", 1.0);
        assert_eq!(cv.variable_string("volume"), "1");
    }

    #[test]
    fn test_set_unknown_reports() {
        let (mut cv, con) = ctx();
        cv.set("nope", "1");
        assert_eq!(con.take_output(), "Cvar_Set: variable nope not found\n");
    }

    #[test]
    fn test_notify_only_on_change_of_server_cvar() {
        let (mut cv, _) = ctx();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        cv.notify = Some(Box::new(move |var: &Cvar| {
            sink.borrow_mut().push(format!("{}={}", var.name, var.string));
        }));
        cv.register("timelimit", "0", CvarFlags::SERVER);
        cv.register("name", "player", CvarFlags::ARCHIVE);

        cv.set("timelimit", "10");
        cv.set("timelimit", "10");
        cv.set("name", "other");
        assert_eq!(*seen.borrow(), vec!["timelimit=10".to_string()]);
    }

    #[test]
    fn test_command_print_and_set() {
        let (mut cv, con) = ctx();
        cv.register("skill", "1", CvarFlags::empty());
        assert!(cv.command("skill", 1, ""));
        assert_eq!(con.take_output(), "\"skill\" is \"1\"\n");
        assert!(cv.command("Skill", 2, "3"));
        assert_eq!(cv.variable_value("skill"), 3.0);
        assert!(!cv.command("notacvar", 1, ""));
    }

    #[test]
    fn test_write_variables_archive_only() {
        let (mut cv, _) = ctx();
        cv.register("name", "player", CvarFlags::ARCHIVE);
        cv.register("developer", "0", CvarFlags::empty());
        let mut out = Vec::new();
        cv.write_variables(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "name \"player\"\n");
    }

    #[test]
    fn test_complete_and_list() {
        let (mut cv, con) = ctx();
        cv.register("cl_forwardspeed", "200", CvarFlags::ARCHIVE);
        cv.register("cl_backspeed", "200", CvarFlags::ARCHIVE);
        cv.register("sv_gravity", "800", CvarFlags::SERVER);
        assert_eq!(cv.complete_variable("cl_f"), Some("cl_forwardspeed"));
        assert_eq!(cv.complete_variable("xx"), None);
        assert_eq!(cv.list(Some("cl_*")), (3, 2));
        let out = con.take_output();
        assert!(out.contains("*  cl_backspeed \"200\""));
        assert!(out.ends_with("3 cvars, 2 matching\n"));
    }
}
