//! API hook declarations and their per-process activation state.
//!
//! A handler declares the exported functions it wants to intercept as a static
//! table of `module -> [(symbol, argument count)]`. [`build_api_hooks`] turns
//! that table into [`ApiHook`]s keyed by lower-cased module name. Each time the
//! module is loaded, the dispatcher activates the hooks for the loading
//! process; a hook remembers where it is installed so a second load in the
//! same process does nothing.
//!
//! When a hooked function is entered or left, the backend reports the trap as
//! an [`ApiHookHit`] and the dispatcher hands it to the handler's
//! `api_hook_entry` or `api_hook_exit` instead of the plain trap handler.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::VigilResult;
use crate::session::DebugSession;
use crate::types::{Address, ProcessId};

/// Static hook declaration: module name to ordered `(symbol, argument count)` pairs.
pub type ApiHookTable = &'static [(&'static str, &'static [(&'static str, u32)])];

/// One exported function to intercept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiHookSpec
{
    /// Lower-cased module file name, e.g. `kernel32.dll`.
    pub module: String,
    /// Exported symbol name, e.g. `CreateFileW`.
    pub symbol: String,
    /// Number of stack arguments the function takes.
    pub argument_count: u32,
}

impl ApiHookSpec
{
    #[must_use]
    pub fn new(module: &str, symbol: &str, argument_count: u32) -> Self
    {
        Self {
            module: module.to_lowercase(),
            symbol: symbol.to_string(),
            argument_count,
        }
    }
}

/// Which side of a hooked call a trap reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiHookCall
{
    /// The function was entered.
    Entry
    {
        /// Where the function will return to.
        return_address: Address,
        /// Stack arguments in declaration order, `argument_count` of them.
        arguments: Vec<u64>,
    },
    /// The function returned.
    Exit
    {
        return_value: u64
    },
}

/// A trap the target recognized as one of its installed API hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiHookHit
{
    /// Module file name, in any case.
    pub module: String,
    pub symbol: String,
    pub call: ApiHookCall,
}

impl ApiHookHit
{
    #[must_use]
    pub fn entry(module: &str, symbol: &str, return_address: Address, arguments: Vec<u64>) -> Self
    {
        Self {
            module: module.to_string(),
            symbol: symbol.to_string(),
            call: ApiHookCall::Entry {
                return_address,
                arguments,
            },
        }
    }

    #[must_use]
    pub fn exit(module: &str, symbol: &str, return_value: u64) -> Self
    {
        Self {
            module: module.to_string(),
            symbol: symbol.to_string(),
            call: ApiHookCall::Exit { return_value },
        }
    }
}

/// An [`ApiHookSpec`] plus the processes it is installed in.
#[derive(Debug, Clone)]
pub struct ApiHook
{
    spec: ApiHookSpec,
    installed: HashSet<ProcessId>,
}

impl ApiHook
{
    #[must_use]
    pub fn new(spec: ApiHookSpec) -> Self
    {
        Self {
            spec,
            installed: HashSet::new(),
        }
    }

    #[must_use]
    pub fn spec(&self) -> &ApiHookSpec
    {
        &self.spec
    }

    /// Returns `true` if the hook is installed in `pid`.
    #[must_use]
    pub fn is_installed(&self, pid: ProcessId) -> bool
    {
        self.installed.contains(&pid)
    }

    /// Install the hook in `pid` unless it already is.
    ///
    /// Returns `Ok(true)` when the installer was called and succeeded,
    /// `Ok(false)` when the hook was already in place. A failed install is not
    /// recorded, so a later load retries it.
    pub fn hook(&mut self, session: &mut DebugSession, pid: ProcessId) -> VigilResult<bool>
    {
        if self.installed.contains(&pid) {
            return Ok(false);
        }

        session.target_mut().install_api_hook(pid, &self.spec.module, &self.spec)?;
        debug!(pid = pid.0, module = %self.spec.module, symbol = %self.spec.symbol, "api hook installed");
        self.installed.insert(pid);
        Ok(true)
    }

    /// Drop the installation record for an exited process.
    pub fn forget(&mut self, pid: ProcessId)
    {
        self.installed.remove(&pid);
    }
}

/// The active hook a hit belongs to, provided it is installed in `pid`.
#[must_use]
pub fn find_installed_hook<'h>(
    hooks: &'h HashMap<String, Vec<ApiHook>>,
    hit: &ApiHookHit,
    pid: ProcessId,
) -> Option<&'h ApiHook>
{
    hooks
        .get(&hit.module.to_lowercase())?
        .iter()
        .find(|hook| hook.spec.symbol == hit.symbol && hook.is_installed(pid))
}

/// Build active hooks from a declaration table, keyed by lower-cased module name.
///
/// Declarations for the same module under different spellings are merged in
/// declaration order.
#[must_use]
pub fn build_api_hooks(table: ApiHookTable) -> HashMap<String, Vec<ApiHook>>
{
    let mut hooks: HashMap<String, Vec<ApiHook>> = HashMap::new();
    for (module, symbols) in table {
        let key = module.to_lowercase();
        let entry = hooks.entry(key).or_default();
        entry.extend(symbols.iter().map(|(symbol, argc)| ApiHook::new(ApiHookSpec::new(module, symbol, *argc))));
    }
    hooks
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn table_keys_are_lower_cased_and_merged()
    {
        const TABLE: ApiHookTable = &[
            ("KERNEL32.dll", &[("CreateFileW", 7), ("CloseHandle", 1)]),
            ("kernel32.DLL", &[("ReadFile", 5)]),
            ("advapi32.dll", &[("RegOpenKeyExW", 5)]),
        ];

        let hooks = build_api_hooks(TABLE);
        assert_eq!(hooks.len(), 2);

        let symbols: Vec<&str> = hooks["kernel32.dll"].iter().map(|h| h.spec().symbol.as_str()).collect();
        assert_eq!(symbols, vec!["CreateFileW", "CloseHandle", "ReadFile"]);
        assert_eq!(hooks["kernel32.dll"][0].spec().module, "kernel32.dll");
        assert_eq!(hooks["kernel32.dll"][0].spec().argument_count, 7);
    }

    #[test]
    fn hits_match_installed_hooks_only()
    {
        const TABLE: ApiHookTable = &[("kernel32.dll", &[("CreateFileW", 7), ("ReadFile", 5)])];

        let mut hooks = build_api_hooks(TABLE);
        let pid = ProcessId(100);
        if let Some(kernel32) = hooks.get_mut("kernel32.dll") {
            kernel32[1].installed.insert(pid);
        }

        let read = ApiHookHit::exit("KERNEL32.DLL", "ReadFile", 1);
        let create = ApiHookHit::exit("kernel32.dll", "CreateFileW", 1);
        let lower = ApiHookHit::exit("kernel32.dll", "readfile", 1);

        assert_eq!(find_installed_hook(&hooks, &read, pid).map(|h| h.spec().argument_count), Some(5));
        assert!(find_installed_hook(&hooks, &read, ProcessId(300)).is_none());
        assert!(find_installed_hook(&hooks, &create, pid).is_none());
        assert!(find_installed_hook(&hooks, &lower, pid).is_none());
    }

    #[test]
    fn empty_table_builds_no_hooks()
    {
        assert!(build_api_hooks(&[]).is_empty());
    }
}
