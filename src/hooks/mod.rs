//! Named extension points with user-supplied callbacks
//!
//! The registry is populated explicitly at startup; triggering a name nobody
//! registered is a no-op that passes the arguments through unchanged. A
//! callback may observe (return `None`) or transform (return a replacement
//! vector of the same length); a return of the wrong length is discarded and
//! the original arguments flow on, so call sites never need to know which
//! kind of hook is installed.

use std::collections::HashMap;

use serde_json::Value;

/// Hook point names triggered by the driver
pub mod points {
    /// Resolved CLI options, before anything runs
    pub const CLI_OPTS: &str = "cli_opts";
    /// Engine reachable; argument: engine version
    pub const ENGINE_STARTED: &str = "engine_started";
    /// Engine configured for the run; argument: target
    pub const ENGINE_TUNED: &str = "engine_tuned";
    /// Context file about to be imported; argument: path
    pub const IMPORTING_CONTEXT: &str = "importing_context";
    /// Spider about to start; arguments: target, context name
    pub const SPIDER: &str = "spider";
    /// Ajax spider about to start; arguments: target, context name
    pub const AJAX_SPIDER: &str = "ajax_spider";
    /// Active scan about to start; arguments: target, policy
    pub const ACTIVE_SCAN: &str = "active_scan";
    /// Last call before the exit code is computed
    pub const PRE_EXIT: &str = "pre_exit";
}

/// Suffix appended to a hook name for the post-operation trigger of
/// [`HookRegistry::wrap`]
const AFTER_SUFFIX: &str = "_after";

type HookFn = Box<dyn Fn(&[Value]) -> Option<Vec<Value>> + Send + Sync>;

/// Registry of named extension points
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, HookFn>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for a hook point, replacing any previous one
    pub fn register<F>(&mut self, name: &str, hook: F)
    where
        F: Fn(&[Value]) -> Option<Vec<Value>> + Send + Sync + 'static,
    {
        self.hooks.insert(name.to_string(), Box::new(hook));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Run the hook registered for `name` over `args`.
    ///
    /// Unregistered name, observational callback (`None`), or a return of a
    /// different length than the input all yield the original arguments.
    pub fn trigger(&self, name: &str, args: Vec<Value>) -> Vec<Value> {
        let Some(hook) = self.hooks.get(name) else {
            return args;
        };
        match hook(&args) {
            Some(replaced) if replaced.len() == args.len() => replaced,
            Some(replaced) => {
                tracing::warn!(
                    hook = name,
                    expected = args.len(),
                    got = replaced.len(),
                    "hook returned wrong argument count, ignoring"
                );
                args
            }
            None => args,
        }
    }

    /// Trigger `name` on the arguments, run the wrapped operation, then
    /// trigger `<name>_after` on its result.
    pub fn wrap<E>(
        &self,
        name: &str,
        args: Vec<Value>,
        op: impl FnOnce(Vec<Value>) -> Result<Value, E>,
    ) -> Result<Value, E> {
        let args = self.trigger(name, args);
        let result = op(args)?;
        let after = format!("{name}{AFTER_SUFFIX}");
        let mut wrapped = self.trigger(&after, vec![result]);
        Ok(wrapped.remove(0))
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.hooks.keys().collect();
        names.sort();
        f.debug_struct("HookRegistry").field("hooks", &names).finish()
    }
}
