//! Script engine
//!
//! The narrow capability the execution service relies on: check that a
//! fragment can run, and run it while capturing its output.
//!
//! Fragments are evaluated REPL-style. The engine first tries to compile
//! `return <code>` so that a bare expression such as `2 * 2` yields its
//! value, and falls back to compiling the fragment as a plain block.

use lunar_core::domain::job::{FailureInfo, FailureKind};
use mlua::{ChunkMode, Function, HookTriggers, Lua, MultiValue, Value, VmState};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::module::{ModuleError, ModuleRegistry};
use crate::modules::{ConsoleModule, ConsoleOutput};
use crate::sandbox::create_sandbox;

const CHUNK_NAME: &str = "=fragment";
const CANCELLED_MESSAGE: &str = "execution cancelled";
const BYTECODE_SIGNATURE: &[u8] = b"\x1bLua";

/// Makes error-catching builtins re-raise once the run is cancelled
///
/// Receives the cancellation check as its only argument. Installed before
/// any fragment code, so scripts only ever see the wrapped versions.
const CANCEL_GUARD: &str = r#"
local is_cancelled = ...
local raise = error

local function rethrow_if_cancelled(ok, ...)
    if not ok and is_cancelled() then
        raise((...), 0)
    end
    return ok, ...
end

local raw_pcall, raw_xpcall = pcall, xpcall
local raw_resume, raw_close = coroutine.resume, coroutine.close

pcall = function(...) return rethrow_if_cancelled(raw_pcall(...)) end
xpcall = function(...) return rethrow_if_cancelled(raw_xpcall(...)) end
coroutine.resume = function(...) return rethrow_if_cancelled(raw_resume(...)) end
coroutine.close = function(...) return rethrow_if_cancelled(raw_close(...)) end
"#;

/// Result rendered for fragments that return nothing
pub const NO_VALUE: &str = "nil";

/// Capability used by the execution service to validate and run code
pub trait ScriptEngine: Send + Sync {
    /// Checks that a fragment compiles and can be executed
    fn validate(&self, code: &str) -> Result<(), ValidationError>;

    /// Runs a fragment to completion
    ///
    /// Output written by the script goes to `output`. Returns the string
    /// rendering of the first value the fragment returns, or [`NO_VALUE`].
    fn execute(
        &self,
        code: &str,
        output: ConsoleOutput,
        cancel: &CancelToken,
    ) -> Result<String, EngineFailure>;

    /// LuaLS definitions of the globals available to fragments
    fn stubs(&self) -> String;
}

/// Reasons a fragment is refused before scheduling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("fragment can't be executed: {0}")]
    Unexecutable(String),

    #[error("failed to prepare sandbox: {0}")]
    Sandbox(String),
}

/// Error that terminated an execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} error: {detail}")]
pub struct EngineFailure {
    pub kind: FailureKind,
    pub detail: String,
    /// True when the run stopped because its token was cancelled
    pub cancelled: bool,
}

impl EngineFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Runtime,
            detail: CANCELLED_MESSAGE.to_string(),
            cancelled: true,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        self.cancelled
    }

    pub fn into_failure_info(self) -> FailureInfo {
        FailureInfo::new(self.kind, self.detail)
    }

    fn from_lua(error: mlua::Error, cancel: &CancelToken) -> Self {
        if cancel.is_cancelled() {
            return Self::cancelled();
        }

        match error {
            mlua::Error::SyntaxError { message, .. } => Self::new(FailureKind::Syntax, message),
            mlua::Error::MemoryError(message) => Self::new(FailureKind::Memory, message),
            other => Self::new(FailureKind::Runtime, other.to_string()),
        }
    }
}

/// Tuning knobs for [`LuaEngine`]
#[derive(Debug, Clone)]
pub struct LuaEngineConfig {
    /// Upper bound on memory a single execution may allocate
    pub memory_limit: Option<usize>,
    /// VM instructions between two cancellation checks
    pub hook_interval: u32,
}

impl Default for LuaEngineConfig {
    fn default() -> Self {
        Self {
            memory_limit: None,
            hook_interval: 1000,
        }
    }
}

/// Lua 5.4 implementation of [`ScriptEngine`]
///
/// Every call builds a fresh sandbox, so executions never share globals.
#[derive(Debug, Clone, Default)]
pub struct LuaEngine {
    config: LuaEngineConfig,
}

impl LuaEngine {
    pub fn new(config: LuaEngineConfig) -> Self {
        Self { config }
    }

    /// Modules installed into every execution state
    fn modules(&self, output: ConsoleOutput) -> Result<ModuleRegistry, ModuleError> {
        let mut registry = ModuleRegistry::new();
        registry.register(ConsoleModule::new(output))?;
        Ok(registry)
    }

    /// Creates a sandbox wired to `output` that stops once `cancel` fires
    fn create_state(&self, output: ConsoleOutput, cancel: &CancelToken) -> mlua::Result<Lua> {
        let lua = create_sandbox()?;

        if let Some(limit) = self.config.memory_limit {
            lua.set_memory_limit(limit)?;
        }

        self.modules(output)
            .map_err(mlua::Error::external)?
            .register_all(&lua)?;

        install_cancel_guard(&lua, cancel.clone())?;
        self.install_cancel_hook(&lua, cancel.clone())?;

        Ok(lua)
    }

    /// Aborts the running chunk once `cancel` fires
    ///
    /// The hook is global so it also fires inside coroutines. After
    /// cancellation every check fails again.
    fn install_cancel_hook(&self, lua: &Lua, cancel: CancelToken) -> mlua::Result<()> {
        let triggers = HookTriggers::new().every_nth_instruction(self.config.hook_interval);
        lua.set_global_hook(triggers, move |_lua, _debug| {
            if cancel.is_cancelled() {
                Err(mlua::Error::runtime(CANCELLED_MESSAGE))
            } else {
                Ok(VmState::Continue)
            }
        })
    }
}

/// Wraps `pcall`, `xpcall` and coroutine resumption so a cancelled run
/// can't be caught and resumed by the script
fn install_cancel_guard(lua: &Lua, cancel: CancelToken) -> mlua::Result<()> {
    let is_cancelled = lua.create_function(move |_, ()| Ok(cancel.is_cancelled()))?;
    lua.load(CANCEL_GUARD)
        .set_name("=cancel_guard")
        .set_mode(ChunkMode::Text)
        .call::<()>(is_cancelled)
}

fn is_bytecode(code: &str) -> bool {
    code.as_bytes().starts_with(BYTECODE_SIGNATURE)
}

/// Compiles a fragment, preferring its expression form
fn compile(lua: &Lua, code: &str) -> mlua::Result<Function> {
    let expression = lua
        .load(format!("return {code}"))
        .set_name(CHUNK_NAME)
        .set_mode(ChunkMode::Text)
        .into_function();

    match expression {
        Ok(function) => Ok(function),
        Err(_) => lua
            .load(code)
            .set_name(CHUNK_NAME)
            .set_mode(ChunkMode::Text)
            .into_function(),
    }
}

impl ScriptEngine for LuaEngine {
    fn validate(&self, code: &str) -> Result<(), ValidationError> {
        debug!("Validating code fragment ({} bytes)", code.len());

        if is_bytecode(code) {
            return Err(ValidationError::Unexecutable(
                "precompiled bytecode is not accepted".to_string(),
            ));
        }

        let lua = create_sandbox().map_err(|e| ValidationError::Sandbox(e.to_string()))?;

        match compile(&lua, code) {
            Ok(_) => {
                debug!("Validation finished, fragment is valid");
                Ok(())
            }
            Err(mlua::Error::SyntaxError { message, .. }) => {
                debug!("Fragment rejected: {}", message);
                Err(ValidationError::Syntax(message))
            }
            Err(e) => Err(ValidationError::Unexecutable(e.to_string())),
        }
    }

    fn execute(
        &self,
        code: &str,
        output: ConsoleOutput,
        cancel: &CancelToken,
    ) -> Result<String, EngineFailure> {
        if cancel.is_cancelled() {
            return Err(EngineFailure::cancelled());
        }
        if is_bytecode(code) {
            return Err(EngineFailure::new(
                FailureKind::Syntax,
                "precompiled bytecode is not accepted",
            ));
        }

        let lua = self.create_state(output, cancel).map_err(|e| {
            EngineFailure::new(
                FailureKind::Runtime,
                format!("failed to prepare sandbox: {}", e),
            )
        })?;

        let function = compile(&lua, code).map_err(|e| EngineFailure::from_lua(e, cancel))?;
        let values: MultiValue = function
            .call(())
            .map_err(|e| EngineFailure::from_lua(e, cancel))?;

        match values.into_iter().next() {
            None | Some(Value::Nil) => Ok(NO_VALUE.to_string()),
            Some(value) => value
                .to_string()
                .map_err(|e| EngineFailure::from_lua(e, cancel)),
        }
    }

    fn stubs(&self) -> String {
        match self.modules(ConsoleOutput::discard()) {
            Ok(registry) => registry.generate_stubs(),
            Err(e) => {
                warn!("Failed to collect module stubs: {}", e);
                String::new()
            }
        }
    }
}
