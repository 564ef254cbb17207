//! Script modules
//!
//! A module is a global table (e.g. `console`) installed into every fresh
//! sandbox before a fragment runs.

use mlua::prelude::*;
use thiserror::Error;

/// A global made available to scripts
///
/// `id()` doubles as the name of the Lua global, so it has to be a valid
/// Lua identifier and unique within a [`ModuleRegistry`].
///
/// ```rust
/// use lunar_lua::LunarModule;
/// use mlua::prelude::*;
///
/// struct Answer;
///
/// impl LunarModule for Answer {
///     fn id(&self) -> &'static str {
///         "answer"
///     }
///
///     fn register(&self, lua: &Lua) -> LuaResult<()> {
///         lua.globals().set(self.id(), 42)
///     }
///
///     fn stubs(&self) -> String {
///         "---@meta\n---@type integer\nanswer = 42".to_string()
///     }
/// }
/// ```
pub trait LunarModule: Send + Sync {
    fn id(&self) -> &'static str;

    /// Installs the module's globals into `lua`
    fn register(&self, lua: &Lua) -> LuaResult<()>;

    /// LuaLS definitions for the module, starting with `---@meta`
    fn stubs(&self) -> String;
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module with id '{0}' is already registered")]
    Duplicate(&'static str),
}

/// Ordered set of modules, keyed by id
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn LunarModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module, refusing a second module with the same id
    pub fn register<M: LunarModule + 'static>(&mut self, module: M) -> Result<(), ModuleError> {
        if self.contains(module.id()) {
            return Err(ModuleError::Duplicate(module.id()));
        }
        self.modules.push(Box::new(module));
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.iter().any(|module| module.id() == id)
    }

    /// Installs every module, in registration order, stopping at the first failure
    pub fn register_all(&self, lua: &Lua) -> LuaResult<()> {
        self.modules
            .iter()
            .try_for_each(|module| module.register(lua))
    }

    /// Concatenated LuaLS definitions of every module
    pub fn generate_stubs(&self) -> String {
        self.modules
            .iter()
            .map(|module| module.stubs())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
