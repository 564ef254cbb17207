//! Console module for Lunar Lua scripts
//!
//! Gives scripts a `console` table in the style of browser consoles:
//! - `console.log`, `console.info`, `console.debug` write to stdout
//! - `console.warn`, `console.error` write to stderr
//!
//! The global `print` is redirected to stdout as well, so nothing a script
//! prints ever reaches the host process streams.

use crate::module::LunarModule;
use mlua::prelude::*;
use std::sync::{Arc, Mutex, PoisonError};

/// Trait for output sinks
///
/// Implement this trait to decide where script output ends up. The server
/// appends into per-job buffers; tests collect into memory.
///
/// # Thread Safety
/// Implementations must be Send to work with Lua's threading model.
pub trait OutputSink: Send {
    /// Append text to the sink
    fn write(&mut self, text: &str);
}

/// The pair of sinks a script writes into
pub struct ConsoleOutput {
    pub stdout: Box<dyn OutputSink>,
    pub stderr: Box<dyn OutputSink>,
}

impl ConsoleOutput {
    pub fn new(stdout: impl OutputSink + 'static, stderr: impl OutputSink + 'static) -> Self {
        Self {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// Output that is thrown away
    pub fn discard() -> Self {
        Self::new(Discard, Discard)
    }
}

struct Discard;

impl OutputSink for Discard {
    fn write(&mut self, _text: &str) {}
}

type SharedSink = Arc<Mutex<Box<dyn OutputSink>>>;

/// Console module for Lunar Lua scripts
pub struct ConsoleModule {
    stdout: SharedSink,
    stderr: SharedSink,
}

impl ConsoleModule {
    /// Creates a new ConsoleModule writing into the provided sinks
    pub fn new(output: ConsoleOutput) -> Self {
        Self {
            stdout: Arc::new(Mutex::new(output.stdout)),
            stderr: Arc::new(Mutex::new(output.stderr)),
        }
    }
}

/// Renders call arguments as one console line
///
/// Values go through Lua's `tostring` rules and are joined by a single space.
fn render_line(args: &LuaVariadic<LuaValue>) -> LuaResult<String> {
    let parts = args
        .iter()
        .map(|value| value.to_string())
        .collect::<LuaResult<Vec<_>>>()?;

    let mut line = parts.join(" ");
    line.push('\n');
    Ok(line)
}

fn create_writer(lua: &Lua, sink: &SharedSink) -> LuaResult<LuaFunction> {
    let sink = sink.clone();
    lua.create_function(move |_, args: LuaVariadic<LuaValue>| {
        let line = render_line(&args)?;
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(&line);
        Ok(())
    })
}

impl LunarModule for ConsoleModule {
    fn id(&self) -> &'static str {
        "console"
    }

    fn register(&self, lua: &Lua) -> LuaResult<()> {
        let console = lua.create_table()?;

        for name in ["log", "info", "debug"] {
            console.set(name, create_writer(lua, &self.stdout)?)?;
        }
        for name in ["warn", "error"] {
            console.set(name, create_writer(lua, &self.stderr)?)?;
        }

        lua.globals().set(self.id(), console)?;
        lua.globals().set("print", create_writer(lua, &self.stdout)?)?;

        Ok(())
    }

    fn stubs(&self) -> String {
        r#"---@meta

---Console output for Lunar scripts
---@class console
console = {}

---Write a line to stdout
---@param ... any Values to print, separated by spaces
function console.log(...) end

---Write a line to stdout
---@param ... any
function console.info(...) end

---Write a line to stdout
---@param ... any
function console.debug(...) end

---Write a line to stderr
---@param ... any
function console.warn(...) end

---Write a line to stderr
---@param ... any
function console.error(...) end
"#
        .to_string()
    }
}
