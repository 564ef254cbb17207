//! Restricted Lua state
//!
//! Fragments run in a state that only carries the pure parts of the
//! standard library. Nothing in it can touch the filesystem, the process or
//! compile new code at runtime.

use mlua::{Lua, LuaOptions, Result as LuaResult, StdLib};

/// Globals removed from the base library
const BLOCKED_GLOBALS: [&str; 4] = ["require", "dofile", "loadfile", "load"];

/// Builds a fresh restricted Lua state
///
/// Available: base library (minus [`BLOCKED_GLOBALS`]), `table`, `string`,
/// `math`, `coroutine` and `utf8`. `io`, `os`, `package` and `debug` are
/// never opened. `load` is removed since it would accept bytecode.
///
/// ```no_run
/// let lua = lunar_lua::create_sandbox()?;
/// let n: i64 = lua.load("return #('lunar')").eval()?;
/// assert_eq!(n, 5);
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_sandbox() -> LuaResult<Lua> {
    let libs = StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::COROUTINE | StdLib::UTF8;
    let lua = Lua::new_with(libs, LuaOptions::default())?;

    let globals = lua.globals();
    for name in BLOCKED_GLOBALS {
        globals.set(name, mlua::Nil)?;
    }

    Ok(lua)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_defined(lua: &Lua, global: &str) -> bool {
        lua.load(format!("return {} ~= nil", global))
            .eval()
            .unwrap()
    }

    #[test]
    fn test_pure_libraries_available() {
        let lua = create_sandbox().unwrap();

        let joined: String = lua
            .load("return table.concat({string.upper('a'), math.floor(2.7), utf8.char(98)}, '-')")
            .eval()
            .unwrap();
        assert_eq!(joined, "A-2-b");

        for global in ["table", "string", "math", "coroutine", "utf8", "pcall", "tostring"] {
            assert!(is_defined(&lua, global), "{} should be available", global);
        }
    }

    #[test]
    fn test_host_access_removed() {
        let lua = create_sandbox().unwrap();

        for global in ["io", "os", "package", "debug"] {
            assert!(!is_defined(&lua, global), "{} should not be opened", global);
        }
        for global in BLOCKED_GLOBALS {
            assert!(!is_defined(&lua, global), "{} should be removed", global);
        }

        assert!(lua.load(r#"load("return 1")()"#).exec().is_err());
    }

    #[test]
    fn test_states_are_independent() {
        let first = create_sandbox().unwrap();
        let second = create_sandbox().unwrap();

        first.load("shared = 1").exec().unwrap();
        assert!(!is_defined(&second, "shared"));
    }
}
