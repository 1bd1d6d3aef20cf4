//! Native evaluator: host-registered Rust closures looked up by script source.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use story_model::WorldState;

use super::{CompiledScript, FunctionTable, ScriptCompiler, ScriptFault, ScriptMode, ScriptReturn};

/// A script body written in Rust.
pub type NativeScript =
    Arc<dyn Fn(&mut WorldState, &FunctionTable) -> Result<ScriptReturn, ScriptFault> + Send + Sync>;

/// Compiles a source string by looking up the closure registered under it.
///
/// Sources are matched after trimming surrounding whitespace. An unregistered
/// source fails to compile.
#[derive(Clone, Default)]
pub struct NativeCompiler {
    scripts: HashMap<String, NativeScript>,
}

impl NativeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `script` under `source`.
    pub fn register<F>(&mut self, source: impl AsRef<str>, script: F) -> &mut Self
    where
        F: Fn(&mut WorldState, &FunctionTable) -> Result<ScriptReturn, ScriptFault>
            + Send
            + Sync
            + 'static,
    {
        self.scripts
            .insert(source.as_ref().trim().to_string(), Arc::new(script));
        self
    }

    /// Builder form of [`NativeCompiler::register`].
    pub fn with_script<F>(mut self, source: impl AsRef<str>, script: F) -> Self
    where
        F: Fn(&mut WorldState, &FunctionTable) -> Result<ScriptReturn, ScriptFault>
            + Send
            + Sync
            + 'static,
    {
        self.register(source, script);
        self
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl fmt::Debug for NativeCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sources: Vec<&String> = self.scripts.keys().collect();
        sources.sort();
        f.debug_struct("NativeCompiler")
            .field("sources", &sources)
            .finish()
    }
}

impl ScriptCompiler for NativeCompiler {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledScript>, ScriptFault> {
        let script = self.scripts.get(source.trim()).ok_or_else(|| {
            ScriptFault::new(format!("no native script registered for `{}`", source.trim()))
        })?;
        Ok(Box::new(NativeProgram(Arc::clone(script))))
    }
}

struct NativeProgram(NativeScript);

impl CompiledScript for NativeProgram {
    fn invoke(
        &self,
        data: &mut WorldState,
        functions: &FunctionTable,
        _mode: ScriptMode,
    ) -> Result<ScriptReturn, ScriptFault> {
        (self.0)(data, functions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_registered_source() {
        let compiler = NativeCompiler::new().with_script("bump", |data, _| {
            data.insert("count", json!(1));
            Ok(ScriptReturn::Unit)
        });

        let program = compiler.compile("  bump\n").unwrap();
        let mut state = WorldState::new();
        program.invoke(&mut state, &FunctionTable::new(), ScriptMode::Message).unwrap();

        assert_eq!(state.get("count"), Some(&json!(1)));
    }

    #[test]
    fn test_unregistered_source_fails() {
        let compiler = NativeCompiler::new();
        let fault = compiler.compile("mystery").err().unwrap();
        assert!(fault.message().contains("mystery"));
        assert!(compiler.is_empty());
    }
}
