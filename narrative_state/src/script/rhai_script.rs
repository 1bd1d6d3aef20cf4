//! Rhai evaluator.
//!
//! A script sees two variables: `data`, an object map bound to the draft state,
//! and `functions`, whose methods are the entries of the function table:
//!
//! ```text
//! data.lastRoll = functions.roll();
//! ```
//!
//! A global script exports by evaluating to a map with both keys. A message
//! script's return value is never read as exports:
//!
//! ```text
//! fn roll() { 7 }
//! #{ data: data, functions: #{ roll: Fn("roll") } }
//! ```

use std::sync::Arc;

use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, Position, Scope, AST};
use serde_json::{Map, Value};
use story_model::{ScriptConfig, WorldState};
use tracing::debug;

use super::{
    CompiledScript, FunctionTable, ScriptCompiler, ScriptFault, ScriptFunction, ScriptMode, ScriptReturn,
};

const DATA_VAR: &str = "data";
const FUNCTIONS_VAR: &str = "functions";

/// Compiles Rhai source into reusable programs.
#[derive(Debug)]
pub struct RhaiCompiler {
    parser: Engine,
    max_operations: u64,
}

impl RhaiCompiler {
    pub fn new(config: &ScriptConfig) -> Self {
        Self {
            parser: Engine::new(),
            max_operations: config.max_operations,
        }
    }

    pub fn max_operations(&self) -> u64 {
        self.max_operations
    }
}

impl Default for RhaiCompiler {
    fn default() -> Self {
        Self::new(&ScriptConfig::default())
    }
}

impl ScriptCompiler for RhaiCompiler {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledScript>, ScriptFault> {
        let ast = self
            .parser
            .compile(source)
            .map_err(|err| ScriptFault::new(err.to_string()))?;
        Ok(Box::new(RhaiProgram {
            ast,
            max_operations: self.max_operations,
        }))
    }
}

/// Value bound to `functions` inside a script. Its methods are table entries.
#[derive(Debug, Clone, Copy, Default)]
struct FunctionsHandle;

struct RhaiProgram {
    ast: AST,
    max_operations: u64,
}

impl RhaiProgram {
    /// A fresh engine with the function table registered as `functions.*` methods.
    fn engine(&self, functions: &FunctionTable) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(self.max_operations);
        engine.on_print(|text| debug!(target: "narrative_state::script", "{}", text));
        engine.register_type_with_name::<FunctionsHandle>("Functions");

        for (name, function) in functions.iter() {
            let f = Arc::clone(function);
            engine.register_fn(name, move |_: &mut FunctionsHandle| call_table(&f, Vec::new()));
            let f = Arc::clone(function);
            engine.register_fn(name, move |_: &mut FunctionsHandle, a: Dynamic| {
                call_table(&f, vec![a])
            });
            let f = Arc::clone(function);
            engine.register_fn(name, move |_: &mut FunctionsHandle, a: Dynamic, b: Dynamic| {
                call_table(&f, vec![a, b])
            });
            let f = Arc::clone(function);
            engine.register_fn(
                name,
                move |_: &mut FunctionsHandle, a: Dynamic, b: Dynamic, c: Dynamic| {
                    call_table(&f, vec![a, b, c])
                },
            );
        }

        engine
    }
}

impl CompiledScript for RhaiProgram {
    fn invoke(
        &self,
        data: &mut WorldState,
        functions: &FunctionTable,
        mode: ScriptMode,
    ) -> Result<ScriptReturn, ScriptFault> {
        let engine = Arc::new(self.engine(functions));

        let mut scope = Scope::new();
        scope.push_dynamic(DATA_VAR, to_dynamic(data.as_map()).map_err(fault)?);
        scope.push(FUNCTIONS_VAR, FunctionsHandle);

        let result = engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
            .map_err(fault)?;

        let bound = scope
            .get_value::<Dynamic>(DATA_VAR)
            .ok_or_else(|| ScriptFault::new("script removed `data`"))?;
        data.replace_with(object_from(&bound, DATA_VAR)?);

        self.classify(result, &engine, mode)
    }
}

impl RhaiProgram {
    fn classify(&self, result: Dynamic, engine: &Arc<Engine>, mode: ScriptMode) -> Result<ScriptReturn, ScriptFault> {
        if result.is_unit() {
            return Ok(ScriptReturn::Unit);
        }

        let exports = match mode {
            ScriptMode::Global => result.clone().try_cast::<rhai::Map>(),
            ScriptMode::Message => None,
        };
        if let Some(exports) = exports {
            if let (Some(data), Some(functions)) = (exports.get(DATA_VAR), exports.get(FUNCTIONS_VAR)) {
                return Ok(ScriptReturn::Exports {
                    data: object_from(data, "exported data")?,
                    functions: self.exported_functions(functions, engine)?,
                });
            }
        }

        Ok(ScriptReturn::Value(
            from_dynamic::<Value>(&result).unwrap_or(Value::Null),
        ))
    }

    /// Wrap every function pointer of an exported `functions` map.
    fn exported_functions(&self, value: &Dynamic, engine: &Arc<Engine>) -> Result<FunctionTable, ScriptFault> {
        let Some(entries) = value.clone().try_cast::<rhai::Map>() else {
            return Err(ScriptFault::new("exported `functions` must be a map"));
        };

        let shared_ast = Arc::new(self.ast.clone_functions_only());
        let mut table = FunctionTable::new();

        for (name, entry) in entries {
            let Some(pointer) = entry.try_cast::<FnPtr>() else {
                return Err(ScriptFault::new(format!(
                    "exported `functions.{}` is not a function",
                    name
                )));
            };

            let engine = Arc::clone(engine);
            let ast = Arc::clone(&shared_ast);
            let function: ScriptFunction = Arc::new(move |args: &[Value]| {
                let args = args
                    .iter()
                    .map(|arg| to_dynamic(arg).map_err(fault))
                    .collect::<Result<Vec<Dynamic>, _>>()?;
                let returned = pointer
                    .call::<Dynamic>(&engine, &ast, args)
                    .map_err(fault)?;
                from_dynamic::<Value>(&returned).map_err(fault)
            });
            table.insert_shared(name.as_str(), function);
        }

        Ok(table)
    }
}

fn call_table(function: &ScriptFunction, args: Vec<Dynamic>) -> Result<Dynamic, Box<EvalAltResult>> {
    let args = args
        .iter()
        .map(from_dynamic::<Value>)
        .collect::<Result<Vec<_>, _>>()?;
    let value = function(&args).map_err(|err| runtime_error(err.message()))?;
    to_dynamic(value)
}

fn object_from(value: &Dynamic, what: &str) -> Result<Map<String, Value>, ScriptFault> {
    match from_dynamic::<Value>(value).map_err(fault)? {
        Value::Object(map) => Ok(map),
        other => Err(ScriptFault::new(format!(
            "{} must be an object map, got {}",
            what, other
        ))),
    }
}

fn runtime_error(message: &str) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message.to_string()),
        Position::NONE,
    ))
}

fn fault(err: Box<EvalAltResult>) -> ScriptFault {
    ScriptFault::new(err.to_string())
}
