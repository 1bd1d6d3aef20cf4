//! Host-callable functions exported by the global script.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A failure raised inside a script or a script function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptFault {
    message: String,
}

impl ScriptFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A callable entry in a [`FunctionTable`].
pub type ScriptFunction = Arc<dyn Fn(&[Value]) -> Result<Value, ScriptFault> + Send + Sync>;

/// Named functions made available to every message script.
///
/// Only a global script populates the table; message scripts can call but never
/// replace it. Cloning shares the underlying functions.
#[derive(Clone, Default)]
pub struct FunctionTable(BTreeMap<String, ScriptFunction>);

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a function.
    pub fn insert<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value, ScriptFault> + Send + Sync + 'static,
    {
        self.0.insert(name.into(), Arc::new(function));
        self
    }

    /// Add an already shared function.
    pub fn insert_shared(&mut self, name: impl Into<String>, function: ScriptFunction) -> &mut Self {
        self.0.insert(name.into(), function);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ScriptFunction> {
        self.0.get(name)
    }

    /// Call `name` with `args`. Unknown names are a fault.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ScriptFault> {
        let function = self
            .0
            .get(name)
            .ok_or_else(|| ScriptFault::new(format!("unknown script function `{}`", name)))?;
        function(args)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Function names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScriptFunction)> {
        self.0.iter().map(|(name, function)| (name.as_str(), function))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FunctionTable")
            .field(&self.0.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_registered_function() {
        let mut table = FunctionTable::new();
        table
            .insert("roll", |_args| Ok(json!(7)))
            .insert("add", |args| {
                let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                Ok(json!(sum))
            });

        assert_eq!(table.call("roll", &[]).unwrap(), json!(7));
        assert_eq!(table.call("add", &[json!(2), json!(3)]).unwrap(), json!(5));
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["add", "roll"]);
    }

    #[test]
    fn test_unknown_function_is_fault() {
        let table = FunctionTable::new();
        let fault = table.call("missing", &[]).unwrap_err();
        assert!(fault.message().contains("missing"));
    }

    #[test]
    fn test_clone_shares_functions() {
        let mut table = FunctionTable::new();
        table.insert("roll", |_| Ok(json!(4)));
        let copy = table.clone();

        assert!(Arc::ptr_eq(
            table.get("roll").unwrap(),
            copy.get("roll").unwrap()
        ));
        assert_eq!(format!("{:?}", copy), "FunctionTable([\"roll\"])");
    }
}
