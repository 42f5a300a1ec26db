//! Host imports
//!
//! Imported functions are satisfied by closures registered against a
//! `(module, name)` pair. Resolution is lazy: nothing is looked up until
//! the import is actually called, so registration order relative to
//! instantiation does not matter. An import still unresolved at call time
//! is fatal.

use super::memory::Memory;
use super::value::Value;
use super::RuntimeError;
use std::collections::HashMap;

/// A host function. It may read and write linear memory and receives the
/// call arguments as tagged values.
pub type HostFunc = Box<dyn FnMut(&mut Memory, &[Value]) -> Result<Option<Value>, RuntimeError>>;

#[derive(Default)]
pub struct HostRegistry {
    funcs: HashMap<(String, String), HostFunc>,
}

impl HostRegistry {
    pub fn register(&mut self, module: &str, name: &str, func: HostFunc) {
        self.funcs
            .insert((module.to_string(), name.to_string()), func);
    }

    pub fn get_mut(&mut self, module: &str, name: &str) -> Option<&mut HostFunc> {
        self.funcs.get_mut(&(module.to_string(), name.to_string()))
    }
}

impl std::fmt::Debug for HostRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRegistry")
            .field("count", &self.funcs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_call() {
        let mut registry = HostRegistry::default();
        registry.register(
            "env",
            "double",
            Box::new(|_mem, args| Ok(Some(Value::I32(args[0].as_i32()? * 2)))),
        );
        let mut mem = Memory::new(0, None).unwrap();
        let func = registry.get_mut("env", "double").unwrap();
        let out = func(&mut mem, &[Value::I32(21)]).unwrap();
        assert_eq!(out, Some(Value::I32(42)));
        assert!(registry.get_mut("env", "missing").is_none());
    }
}
