use crate::function::Function;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

// Keys are upper-case function names.
static REG: Lazy<DashMap<String, Arc<dyn Function>>> = Lazy::new(DashMap::new);

pub fn register(f: Arc<dyn Function>) {
    REG.insert(f.name().to_ascii_uppercase(), f);
}

pub fn get(name: &str) -> Option<Arc<dyn Function>> {
    crate::builtins::load_builtins();
    REG.get(name.to_ascii_uppercase().as_str())
        .map(|v| Arc::clone(v.value()))
}

/// Every registered function, sorted by name.
pub fn all() -> Vec<Arc<dyn Function>> {
    crate::builtins::load_builtins();
    let mut fns: Vec<Arc<dyn Function>> = REG.iter().map(|e| Arc::clone(e.value())).collect();
    fns.sort_by(|a, b| a.name().cmp(b.name()));
    fns
}
