pub mod logical;
pub mod math;
pub mod text;
mod utils;

use std::sync::Once;

static LOAD: Once = Once::new();

/// Register the builtin library with the global registry. Idempotent.
pub fn load_builtins() {
    LOAD.call_once(|| {
        logical::register_builtins();
        math::register_builtins();
        text::register_builtins();
    });
}
