//! The `Function` trait and its capability flags.

use crate::engine::InternalFault;
use crate::traits::{ArgumentHandle, EvaluationContext};
use sheetcalc_common::Value;

bitflags::bitflags! {
    /// Describes how a function treats its arguments.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FnCaps: u16 {
        /// Same output for the same inputs, no side effects.
        const PURE           = 0b0000_0001;
        /// Folds any number of arguments, ranges and arrays into one value
        /// (`SUM`, `COUNT`).
        const REDUCTION      = 0b0000_0010;
        /// Maps a scalar argument to a scalar result (`ABS`, `UPPER`).
        const ELEMENTWISE    = 0b0000_0100;
        /// Evaluates only the arguments it needs (`IF`, `IFERROR`).
        const SHORT_CIRCUIT  = 0b0000_1000;
        /// Operates on numbers; other kinds are coerced or skipped.
        const NUMERIC_ONLY   = 0b0001_0000;
        /// Inspects error values instead of propagating them.
        const ERROR_HANDLING = 0b0010_0000;
    }
}

/// A formula function.
///
/// Implementations receive lazily evaluated argument handles so that
/// short-circuiting functions can skip branches they do not need. Arity is
/// checked by the interpreter before `eval_scalar` runs.
pub trait Function: Send + Sync + 'static {
    fn caps(&self) -> FnCaps {
        FnCaps::PURE
    }

    /// Upper-case name the function is looked up by.
    fn name(&self) -> &str;

    fn min_args(&self) -> usize {
        0
    }

    fn variadic(&self) -> bool {
        false
    }

    /// `None` means unbounded.
    fn max_args(&self) -> Option<usize> {
        if self.variadic() {
            None
        } else {
            Some(self.min_args())
        }
    }

    fn eval_scalar<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn EvaluationContext,
    ) -> Result<Value, InternalFault>;
}

/// Catalogue entry returned by `Engine::list_functions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub custom: bool,
}

impl FunctionInfo {
    pub fn of(f: &dyn Function, custom: bool) -> Self {
        Self {
            name: f.name().to_ascii_uppercase(),
            min_args: f.min_args(),
            max_args: f.max_args(),
            custom,
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.is_none_or(|max| count <= max)
    }
}
