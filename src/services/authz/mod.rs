pub mod arguments;
pub mod enforcer;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod rule;

pub use arguments::Arguments;
pub use enforcer::{Enforcer, OperationBuilder, ProtectedOperation, ScopeBuilder};
pub use error::AuthzError;
pub use evaluator::{Decision, RuleEvaluator};
pub use rule::{DeclaredRule, RuleKind};
