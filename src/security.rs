//! Security module: identifier validation, statement classification and the
//! SQL injection guard.

mod identifiers;
mod injection;
mod validation;

pub use identifiers::{
    invalid_identifier_message, is_safe_identifier, normalize_parameter_name, qualified_name,
    quote_identifier,
};
pub use injection::{InjectionGuard, InjectionPolicy, InjectionRule};
pub use validation::{classify, is_write_operation, StatementKind};
