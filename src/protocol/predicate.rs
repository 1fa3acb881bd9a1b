//! Ready-made predicates for [`ResponderRegistry::register`](crate::protocol::registry::ResponderRegistry::register).

use bson::{Bson, Document};

use crate::protocol::request::command_name;

/// Matches when `key` is present, whatever its value.
pub fn has_key(key: &'static str) -> impl Fn(&Document) -> bool + Send + Sync + 'static {
    move |query| query.contains_key(key)
}

/// Matches when `key` is present with a truthy value (`true`, a non-zero
/// number, a non-empty string).
pub fn is_true(key: &'static str) -> impl Fn(&Document) -> bool + Send + Sync + 'static {
    move |query| query.get(key).is_some_and(truthy)
}

/// Matches when the command name (first key) equals `name`.
pub fn first_key_is(name: &'static str) -> impl Fn(&Document) -> bool + Send + Sync + 'static {
    move |query| command_name(query) == name
}

/// Matches when the first key is any of `names`.
pub fn first_key_in(
    names: &'static [&'static str],
) -> impl Fn(&Document) -> bool + Send + Sync + 'static {
    move |query| names.contains(&command_name(query))
}

/// Catch-all fallback.
pub fn any() -> impl Fn(&Document) -> bool + Send + Sync + 'static {
    |_| true
}

pub fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::String(s) => !s.is_empty(),
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}
