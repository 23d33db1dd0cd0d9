//! Debug formatting helpers for [`custom_debug_derive`].
//!
//! Sessions end up in spans and error logs, so anything identifying is
//! shortened before it reaches a formatter.

use std::fmt;

/// Prints the inner value of an `Option` without the `Some(...)` wrapper.
///
/// Pair with `#[debug(skip_if = Option::is_none)]`.
pub fn opt<T: fmt::Debug>(value: &Option<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Some(inner) => fmt::Debug::fmt(inner, f),
        None => f.write_str("None"),
    }
}

/// Masks the local part of an email address, keeping its first character
/// and the domain: `alice@example.com` prints as `a***@example.com`.
#[allow(clippy::ptr_arg)]
pub fn email(value: &String, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&mask_email(value))
}

fn mask_email(value: &str) -> String {
    match value.split_once('@') {
        Some((local, domain)) => match local.chars().next() {
            Some(first) => format!("{first}***@{domain}"),
            None => format!("***@{domain}"),
        },
        None => "***".to_owned(),
    }
}
