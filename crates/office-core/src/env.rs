//! Environment variable utilities
//!
//! Every knob of the simulator and the binaries is an `OFFICE_*` variable.
//! Unset or unparsable values fall back to the caller's default.
//!
//! ```ignore
//! use office_core::env::{env_get, env_get_bool, env_get_millis};
//!
//! let secs: u64 = env_get("OFFICE_RUN_SECS", 30);
//! let flush = env_get_bool("OFFICE_FLUSH_EPRINT", false);
//! let patience = env_get_millis("OFFICE_PATIENCE_MS");
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Get environment variable parsed as type T, or return default
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as optional value
///
/// `None` if unset or if it does not parse.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
///
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true; any other
/// set value is false. Unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Milliseconds as a `Duration`, `None` if unset or invalid
#[inline]
pub fn env_get_millis(key: &str) -> Option<Duration> {
    env_get_opt::<u64>(key).map(Duration::from_millis)
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var(key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns its variable names; tests run in parallel.

    #[test]
    fn test_unset_defaults() {
        let key = "__OFFICE_TEST_UNSET__";
        assert_eq!(env_get::<usize>(key, 42), 42);
        assert_eq!(env_get_opt::<usize>(key), None);
        assert!(env_get_bool(key, true));
        assert_eq!(env_get_str(key, "hello"), "hello");
        assert_eq!(env_get_millis(key), None);
        assert!(!env_is_set(key));
    }

    #[test]
    fn test_parse_and_trim() {
        std::env::set_var("__OFFICE_TEST_NUM__", " 123 ");
        assert_eq!(env_get::<u32>("__OFFICE_TEST_NUM__", 0), 123);
        assert_eq!(env_get_millis("__OFFICE_TEST_NUM__"), Some(Duration::from_millis(123)));
        std::env::remove_var("__OFFICE_TEST_NUM__");
    }

    #[test]
    fn test_invalid_falls_back() {
        std::env::set_var("__OFFICE_TEST_BAD__", "soon");
        assert_eq!(env_get::<u64>("__OFFICE_TEST_BAD__", 9), 9);
        assert!(env_is_set("__OFFICE_TEST_BAD__"));
        std::env::remove_var("__OFFICE_TEST_BAD__");
    }

    #[test]
    fn test_bool_variants() {
        let key = "__OFFICE_TEST_BOOL__";
        for yes in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var(key, yes);
            assert!(env_get_bool(key, false), "{}", yes);
        }
        for no in ["0", "false", "garbage"] {
            std::env::set_var(key, no);
            assert!(!env_get_bool(key, true), "{}", no);
        }
        std::env::remove_var(key);
    }
}
