//! Output mode flags shared by every subcommand.
//!
//! `main` publishes the global flags through environment variables so any
//! command can check them without threading them through.

pub const JSON_ENV: &str = "LEADLENS_JSON";
pub const VERBOSE_ENV: &str = "LEADLENS_VERBOSE";

pub fn is_json() -> bool {
    std::env::var_os(JSON_ENV).is_some()
}

pub fn is_verbose() -> bool {
    std::env::var_os(VERBOSE_ENV).is_some()
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}
