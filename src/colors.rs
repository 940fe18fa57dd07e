// ANSI color codes for the console notification sink
pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";

pub const SEPARATOR: &str = "\x1b[90m──────────────────────────────────────────\x1b[0m";
