//! Sanitizes strings derived from uncontrolled browser data (tab titles,
//! URLs, extension names) into names safe to use as a filesystem path
//! segment (§4.5).

const MAX_LEN: usize = 200;

const RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

fn is_illegal(c: char) -> bool {
    matches!(c, '/' | '\\' | '?' | '*' | '<' | '>' | ':' | '|' | '"' | ' ') || c.is_control()
}

/// Sanitizes `raw` into a filesystem-safe name. Always produces a
/// non-empty, printable result.
pub fn sanitize(raw: &str) -> String {
    let replaced: String = raw.chars().map(|c| if is_illegal(c) { '_' } else { c }).collect();

    let replaced = if replaced.chars().all(|c| c == '.') {
        "_".repeat(replaced.chars().count().max(1))
    } else {
        replaced
    };

    let trimmed = replaced.trim_end_matches(['.', ' ']);
    let trimmed = if trimmed.is_empty() { "_" } else { trimmed };

    let base = trimmed.split('.').next().unwrap_or(trimmed);
    let name = if RESERVED.iter().any(|r| r.eq_ignore_ascii_case(base)) {
        format!("{trimmed}_")
    } else {
        trimmed.to_string()
    };

    name.chars().take(MAX_LEN).collect()
}
