//! Collapse a multi-line answer into one comparable line

/// Separator placed between surviving lines
pub const LINE_SEPARATOR: &str = " // ";

/// Trim every line, drop the blank ones and join the rest with ` // `.
///
/// Normalizing an already normalized string returns it unchanged.
pub fn normalize(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(LINE_SEPARATOR)
}
