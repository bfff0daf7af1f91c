/// Maximum number of characters in a one-line note preview.
pub const DEFAULT_PREVIEW_CHARS: usize = 72;

/// First non-blank line of `text`, cut to `max_chars` characters with a
/// trailing `...` when it was longer or when more lines follow.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.next() else {
        return String::new();
    };

    let mut out: String = first.chars().take(max_chars).collect();
    if first.chars().count() > max_chars || lines.next().is_some() {
        out.push_str("...");
    }
    out
}

/// Prefix each line with its 1-indexed line number.
pub fn add_line_numbers(text: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}
