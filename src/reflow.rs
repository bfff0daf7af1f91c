//! Line-break reflow for notes whose newlines were lost.
//!
//! Notes pasted into a single-line field tend to arrive as one long run of
//! text with markdown and code structure squashed together. [`reflow`]
//! walks the text once and puts a line break in front of each structural
//! marker that is not already at the start of a line:
//!
//! - heading markers (`###` and longer runs of `#`)
//! - numbered-list markers (`1.`, `12.`; not decimals such as `3.14`)
//! - bullet markers (`- `)
//! - code fences (three or more backticks)
//! - `import` statements (but not `from x import y`)
//! - `async def` signatures
//!
//! and a line break after
//!
//! - the language tag of an opening code fence (```` ```python ````)
//! - `):` ending a signature, unless only blanks follow on that line
//! - `)` followed by four or more spaces or tabs
//!
//! List and heading markers are left alone inside fenced code. The scanner
//! only ever inserts `\n`, and every rule checks whether that break already
//! exists, so `reflow(reflow(s)) == reflow(s)`.

const FENCE_LANGUAGES: &[&str] = &[
    "bash",
    "c",
    "cpp",
    "css",
    "go",
    "html",
    "java",
    "javascript",
    "js",
    "json",
    "markdown",
    "md",
    "py",
    "python",
    "rs",
    "rust",
    "sh",
    "shell",
    "sql",
    "text",
    "toml",
    "ts",
    "typescript",
    "yaml",
];

/// Insert line breaks around structural markers. See the module docs for
/// the full rule set.
///
/// ```
/// use notebert::reflow::reflow;
///
/// assert_eq!(reflow("para1### heading"), "para1\n### heading");
/// assert_eq!(reflow("a1.b2.c"), "a\n1.b\n2.c");
/// assert_eq!(reflow("nothing to do here"), "nothing to do here");
/// ```
pub fn reflow(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut in_code = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '`' && run_len(&chars, i, '`') >= 3 {
            let n = run_len(&chars, i, '`');
            break_before(&mut out);
            push_chars(&mut out, &chars[i..i + n]);
            i += n;
            in_code = !in_code;

            if in_code && let Some(tag_len) = fence_tag(&chars, i) {
                push_chars(&mut out, &chars[i..i + tag_len]);
                i += tag_len;
                if i < chars.len() && chars[i] != '\n' {
                    out.push('\n');
                }
            }
            continue;
        }

        if !in_code {
            if c == '#' {
                let n = run_len(&chars, i, '#');
                if n >= 3 {
                    break_before(&mut out);
                }
                push_chars(&mut out, &chars[i..i + n]);
                i += n;
                continue;
            }

            if c.is_ascii_digit() {
                let n = digit_run(&chars, i);
                if is_list_number(&chars, i, n, &out) {
                    break_before(&mut out);
                }
                push_chars(&mut out, &chars[i..i + n]);
                i += n;
                continue;
            }

            if c == '-' && chars.get(i + 1) == Some(&' ') && !out.ends_with('-')
            {
                break_before(&mut out);
                out.push('-');
                i += 1;
                continue;
            }
        }

        if starts_with(&chars, i, "async def ") && at_word_start(&out) {
            break_before(&mut out);
            out.push_str("async def ");
            i += "async def ".len();
            continue;
        }

        if starts_with(&chars, i, "import ")
            && at_word_start(&out)
            && !current_line(&out).trim_start().starts_with("from ")
        {
            break_before(&mut out);
            out.push_str("import ");
            i += "import ".len();
            continue;
        }

        if c == ')' {
            out.push(')');
            i += 1;
            if chars.get(i) == Some(&':') {
                out.push(':');
                i += 1;
                if !rest_of_line_blank(&chars, i) {
                    out.push('\n');
                }
            } else if blank_run(&chars, i) >= 4 {
                out.push('\n');
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

fn break_before(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn push_chars(out: &mut String, chars: &[char]) {
    out.extend(chars.iter());
}

fn run_len(chars: &[char], start: usize, c: char) -> usize {
    chars[start..].iter().take_while(|&&x| x == c).count()
}

fn digit_run(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .count()
}

fn blank_run(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .take_while(|&&c| c == ' ' || c == '\t')
        .count()
}

fn rest_of_line_blank(chars: &[char], start: usize) -> bool {
    let n = blank_run(chars, start);
    matches!(chars.get(start + n), None | Some('\n'))
}

fn starts_with(chars: &[char], start: usize, pattern: &str) -> bool {
    let mut idx = start;
    for p in pattern.chars() {
        if chars.get(idx) != Some(&p) {
            return false;
        }
        idx += 1;
    }
    true
}

/// A digit run followed by `.` and then something other than a digit, and
/// not itself the tail of a number like `3.14`.
fn is_list_number(chars: &[char], start: usize, len: usize, out: &str) -> bool {
    if out.ends_with(|c: char| c.is_ascii_digit() || c == '.') {
        return false;
    }
    chars.get(start + len) == Some(&'.')
        && !chars.get(start + len + 1).is_some_and(|c| c.is_ascii_digit())
}

fn at_word_start(out: &str) -> bool {
    !out.ends_with(|c: char| c.is_alphanumeric() || c == '_')
}

fn current_line(out: &str) -> &str {
    out.rfind('\n').map_or(out, |pos| &out[pos + 1..])
}

/// Length of a recognised language tag starting at `start`, if any.
fn fence_tag(chars: &[char], start: usize) -> Option<usize> {
    let len = chars[start..]
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric())
        .count();
    if len == 0 {
        return None;
    }
    let tag: String = chars[start..start + len]
        .iter()
        .collect::<String>()
        .to_ascii_lowercase();
    FENCE_LANGUAGES.contains(&tag.as_str()).then_some(len)
}
