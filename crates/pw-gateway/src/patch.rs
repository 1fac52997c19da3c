// patch.rs — Strict unified-diff application.
//
// G4 materializes patched content in memory before any gate sees it.
// Application is strict: every context and deletion line must match the
// original at the position the hunk header names; any failing hunk aborts
// the whole patch. An empty patch is a no-op that returns the original
// unchanged.

use crate::error::GatewayError;

#[derive(Debug)]
struct Hunk {
    /// 1-based start line in the original (0 for insert-into-empty).
    old_start: usize,
    lines: Vec<HunkLine>,
}

#[derive(Debug)]
enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

/// Apply a unified diff to `original`, returning the patched content.
pub fn apply_patch(original: &str, patch: &str) -> Result<String, GatewayError> {
    let hunks = parse_patch(patch)?;
    if hunks.is_empty() {
        return Ok(original.to_string());
    }

    let old_lines: Vec<&str> = original.lines().collect();
    let mut out: Vec<String> = Vec::new();
    let mut cursor = 0usize; // 0-based index into old_lines

    for (hunk_no, hunk) in hunks.iter().enumerate() {
        let start = hunk.old_start.saturating_sub(1);
        if start < cursor {
            return Err(GatewayError::PatchFailed(format!(
                "hunk {} overlaps the previous hunk",
                hunk_no + 1
            )));
        }
        if start > old_lines.len() {
            return Err(GatewayError::PatchFailed(format!(
                "hunk {} starts past the end of the file (line {})",
                hunk_no + 1,
                hunk.old_start
            )));
        }

        // Copy untouched lines up to the hunk.
        out.extend(old_lines[cursor..start].iter().map(|s| s.to_string()));
        cursor = start;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(text) => {
                    if old_lines.get(cursor) != Some(&text.as_str()) {
                        return Err(GatewayError::PatchFailed(format!(
                            "hunk {}: context mismatch at line {}",
                            hunk_no + 1,
                            cursor + 1
                        )));
                    }
                    out.push(text.clone());
                    cursor += 1;
                }
                HunkLine::Remove(text) => {
                    if old_lines.get(cursor) != Some(&text.as_str()) {
                        return Err(GatewayError::PatchFailed(format!(
                            "hunk {}: removal mismatch at line {}",
                            hunk_no + 1,
                            cursor + 1
                        )));
                    }
                    cursor += 1;
                }
                HunkLine::Add(text) => out.push(text.clone()),
            }
        }
    }

    // Copy the tail after the last hunk.
    out.extend(old_lines[cursor..].iter().map(|s| s.to_string()));

    let mut result = out.join("\n");
    // Line-based joining drops the final newline; restore it unless the
    // original was newline-free and the patch added nothing after it.
    if !result.is_empty() && (original.is_empty() || original.ends_with('\n')) {
        result.push('\n');
    }
    Ok(result)
}

fn parse_patch(patch: &str) -> Result<Vec<Hunk>, GatewayError> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for line in patch.lines() {
        if line.starts_with("--- ") || line.starts_with("+++ ") || line.starts_with("diff ") {
            continue;
        }
        if line.starts_with("\\ No newline") {
            continue;
        }
        if let Some(header) = line.strip_prefix("@@") {
            hunks.push(Hunk {
                old_start: parse_hunk_header(header)?,
                lines: Vec::new(),
            });
            continue;
        }
        if line.is_empty() && hunks.is_empty() {
            continue;
        }

        let Some(hunk) = hunks.last_mut() else {
            return Err(GatewayError::PatchFailed(format!(
                "content before first hunk header: '{}'",
                line
            )));
        };
        let (tag, text) = line.split_at(if line.is_empty() { 0 } else { 1 });
        match tag {
            " " => hunk.lines.push(HunkLine::Context(text.to_string())),
            "-" => hunk.lines.push(HunkLine::Remove(text.to_string())),
            "+" => hunk.lines.push(HunkLine::Add(text.to_string())),
            // A bare empty line inside a hunk is empty context.
            "" => hunk.lines.push(HunkLine::Context(String::new())),
            other => {
                return Err(GatewayError::PatchFailed(format!(
                    "unrecognized hunk line prefix '{}'",
                    other
                )))
            }
        }
    }

    Ok(hunks)
}

/// Parse `" -l[,c] +l[,c] @@..."` and return the old start line.
fn parse_hunk_header(header: &str) -> Result<usize, GatewayError> {
    let header = header.trim_start();
    let old = header
        .split_whitespace()
        .next()
        .and_then(|tok| tok.strip_prefix('-'))
        .ok_or_else(|| {
            GatewayError::PatchFailed(format!("malformed hunk header '@@{}'", header))
        })?;
    let start = old.split(',').next().unwrap_or(old);
    start.parse::<usize>().map_err(|_| {
        GatewayError::PatchFailed(format!("malformed hunk header '@@{}'", header))
    })
}
