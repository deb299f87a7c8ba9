//! Code-fence extraction.
//!
//! Models asked for raw code frequently wrap it in a Markdown fence with a
//! language tag. `strip_code_fence` unwraps that one outer fence and leaves
//! everything else alone.

/// Strip a single outer Markdown code fence from `text`.
///
/// If the trimmed text starts with a triple-backtick fence (with an
/// optional language tag) and ends with a closing fence, the interior is
/// returned, keeping the newline after the tag. Anything else comes back
/// unchanged, including unterminated fences.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return text;
    };
    let Some(interior) = rest.strip_suffix("```") else {
        return text;
    };
    // The language tag runs to the end of the fence line.
    match interior.find('\n') {
        Some(tag_end) if !interior[..tag_end].contains("```") => &interior[tag_end..],
        _ => text,
    }
}
