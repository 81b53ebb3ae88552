//! Compact output rendering helpers for CLI surfaces.

use colored::Colorize;

/// Collapse whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Render a similarity score with a color cue relative to the threshold.
pub fn render_similarity(sim: f64, threshold: f64) -> String {
    let text = format!("{:.4}", sim);
    if sim >= threshold {
        text.green().to_string()
    } else {
        text.dimmed().to_string()
    }
}
