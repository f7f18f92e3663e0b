//! Plain-text rendering for leadsync
//!
//! Every renderer builds lines of text from domain data and returns them; the
//! binary decides where they go. Nothing here touches the network or cache.

pub mod lead_detail;
pub mod lead_list;
pub mod task_board;

pub use lead_detail::render as render_lead_detail;
pub use lead_list::{render_cache_info, render_lead_page, render_merge, render_summary};
pub use task_board::render as render_task_board;

/// Truncates `s` to `width` characters, ending with `…` when cut
pub(crate) fn fit(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Formats a rupee amount with thousands separators
pub(crate) fn format_value(value: f64) -> String {
    let whole = value.round() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if whole < 0 {
        format!("-₹{}", grouped)
    } else {
        format!("₹{}", grouped)
    }
}
