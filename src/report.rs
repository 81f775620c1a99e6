// 🧾 Standard report text for the latest entry

use crate::entry::DailyEntry;

/// Fixed-template sentence: signed surplus in liters and signed margin, two decimals each.
pub fn daily_report(entry: &DailyEntry) -> String {
    format!(
        "Good afternoon, diesel control: we have a surplus of {} lt with a margin of error of {}%.",
        signed_2dp(entry.difference_lt),
        signed_2dp(entry.error_margin_pct)
    )
}

pub fn latest_report(entries: &[DailyEntry]) -> Option<String> {
    entries.last().map(daily_report)
}

/// `+5.00` / `-10.00`. Anything that rounds to zero prints as `+0.00`.
pub fn signed_2dp(value: f64) -> String {
    let rounded = format!("{:.2}", value);
    if rounded.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
        return "+0.00".to_string();
    }
    format!("{:+.2}", value)
}
