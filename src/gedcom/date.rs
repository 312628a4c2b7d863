use chrono::{Datelike, NaiveDate};

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Normalize a free-text GEDCOM date.
///
/// Tries `day month year`, then `month year`, then `year`. Partial dates
/// resolve to the first day of the period. Anything else, including
/// qualified dates such as `ABT 1900` or `BET 1900 AND 1910`, is unknown.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(&text, "%d %b %Y") {
        return Some(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {}", text), "%d %b %Y") {
        return Some(date);
    }

    parse_year(&text).and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
}

fn parse_year(text: &str) -> Option<i32> {
    if text.is_empty() || text.len() > 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<i32>().ok().filter(|year| *year > 0)
}

/// Render a date the way GEDCOM writes it: `DD MON YYYY`.
pub fn format_date(date: &NaiveDate) -> String {
    format!(
        "{:02} {} {:04}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}
