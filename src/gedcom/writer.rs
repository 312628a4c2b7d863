use chrono::NaiveDate;

use super::date::format_date;

/// Line-oriented GEDCOM builder. Multi-line values are split into `CONT`
/// lines one level down.
#[derive(Debug, Default)]
pub struct GedcomWriter {
    lines: Vec<String>,
}

impl GedcomWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pointer: &str, tag: &str) -> &mut Self {
        self.lines.push(format!("0 {} {}", pointer, tag));
        self
    }

    pub fn tag(&mut self, level: u32, tag: &str) -> &mut Self {
        self.lines.push(format!("{} {}", level, tag));
        self
    }

    pub fn line(&mut self, level: u32, tag: &str, value: &str) -> &mut Self {
        let mut parts = value.split('\n');
        let first = parts.next().unwrap_or("").trim_end_matches('\r');
        if first.is_empty() {
            self.lines.push(format!("{} {}", level, tag));
        } else {
            self.lines.push(format!("{} {} {}", level, tag, first));
        }
        for rest in parts {
            let rest = rest.trim_end_matches('\r');
            if rest.is_empty() {
                self.lines.push(format!("{} CONT", level + 1));
            } else {
                self.lines.push(format!("{} CONT {}", level + 1, rest));
            }
        }
        self
    }

    /// Write `tag value` only when the value has content.
    pub fn optional(&mut self, level: u32, tag: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.line(level, tag, value);
        }
        self
    }

    pub fn date(&mut self, level: u32, date: Option<&NaiveDate>) -> &mut Self {
        if let Some(date) = date {
            self.line(level, "DATE", &format_date(date));
        }
        self
    }

    /// Header block: GEDCOM 5.5.1, lineage-linked, UTF-8.
    pub fn header(&mut self, version: &str, today: &NaiveDate) -> &mut Self {
        self.lines.push("0 HEAD".to_string());
        self.line(1, "SOUR", "YGGDRASIL")
            .line(2, "VERS", version)
            .line(2, "NAME", "Yggdrasil")
            .date(1, Some(today))
            .tag(1, "GEDC")
            .line(2, "VERS", "5.5.1")
            .line(2, "FORM", "LINEAGE-LINKED")
            .line(1, "CHAR", "UTF-8")
    }

    /// Close the document with `0 TRLR` and join it. No trailing newline.
    pub fn finish(mut self) -> String {
        self.lines.push("0 TRLR".to_string());
        self.lines.join("\n")
    }
}

/// `First /Last/` as written in a GEDCOM `NAME` line.
pub fn format_name(first: Option<&str>, last: Option<&str>) -> String {
    let first = first.map(str::trim).unwrap_or("");
    let last = last.map(str::trim).unwrap_or("");
    match (first.is_empty(), last.is_empty()) {
        (_, true) => first.to_string(),
        (true, false) => format!("/{}/", last),
        (false, false) => format!("{} /{}/", first, last),
    }
}
