use once_cell::sync::Lazy;
use regex::Regex;

/// One line of a GEDCOM document, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Line(GedcomLine),
    /// A non-blank line that does not follow `<level> [@ptr@] <TAG> [value]`.
    Unparsed { line_number: usize, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GedcomLine {
    pub line_number: usize,
    pub level: u32,
    pub pointer: Option<String>,
    pub tag: String,
    pub value: Option<String>,
}

impl Token {
    pub fn line_number(&self) -> usize {
        match self {
            Token::Line(line) => line.line_number,
            Token::Unparsed { line_number, .. } => *line_number,
        }
    }
}

// <level> [@pointer@] <TAG> [value]
static LINE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s+(?:(@[^@\s]+@)\s+)?([A-Za-z0-9_]+)(?:[ \t](.*))?$")
        .expect("Invalid regex pattern for GEDCOM lines")
});

/// Tokenize raw GEDCOM bytes.
///
/// Invalid UTF-8 is replaced rather than rejected, a leading byte-order mark is
/// ignored and blank lines are dropped. Never fails: lines outside the grammar
/// come back as [`Token::Unparsed`].
pub fn tokenize(bytes: &[u8]) -> Vec<Token> {
    let text = String::from_utf8_lossy(bytes);
    tokenize_str(&text)
}

pub fn tokenize_str(text: &str) -> Vec<Token> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    text.lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let line = raw.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                return None;
            }
            Some(parse_line(index + 1, line))
        })
        .collect()
}

fn parse_line(line_number: usize, line: &str) -> Token {
    let Some(caps) = LINE_PATTERN.captures(line) else {
        return Token::Unparsed {
            line_number,
            text: line.to_string(),
        };
    };

    let Ok(level) = caps[1].parse::<u32>() else {
        return Token::Unparsed {
            line_number,
            text: line.to_string(),
        };
    };

    let value = caps
        .get(4)
        .map(|m| m.as_str().to_string())
        .filter(|v| !v.is_empty());

    Token::Line(GedcomLine {
        line_number,
        level,
        pointer: caps.get(2).map(|m| m.as_str().to_string()),
        tag: caps[3].to_ascii_uppercase(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(token: &Token) -> &GedcomLine {
        match token {
            Token::Line(line) => line,
            other => panic!("expected a parsed line, got {:?}", other),
        }
    }

    #[test]
    fn test_record_with_pointer() {
        let tokens = tokenize_str("0 @I1@ INDI");
        let parsed = line(&tokens[0]);
        assert_eq!(parsed.level, 0);
        assert_eq!(parsed.pointer.as_deref(), Some("@I1@"));
        assert_eq!(parsed.tag, "INDI");
        assert_eq!(parsed.value, None);
    }

    #[test]
    fn test_value_keeps_inner_spaces() {
        let tokens = tokenize_str("1 NAME John  /Doe/");
        let parsed = line(&tokens[0]);
        assert_eq!(parsed.tag, "NAME");
        assert_eq!(parsed.value.as_deref(), Some("John  /Doe/"));
    }

    #[test]
    fn test_pointer_value_is_not_a_record_pointer() {
        let tokens = tokenize_str("1 HUSB @I1@");
        let parsed = line(&tokens[0]);
        assert_eq!(parsed.pointer, None);
        assert_eq!(parsed.value.as_deref(), Some("@I1@"));
    }

    #[test]
    fn test_crlf_bom_and_blank_lines() {
        let tokens = tokenize("\u{feff}0 HEAD\r\n\r\n1 CHAR UTF-8\r\n0 TRLR\r\n".as_bytes());
        assert_eq!(tokens.len(), 3);
        assert_eq!(line(&tokens[0]).tag, "HEAD");
        assert_eq!(line(&tokens[1]).value.as_deref(), Some("UTF-8"));
        assert_eq!(tokens[2].line_number(), 4);
    }

    #[test]
    fn test_malformed_line_is_kept() {
        let tokens = tokenize_str("0 @I1@ INDI\nthis is not gedcom\n1 SEX M");
        assert_eq!(tokens.len(), 3);
        assert_eq!(
            tokens[1],
            Token::Unparsed {
                line_number: 2,
                text: "this is not gedcom".to_string()
            }
        );
        assert_eq!(line(&tokens[2]).tag, "SEX");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let tokens = tokenize(b"1 NAME Jos\xe9 /Doe/");
        let parsed = line(&tokens[0]);
        assert!(parsed.value.as_deref().unwrap().starts_with("Jos"));
    }
}
