use super::tokenizer::{GedcomLine, Token};
use crate::database::entities::events::EventType;

/// GEDCOM tags the importer and exporter know about. Anything else is kept
/// verbatim in [`Tag::Other`] so nothing in the file is lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Head,
    Trailer,
    Individual,
    Family,
    Source,
    Note,
    Name,
    Given,
    Surname,
    Sex,
    Birth,
    Death,
    Burial,
    Marriage,
    Date,
    Place,
    Husband,
    Wife,
    Child,
    Title,
    Author,
    Publication,
    Repository,
    Continuation,
    Concatenation,
    /// A line that did not match the GEDCOM grammar.
    Unparsed,
    Other(String),
}

impl Tag {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "HEAD" => Tag::Head,
            "TRLR" => Tag::Trailer,
            "INDI" => Tag::Individual,
            "FAM" => Tag::Family,
            "SOUR" => Tag::Source,
            "NOTE" => Tag::Note,
            "NAME" => Tag::Name,
            "GIVN" => Tag::Given,
            "SURN" => Tag::Surname,
            "SEX" => Tag::Sex,
            "BIRT" => Tag::Birth,
            "DEAT" => Tag::Death,
            "BURI" => Tag::Burial,
            "MARR" => Tag::Marriage,
            "DATE" => Tag::Date,
            "PLAC" => Tag::Place,
            "HUSB" => Tag::Husband,
            "WIFE" => Tag::Wife,
            "CHIL" => Tag::Child,
            "TITL" => Tag::Title,
            "AUTH" => Tag::Author,
            "PUBL" => Tag::Publication,
            "REPO" => Tag::Repository,
            "CONT" => Tag::Continuation,
            "CONC" => Tag::Concatenation,
            other => Tag::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Tag::Head => "HEAD",
            Tag::Trailer => "TRLR",
            Tag::Individual => "INDI",
            Tag::Family => "FAM",
            Tag::Source => "SOUR",
            Tag::Note => "NOTE",
            Tag::Name => "NAME",
            Tag::Given => "GIVN",
            Tag::Surname => "SURN",
            Tag::Sex => "SEX",
            Tag::Birth => "BIRT",
            Tag::Death => "DEAT",
            Tag::Burial => "BURI",
            Tag::Marriage => "MARR",
            Tag::Date => "DATE",
            Tag::Place => "PLAC",
            Tag::Husband => "HUSB",
            Tag::Wife => "WIFE",
            Tag::Child => "CHIL",
            Tag::Title => "TITL",
            Tag::Author => "AUTH",
            Tag::Publication => "PUBL",
            Tag::Repository => "REPO",
            Tag::Continuation => "CONT",
            Tag::Concatenation => "CONC",
            Tag::Unparsed => "",
            Tag::Other(tag) => tag,
        }
    }

    pub fn event_type(&self) -> Option<EventType> {
        match self {
            Tag::Birth => Some(EventType::Birth),
            Tag::Death => Some(EventType::Death),
            Tag::Burial => Some(EventType::Burial),
            Tag::Marriage => Some(EventType::Marriage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub level: u32,
    pub pointer: Option<String>,
    pub tag: Tag,
    pub value: Option<String>,
    pub children: Vec<Element>,
    pub line_number: usize,
}

impl Element {
    fn from_line(line: GedcomLine) -> Self {
        Self {
            level: line.level,
            pointer: line.pointer,
            tag: Tag::parse(&line.tag),
            value: line.value,
            children: Vec::new(),
            line_number: line.line_number,
        }
    }

    fn unparsed(level: u32, line_number: usize, text: String) -> Self {
        Self {
            level,
            pointer: None,
            tag: Tag::Unparsed,
            value: Some(text),
            children: Vec::new(),
            line_number,
        }
    }

    pub fn first_child(&self, tag: &Tag) -> Option<&Element> {
        self.children.iter().find(|child| &child.tag == tag)
    }

    pub fn children_with(&self, tag: Tag) -> impl Iterator<Item = &Element> + '_ {
        self.children.iter().filter(move |child| child.tag == tag)
    }

    /// Trimmed value of the first child with `tag`; empty values count as absent.
    pub fn child_value(&self, tag: &Tag) -> Option<&str> {
        self.first_child(tag)
            .and_then(|child| child.value.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Direct `BIRT`/`DEAT`/`BURI`/`MARR` sub-records, in file order.
    pub fn event_children(&self) -> impl Iterator<Item = (EventType, &Element)> {
        self.children
            .iter()
            .filter_map(|child| child.tag.event_type().map(|kind| (kind, child)))
    }

    /// The element's value with `CONT` (new line) and `CONC` (same line)
    /// children folded in.
    pub fn text(&self) -> Option<String> {
        let mut text = self.value.clone().unwrap_or_default();
        for child in &self.children {
            match child.tag {
                Tag::Continuation => {
                    text.push('\n');
                    text.push_str(child.value.as_deref().unwrap_or(""));
                }
                Tag::Concatenation => text.push_str(child.value.as_deref().unwrap_or("")),
                _ => {}
            }
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Pointer-valued children with `tag` (`@X1@`), ignoring inline text.
    pub fn pointer_children(&self, tag: Tag) -> impl Iterator<Item = &str> + '_ {
        self.children_with(tag)
            .filter_map(|child| child.value.as_deref().map(str::trim))
            .filter(|value| is_pointer(value))
    }
}

pub fn is_pointer(value: &str) -> bool {
    value.len() > 2 && value.starts_with('@') && value.ends_with('@')
}

/// A top-level record, typed by its tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Individual(IndividualElement),
    Family(FamilyElement),
    Source(SourceElement),
    Note(NoteElement),
    Generic(Element),
}

impl Record {
    fn from_element(element: Element) -> Self {
        match element.tag {
            Tag::Individual => Record::Individual(IndividualElement(element)),
            Tag::Family => Record::Family(FamilyElement(element)),
            Tag::Source => Record::Source(SourceElement(element)),
            Tag::Note => Record::Note(NoteElement(element)),
            _ => Record::Generic(element),
        }
    }

    pub fn element(&self) -> &Element {
        match self {
            Record::Individual(record) => &record.0,
            Record::Family(record) => &record.0,
            Record::Source(record) => &record.0,
            Record::Note(record) => &record.0,
            Record::Generic(element) => element,
        }
    }

    pub fn pointer(&self) -> Option<&str> {
        self.element().pointer.as_deref()
    }
}

/// A note attached to an individual or family: either a pointer to a
/// top-level `NOTE` record or text written inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteRef {
    Pointer(String),
    Inline(String),
}

fn note_refs(element: &Element) -> Vec<NoteRef> {
    element
        .children_with(Tag::Note)
        .filter_map(|note| {
            let value = note.value.as_deref().map(str::trim).unwrap_or("");
            if is_pointer(value) {
                Some(NoteRef::Pointer(value.to_string()))
            } else {
                note.text().map(NoteRef::Inline)
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndividualElement(pub Element);

impl IndividualElement {
    pub fn pointer(&self) -> Option<&str> {
        self.0.pointer.as_deref()
    }

    /// Given name and surname with the slashes removed. Falls back to `GIVN`
    /// and `SURN` sub-records when the `NAME` value has no surname part.
    pub fn name(&self) -> (Option<String>, Option<String>) {
        let Some(name) = self.0.first_child(&Tag::Name) else {
            return (None, None);
        };

        let raw = name.value.as_deref().unwrap_or("");
        let (given, surname) = match raw.split_once('/') {
            // Anything after the closing slash (Jr, III) is dropped.
            Some((given, rest)) => {
                let surname = rest.split_once('/').map_or(rest, |(surname, _)| surname);
                (clean_name(given), clean_name(surname))
            }
            None => (clean_name(raw), None),
        };

        (
            given.or_else(|| name.child_value(&Tag::Given).and_then(clean_name)),
            surname.or_else(|| name.child_value(&Tag::Surname).and_then(clean_name)),
        )
    }

    pub fn sex(&self) -> Option<&str> {
        self.0.child_value(&Tag::Sex)
    }

    pub fn events(&self) -> impl Iterator<Item = (EventType, &Element)> {
        self.0
            .event_children()
            .filter(|(kind, _)| *kind != EventType::Marriage)
    }

    pub fn source_pointers(&self) -> impl Iterator<Item = &str> {
        self.0.pointer_children(Tag::Source)
    }

    pub fn notes(&self) -> Vec<NoteRef> {
        note_refs(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FamilyElement(pub Element);

impl FamilyElement {
    pub fn pointer(&self) -> Option<&str> {
        self.0.pointer.as_deref()
    }

    pub fn husband(&self) -> Option<&str> {
        self.0.child_value(&Tag::Husband)
    }

    pub fn wife(&self) -> Option<&str> {
        self.0.child_value(&Tag::Wife)
    }

    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.0
            .children_with(Tag::Child)
            .filter_map(|child| child.value.as_deref().map(str::trim))
            .filter(|value| !value.is_empty())
    }

    pub fn marriages(&self) -> impl Iterator<Item = &Element> {
        self.0
            .event_children()
            .filter(|(kind, _)| *kind == EventType::Marriage)
            .map(|(_, element)| element)
    }

    pub fn source_pointers(&self) -> impl Iterator<Item = &str> {
        self.0.pointer_children(Tag::Source)
    }

    pub fn notes(&self) -> Vec<NoteRef> {
        note_refs(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceElement(pub Element);

impl SourceElement {
    pub fn pointer(&self) -> Option<&str> {
        self.0.pointer.as_deref()
    }

    pub fn title(&self) -> Option<String> {
        self.0.first_child(&Tag::Title).and_then(Element::text)
    }

    pub fn author(&self) -> Option<String> {
        self.0.first_child(&Tag::Author).and_then(Element::text)
    }

    pub fn publication(&self) -> Option<String> {
        self.0.first_child(&Tag::Publication).and_then(Element::text)
    }

    pub fn repository(&self) -> Option<String> {
        self.0.first_child(&Tag::Repository).and_then(Element::text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteElement(pub Element);

impl NoteElement {
    pub fn pointer(&self) -> Option<&str> {
        self.0.pointer.as_deref()
    }

    pub fn text(&self) -> Option<String> {
        self.0.text()
    }
}

/// Remove GEDCOM surname slashes and surrounding whitespace.
pub fn clean_name(name: &str) -> Option<String> {
    let cleaned = name
        .replace('/', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Parsed GEDCOM document: top-level records in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GedcomDocument {
    pub records: Vec<Record>,
}

impl GedcomDocument {
    /// Nest tokens by level. A line becomes a child of the closest preceding
    /// line whose level is lower; unparsed lines attach to whatever record is
    /// open at that point.
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let mut roots: Vec<Element> = Vec::new();
        let mut stack: Vec<Element> = Vec::new();

        for token in tokens {
            let element = match token {
                Token::Line(line) => Element::from_line(line),
                Token::Unparsed { line_number, text } => {
                    let level = stack.last().map(|open| open.level + 1).unwrap_or(0);
                    Element::unparsed(level, line_number, text)
                }
            };

            while stack.last().is_some_and(|open| open.level >= element.level) {
                close_top(&mut stack, &mut roots);
            }

            if element.tag == Tag::Unparsed {
                // Leaves only; never a parent.
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => roots.push(element),
                }
            } else {
                stack.push(element);
            }
        }

        while !stack.is_empty() {
            close_top(&mut stack, &mut roots);
        }

        Self {
            records: roots.into_iter().map(Record::from_element).collect(),
        }
    }

    pub fn parse(bytes: &[u8]) -> Self {
        Self::from_tokens(super::tokenizer::tokenize(bytes))
    }

    pub fn individuals(&self) -> impl Iterator<Item = &IndividualElement> {
        self.records.iter().filter_map(|record| match record {
            Record::Individual(individual) => Some(individual),
            _ => None,
        })
    }

    pub fn families(&self) -> impl Iterator<Item = &FamilyElement> {
        self.records.iter().filter_map(|record| match record {
            Record::Family(family) => Some(family),
            _ => None,
        })
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceElement> {
        self.records.iter().filter_map(|record| match record {
            Record::Source(source) => Some(source),
            _ => None,
        })
    }

    pub fn notes(&self) -> impl Iterator<Item = &NoteElement> {
        self.records.iter().filter_map(|record| match record {
            Record::Note(note) => Some(note),
            _ => None,
        })
    }

    /// Level-0 records other than stray unparsed lines.
    pub fn top_level_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.element().tag != Tag::Unparsed)
            .count()
    }
}

fn close_top(stack: &mut Vec<Element>, roots: &mut Vec<Element>) {
    if let Some(done) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}
