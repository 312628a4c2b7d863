//! GEDCOM text handling: tokenizing, building the element tree, normalizing
//! dates and writing documents back out.
//!
//! Parsing never fails. Malformed lines survive as [`Tag::Unparsed`] leaves
//! and it is up to the importer to decide whether anything usable remains.

pub mod date;
pub mod element;
pub mod tokenizer;
pub mod writer;

pub use date::{format_date, parse_date};
pub use element::{
    clean_name, Element, FamilyElement, GedcomDocument, IndividualElement, NoteElement, NoteRef,
    Record, SourceElement, Tag,
};
pub use tokenizer::{tokenize, GedcomLine, Token};
pub use writer::{format_name, GedcomWriter};
