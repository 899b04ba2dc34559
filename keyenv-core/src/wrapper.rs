//! Secure notes come in two shapes depending on who wrote them.
//!
//! Keychain Access stores the note as an XML property list and keeps the text in the
//! `NOTE` field. Notes written with `security add-generic-password` are stored as-is.

use std::{borrow::Cow, io::Cursor};

/// Doctype line Keychain Access puts in front of every interactively written note
pub const PLIST_PREAMBLE: &str = r#"<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">"#;

const NOTE_FIELD: &str = "NOTE";

#[derive(thiserror::Error, Debug)]
pub enum MalformedRecordError {
    #[error("Secure note looks like a property list but could not be parsed: {0}")]
    Plist(#[from] plist::Error),
    #[error("Secure note property list is not a dictionary")]
    NotADictionary,
    #[error("Secure note property list has no `NOTE` text")]
    MissingNote,
}

/// Returns the note text, stripping the property list wrapper if there is one.
///
/// Once the preamble is present the wrapper must yield a `NOTE` string; falling back to the
/// raw text would apply the XML markup as configuration.
pub fn unwrap_note(text: &str) -> Result<Cow<'_, str>, MalformedRecordError> {
    if !text.contains(PLIST_PREAMBLE) {
        return Ok(Cow::Borrowed(text));
    }

    let value = plist::Value::from_reader_xml(Cursor::new(text.as_bytes()))?;
    let note = value
        .as_dictionary()
        .ok_or(MalformedRecordError::NotADictionary)?
        .get(NOTE_FIELD)
        .and_then(plist::Value::as_string)
        .ok_or(MalformedRecordError::MissingNote)?;

    Ok(Cow::Owned(note.to_owned()))
}
