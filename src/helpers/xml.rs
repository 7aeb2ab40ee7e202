//! Event-level access to the SpreadsheetML parts of a workbook package

use crate::error::Sheet2PgError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown entity reference '&{0};'")]
    UnknownEntity(String),

    #[error("Attribute {name}=\"{value}\" has an unexpected value")]
    InvalidAttribute { name: String, value: String },
}

/// Pull parser over one package part, reusing a single event buffer.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        // <c r="A1"/> must still produce a matching End event
        config.expand_empty_elements = true;
        config.trim_text(false);
        XmlReader { reader, buffer: Vec::with_capacity(1024) }
    }

    /// `None` once the document is exhausted.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, Sheet2PgError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute lookup on a start tag by local name, so `r:id` is found as `id`.
pub(crate) trait ElementAttributes {
    fn attribute(&self, name: &str) -> Result<Option<Cow<'_, str>>, Sheet2PgError>;

    fn parse_attribute<T: FromStr>(&self, name: &str) -> Result<Option<T>, Sheet2PgError>;
}

impl ElementAttributes for BytesStart<'_> {
    fn attribute(&self, name: &str) -> Result<Option<Cow<'_, str>>, Sheet2PgError> {
        for attribute in self.attributes() {
            let attribute = attribute?;
            if attribute.key.local_name().as_ref() == name.as_bytes() {
                return Ok(Some(attribute.unescape_value()?));
            }
        }
        Ok(None)
    }

    fn parse_attribute<T: FromStr>(&self, name: &str) -> Result<Option<T>, Sheet2PgError> {
        let Some(value) = self.attribute(name)? else {
            return Ok(None);
        };
        match value.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(XmlError::InvalidAttribute {
                name: name.to_owned(),
                value: value.into_owned(),
            })?,
        }
    }
}

/// Text accumulation for character content split around references.
pub(crate) trait TextBuffer {
    /// Appends what `&name;`, `&#n;` or `&#xh;` stands for.
    fn push_reference(&mut self, reference: &BytesRef) -> Result<(), Sheet2PgError>;
}

impl TextBuffer for String {
    fn push_reference(&mut self, reference: &BytesRef) -> Result<(), Sheet2PgError> {
        let name = reference.xml_content()?;
        let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
            Some(hex) => Some(u32::from_str_radix(hex, 16)?),
            None => name.strip_prefix('#').map(str::parse::<u32>).transpose()?,
        };
        match code {
            Some(code) => self.extend(char::from_u32(code)),
            None => match resolve_xml_entity(&name) {
                Some(text) => self.push_str(text),
                None => Err(XmlError::UnknownEntity(name.to_string()))?,
            },
        }
        Ok(())
    }
}

/// Drives an `XmlReader` to the end of its document, dispatching each event to
/// the given match arms. Unmatched events are ignored.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
