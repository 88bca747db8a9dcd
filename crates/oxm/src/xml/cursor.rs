//! Forward-only token cursor over a namespace-aware quick-xml reader.
//!
//! The cursor hides the reader details the decoder does not care about:
//! comments, processing instructions and declarations are dropped, adjacent
//! text and entity references are merged into one [`Token::Text`] kept
//! verbatim (whitespace-only runs disappear), and an empty element becomes a
//! [`Token::Start`] followed by a synthesised [`Token::End`].

use std::collections::VecDeque;
use std::fmt;
use std::io::BufRead;

use quick_xml::NsReader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;

use crate::error::{Result, StructuralError};

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub qname: String,
    pub local_name: String,
    pub namespace: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartTag {
    pub qname: String,
    pub local_name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<XmlAttribute>,
}

impl StartTag {
    /// Attribute value by qualified or local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.qname == name)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|a| a.namespace.is_none() && a.local_name == name)
            })
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Start(StartTag),
    End { qname: String, local_name: String },
    Text(String),
    CData(String),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Start(start) => write!(f, "start of <{}>", start.qname),
            Token::End { qname, .. } => write!(f, "end of <{}>", qname),
            Token::Text(_) => f.write_str("text"),
            Token::CData(_) => f.write_str("CDATA section"),
            Token::Eof => f.write_str("end of document"),
        }
    }
}

pub struct XmlCursor<R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    current: Token,
    pending: VecDeque<Token>,
    depth: usize,
}

impl<R: BufRead> XmlCursor<R> {
    /// Creates a cursor positioned before the first token; call
    /// [`XmlCursor::advance`] to read it.
    pub fn new(reader: R) -> Self {
        Self {
            reader: NsReader::from_reader(reader),
            buf: Vec::new(),
            current: Token::Eof,
            pending: VecDeque::new(),
            depth: 0,
        }
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Next token, without moving the cursor.
    pub fn peek(&mut self) -> Result<&Token> {
        if self.pending.is_empty() {
            let token = self.read_token()?;
            self.pending.push_front(token);
        }
        Ok(&self.pending[0])
    }

    pub fn advance(&mut self) -> Result<&Token> {
        let token = self.read_token()?;
        match &token {
            Token::Start(_) => self.depth += 1,
            Token::End { .. } => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        self.current = token;
        Ok(&self.current)
    }

    /// Advances to the next start tag (or the end of the document).
    pub fn advance_to_start(&mut self) -> Result<&Token> {
        loop {
            if matches!(self.advance()?, Token::Start(_) | Token::Eof) {
                return Ok(&self.current);
            }
        }
    }

    /// From a start tag, moves to its matching end tag.
    pub fn skip_element(&mut self) -> Result<()> {
        let Token::Start(start) = &self.current else {
            return Err(self.unexpected("start tag"));
        };
        let name = start.qname.clone();
        let target = self.depth - 1;
        loop {
            let at_end = match self.advance()? {
                Token::End { .. } => true,
                Token::Eof => {
                    return Err(StructuralError::UnexpectedEof {
                        context: format!("inside <{}>", name),
                    }
                    .into());
                }
                _ => false,
            };
            if at_end && self.depth == target {
                return Ok(());
            }
        }
    }

    /// From a start tag, collects the text directly inside it and moves to
    /// its matching end tag. Nested elements are skipped.
    pub fn read_text(&mut self) -> Result<String> {
        let Token::Start(start) = &self.current else {
            return Err(self.unexpected("start tag"));
        };
        let name = start.qname.clone();
        let mut text = String::new();
        loop {
            match self.advance()?.clone() {
                Token::Text(t) | Token::CData(t) => text.push_str(&t),
                Token::Start(_) => self.skip_element()?,
                Token::End { .. } => return Ok(text),
                Token::Eof => {
                    return Err(StructuralError::UnexpectedEof {
                        context: format!("inside <{}>", name),
                    }
                    .into());
                }
            }
        }
    }

    pub(crate) fn unexpected(&self, expected: &'static str) -> crate::error::OxmError {
        StructuralError::InvalidState {
            expected,
            found: self.current.to_string(),
        }
        .into()
    }

    fn read_token(&mut self) -> Result<Token> {
        if let Some(token) = self.pending.pop_front() {
            return Ok(token);
        }

        let mut text: Option<String> = None;
        loop {
            self.buf.clear();
            let (resolved, event) = self.reader.read_resolved_event_into(&mut self.buf)?;
            let namespace = namespace_of(resolved);
            let mut tokens = match event {
                Event::Text(t) => {
                    text.get_or_insert_with(String::new)
                        .push_str(&String::from_utf8_lossy(&t));
                    continue;
                }
                Event::GeneralRef(r) => {
                    let entity = resolve_entity(&String::from_utf8_lossy(&r))?;
                    text.get_or_insert_with(String::new).push_str(&entity);
                    continue;
                }
                Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {
                    continue;
                }
                Event::CData(c) => vec![Token::CData(String::from_utf8_lossy(&c).into_owned())],
                Event::Start(s) => vec![Token::Start(start_tag(&self.reader, &s, namespace)?)],
                Event::Empty(s) => {
                    let start = start_tag(&self.reader, &s, namespace)?;
                    let end = Token::End {
                        qname: start.qname.clone(),
                        local_name: start.local_name.clone(),
                    };
                    vec![Token::Start(start), end]
                }
                Event::End(e) => {
                    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    vec![Token::End { qname, local_name }]
                }
                Event::Eof => vec![Token::Eof],
            };

            if let Some(t) = text.take()
                && !t.trim().is_empty()
            {
                tokens.insert(0, Token::Text(t));
            }
            let mut tokens = tokens.into_iter();
            let first = tokens.next().unwrap_or(Token::Eof);
            self.pending.extend(tokens);
            return Ok(first);
        }
    }
}

fn namespace_of(resolved: ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn start_tag<R>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
    namespace: Option<String>,
) -> Result<StartTag> {
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(StructuralError::malformed)?;
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let value = unescape(&String::from_utf8_lossy(&attr.value))
            .map_err(StructuralError::malformed)?
            .into_owned();
        attributes.push(XmlAttribute {
            qname: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            local_name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            namespace: namespace_of(resolved),
            value,
        });
    }
    Ok(StartTag {
        qname: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        local_name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        namespace,
        attributes,
    })
}

fn resolve_entity(name: &str) -> Result<String> {
    if let Some(reference) = name.strip_prefix('#') {
        let code = match reference
            .strip_prefix('x')
            .or_else(|| reference.strip_prefix('X'))
        {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => reference.parse::<u32>().ok(),
        };
        return code
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| {
                StructuralError::malformed(format!("invalid character reference &{};", name))
                    .into()
            });
    }
    let resolved = match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        _ => {
            return Err(
                StructuralError::malformed(format!("unknown entity &{};", name)).into(),
            );
        }
    };
    Ok(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(xml: &str) -> Vec<Token> {
        let mut cursor = XmlCursor::new(xml.as_bytes());
        let mut out = Vec::new();
        loop {
            let token = cursor.advance().unwrap().clone();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_empty_element_yields_start_and_end() {
        let tokens = tokens("<a><b x=\"1\"/></a>");
        assert_eq!(tokens.len(), 4);
        match &tokens[1] {
            Token::Start(start) => {
                assert_eq!(start.local_name, "b");
                assert_eq!(start.attribute("x"), Some("1"));
            }
            other => panic!("unexpected token {:?}", other),
        }
        assert!(matches!(&tokens[2], Token::End { local_name, .. } if local_name == "b"));
    }

    #[test]
    fn test_text_and_entities_are_merged_verbatim() {
        let tokens = tokens("<a>\n  Fish &amp; Chips &#x21;\n</a>");
        assert_eq!(tokens[1], Token::Text("\n  Fish & Chips !\n".to_string()));
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_peek_does_not_move() {
        let mut cursor = XmlCursor::new("<a><b/></a>".as_bytes());
        cursor.advance_to_start().unwrap();
        assert!(matches!(cursor.peek().unwrap(), Token::Start(start) if start.local_name == "b"));
        assert!(matches!(cursor.current(), Token::Start(start) if start.local_name == "a"));
        cursor.advance().unwrap();
        assert!(matches!(cursor.peek().unwrap(), Token::End { local_name, .. } if local_name == "b"));
        cursor.advance().unwrap();
        assert!(matches!(cursor.advance().unwrap(), Token::End { local_name, .. } if local_name == "a"));
    }

    #[test]
    fn test_whitespace_and_comments_are_dropped() {
        let tokens = tokens("<?xml version=\"1.0\"?>\n<a>\n  <!-- note -->\n  <b/>\n</a>");
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_cdata_is_kept_verbatim() {
        let tokens = tokens("<a><![CDATA[ <raw> ]]></a>");
        assert_eq!(tokens[1], Token::CData(" <raw> ".to_string()));
    }

    #[test]
    fn test_namespaces_are_resolved() {
        let tokens = tokens("<d:a xmlns:d=\"urn:doc\" d:lang=\"en\"><b/></d:a>");
        match &tokens[0] {
            Token::Start(start) => {
                assert_eq!(start.qname, "d:a");
                assert_eq!(start.local_name, "a");
                assert_eq!(start.namespace.as_deref(), Some("urn:doc"));
                let lang = start
                    .attributes
                    .iter()
                    .find(|a| a.local_name == "lang")
                    .unwrap();
                assert_eq!(lang.namespace.as_deref(), Some("urn:doc"));
            }
            other => panic!("unexpected token {:?}", other),
        }
        match &tokens[1] {
            Token::Start(start) => assert_eq!(start.namespace, None),
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_skip_element_and_read_text() {
        let mut cursor = XmlCursor::new("<a><skip><x>1</x></skip><t>hi<i/> there</t></a>".as_bytes());
        cursor.advance_to_start().unwrap();
        cursor.advance().unwrap();
        cursor.skip_element().unwrap();
        assert!(matches!(cursor.current(), Token::End { local_name, .. } if local_name == "skip"));
        cursor.advance().unwrap();
        assert_eq!(cursor.read_text().unwrap(), "hi there");
        assert!(matches!(cursor.current(), Token::End { local_name, .. } if local_name == "t"));
        assert_eq!(cursor.depth, 1);
    }

    #[test]
    fn test_unknown_entity_is_malformed() {
        let mut cursor = XmlCursor::new("<a>&bogus;</a>".as_bytes());
        cursor.advance().unwrap();
        assert!(cursor.advance().is_err());
    }
}
