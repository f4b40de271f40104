//! Reading flat XML documents.

use std::{error, fmt, io};
use quick_xml::events::{BytesStart, BytesText, Event};


//------------ Reader --------------------------------------------------------

/// An XML reader.
///
/// This struct holds all state necessary for parsing an XML document.
pub struct Reader<R: io::BufRead> {
    reader: quick_xml::Reader<R>,
    buf: Vec<u8>,
}

impl<R: io::BufRead> Reader<R> {
    /// Creates a new reader from an underlying reader.
    ///
    /// Text is not trimmed. Whitespace between elements is skipped by the
    /// individual steps instead so that field values stay intact.
    pub fn new(reader: R) -> Self {
        Reader {
            reader: quick_xml::Reader::from_reader(reader),
            buf: Vec::new(),
        }
    }

    /// Parse the start of the document.
    ///
    /// This is like `Content::take_opt_element` except that it also happily
    /// skips over XML and doctype declarations and insists on an element
    /// being present.
    pub fn start<F, E>(&mut self, op: F) -> Result<Content, E>
    where F: FnOnce(Element) -> Result<(), E>, E: From<Error> {
        loop {
            self.buf.clear();
            let event = self.reader.read_event(
                &mut self.buf
            ).map_err(Error::from)?;
            match event {
                Event::Start(start) => {
                    op(Element::new(start))?;
                    return Ok(Content { empty: false })
                }
                Event::Empty(start) => {
                    op(Element::new(start))?;
                    return Ok(Content { empty: true })
                }
                Event::Comment(_) | Event::Decl(_) | Event::DocType(_)
                | Event::PI(_) => { }
                Event::Text(ref text) if is_blank(text) => { }
                _ => return Err(Error::Malformed.into())
            }
        }
    }

    /// Parse the end of the document.
    ///
    /// This checks that the next non-comment event is the end of file.
    pub fn end(&mut self) -> Result<(), Error> {
        loop {
            self.buf.clear();
            match self.reader.read_event(&mut self.buf)? {
                Event::Eof => return Ok(()),
                Event::Comment(_) => { }
                Event::Text(ref text) if is_blank(text) => { }
                _ => return Err(Error::Malformed)
            }
        }
    }
}


//------------ Element -------------------------------------------------------

/// The start of an element.
pub struct Element<'b> {
    start: BytesStart<'b>,
}

impl<'b> Element<'b> {
    fn new(start: BytesStart<'b>) -> Self {
        Element { start }
    }

    /// Returns the name of the element.
    pub fn name(&self) -> Name {
        Name::unqualified(self.start.local_name())
    }
}


//------------ Content -------------------------------------------------------

/// The content of an element that has been started.
///
/// The content keeps track of whether the end tag has been consumed
/// already. Once it has, all further attempts to take elements return
/// `None` and taking the end succeeds without touching the reader.
pub struct Content {
    empty: bool
}

impl Content {
    /// Takes the next child element if there is one.
    ///
    /// Returns `Ok(None)` and consumes the end tag of this element if there
    /// are no more children.
    pub fn take_opt_element<R, F, E>(
        &mut self,
        reader: &mut Reader<R>,
        op: F
    ) -> Result<Option<Content>, E>
    where R: io::BufRead, F: FnOnce(Element) -> Result<(), E>, E: From<Error> {
        if self.empty {
            return Ok(None)
        }

        loop {
            reader.buf.clear();
            let event = reader.reader.read_event(
                &mut reader.buf
            ).map_err(Error::from)?;
            match event {
                Event::Start(start) => {
                    op(Element::new(start))?;
                    return Ok(Some(Content { empty: false }))
                }
                Event::Empty(start) => {
                    op(Element::new(start))?;
                    return Ok(Some(Content { empty: true }))
                }
                Event::End(_) => {
                    self.empty = true;
                    return Ok(None)
                }
                Event::Comment(_) => { }
                Event::Text(ref text) if is_blank(text) => { }
                _ => return Err(Error::Malformed.into())
            }
        }
    }

    /// Takes the text content of the element including its end tag.
    ///
    /// Text and CDATA sections are concatenated in document order with
    /// their whitespace kept. Text is unescaped, CDATA is taken as is. An
    /// element without content yields an empty string. Nested elements are
    /// rejected.
    pub fn take_text<R: io::BufRead>(
        &mut self,
        reader: &mut Reader<R>,
    ) -> Result<String, Error> {
        let mut res = Vec::new();
        if self.empty {
            return Ok(String::new())
        }

        loop {
            reader.buf.clear();
            match reader.reader.read_event(&mut reader.buf)? {
                Event::Text(text) => {
                    res.extend_from_slice(&text.unescaped()?)
                }
                // quick-xml hands out CDATA content escaped.
                Event::CData(text) => {
                    res.extend_from_slice(&text.unescaped()?)
                }
                Event::Comment(_) => { }
                Event::End(_) => {
                    self.empty = true;
                    break
                }
                _ => return Err(Error::Malformed)
            }
        }
        String::from_utf8(res).map_err(|_| Error::Malformed)
    }

    /// Skips over everything up to and including the end tag.
    pub fn skip<R: io::BufRead>(
        &mut self,
        reader: &mut Reader<R>,
    ) -> Result<(), Error> {
        if self.empty {
            return Ok(())
        }

        let mut depth = 0usize;
        loop {
            reader.buf.clear();
            match reader.reader.read_event(&mut reader.buf)? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    if depth == 0 {
                        self.empty = true;
                        return Ok(())
                    }
                    depth -= 1;
                }
                Event::Eof => return Err(Error::Malformed),
                _ => { }
            }
        }
    }

    /// Takes the end tag of the element.
    pub fn take_end<R: io::BufRead>(
        &mut self,
        reader: &mut Reader<R>
    ) -> Result<(), Error> {
        if self.empty {
            return Ok(())
        }

        loop {
            reader.buf.clear();
            match reader.reader.read_event(&mut reader.buf)? {
                Event::End(_) => {
                    self.empty = true;
                    return Ok(())
                }
                Event::Comment(_) => { }
                Event::Text(ref text) if is_blank(text) => { }
                _ => return Err(Error::Malformed)
            }
        }
    }
}

fn is_blank(text: &BytesText) -> bool {
    text.escaped().iter().all(u8::is_ascii_whitespace)
}


//------------ Name ----------------------------------------------------------

/// The name of a tag.
///
/// The provider's documents don’t use namespaces, so only the local part
/// of a name is kept.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Name<'l> {
    local: &'l [u8],
}

impl<'l> Name<'l> {
    /// Creates an unqualified name from only a local name.
    pub const fn unqualified(local: &'l [u8]) -> Self {
        Name { local }
    }

    /// Returns the local part of the name.
    pub fn local(&self) -> &'l [u8] {
        self.local
    }
}

impl<'l> fmt::Debug for Name<'l> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name({})", String::from_utf8_lossy(self.local))
    }
}


//------------ Error ---------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    Xml(quick_xml::Error),
    Malformed,
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Xml(err) => err.fmt(f),
            Error::Malformed => f.write_str("Malformed XML"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Xml(err) => Some(err),
            Error::Malformed => None,
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    const ROOT: Name = Name::unqualified(b"xml");

    fn fields(xml: &str) -> Result<Vec<(String, String)>, Error> {
        let mut reader = Reader::new(xml.as_bytes());
        let mut outer = reader.start(|element| {
            if element.name() != ROOT {
                return Err(Error::Malformed)
            }
            Ok(())
        })?;
        let mut res = Vec::new();
        loop {
            let mut name = Vec::new();
            let content = outer.take_opt_element(&mut reader, |element| {
                name.extend_from_slice(element.name().local());
                Ok::<_, Error>(())
            })?;
            let mut content = match content {
                Some(content) => content,
                None => break,
            };
            let text = content.take_text(&mut reader)?;
            res.push((String::from_utf8(name).unwrap(), text));
        }
        outer.take_end(&mut reader)?;
        reader.end()?;
        Ok(res)
    }

    #[test]
    fn text_and_cdata() {
        let res = fields(
            "<?xml version=\"1.0\"?>\n\
             <xml>\n\
               <a>plain</a>\n\
               <b><![CDATA[<raw> & kept]]></b>\n\
               <c>a &amp; b</c>\n\
               <d/>\n\
               <e></e>\n\
             </xml>\n"
        ).unwrap();
        assert_eq!(
            res,
            vec![
                ("a".into(), "plain".into()),
                ("b".into(), "<raw> & kept".into()),
                ("c".into(), "a & b".into()),
                ("d".into(), "".into()),
                ("e".into(), "".into()),
            ]
        );
    }

    #[test]
    fn text_is_verbatim() {
        let res = fields(
            "<xml>\n\
               <a>  sign error  </a>\n\
               <b><![CDATA[a]]> b <![CDATA[c]]></b>\n\
               <c><![CDATA[ appid & mch_id <mismatch> ]]></c>\n\
               <d><![CDATA[&amp;]]></d>\n\
             </xml>"
        ).unwrap();
        assert_eq!(
            res,
            vec![
                ("a".into(), "  sign error  ".into()),
                ("b".into(), "a b c".into()),
                ("c".into(), " appid & mch_id <mismatch> ".into()),
                ("d".into(), "&amp;".into()),
            ]
        );
    }

    #[test]
    fn wrong_root() {
        assert!(matches!(fields("<other/>"), Err(Error::Malformed)));
    }

    #[test]
    fn nested_element_in_text() {
        assert!(fields("<xml><a><b>x</b></a></xml>").is_err());
    }

    #[test]
    fn trailing_garbage() {
        assert!(fields("<xml><a>1</a></xml><xml/>").is_err());
    }

    #[test]
    fn skip_nested() {
        let xml = "<xml><a><b>1</b><c><d/></c></a><e>2</e></xml>";
        let mut reader = Reader::new(xml.as_bytes());
        let mut outer = reader.start(|_| Ok::<_, Error>(())).unwrap();
        let mut first = outer.take_opt_element(
            &mut reader, |_| Ok::<_, Error>(())
        ).unwrap().unwrap();
        first.skip(&mut reader).unwrap();
        let mut second = outer.take_opt_element(
            &mut reader, |el| {
                assert_eq!(el.name(), Name::unqualified(b"e"));
                Ok::<_, Error>(())
            }
        ).unwrap().unwrap();
        assert_eq!(second.take_text(&mut reader).unwrap(), "2");
        outer.take_end(&mut reader).unwrap();
        reader.end().unwrap();
    }
}
