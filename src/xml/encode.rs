//! Writing flat XML documents.

use std::io;
use std::io::Write as _;
use super::decode::Name;


//------------ Writer --------------------------------------------------------

/// Wraps a writer for producing XML.
///
/// The output is compact: no declaration, no indentation and no line
/// breaks, since the provider compares field values verbatim.
#[derive(Debug)]
pub struct Writer<W> {
    /// The wrapped writer.
    wrapped: W,

    /// A place to store an error for delayed error handling.
    ///
    /// This is necessary so we can use `Drop` for elements which doesn’t
    /// allow us to return an error.
    error: Option<io::Error>,
}

impl<W: io::Write> Writer<W> {
    /// Create a new XML writer by wrapping an IO writer.
    pub fn new(wrapped: W) -> Self {
        Writer { wrapped, error: None }
    }

    /// Start an XML element.
    ///
    /// This will write the beginning of the tag to the writer and therefore
    /// may error. Upon success, it returns an [`Element`] which can be used
    /// to add content. The element is finished when it is dropped.
    pub fn element<'s>(
        &'s mut self, tag: Name<'static>,
    ) -> Result<Element<'s, W>, io::Error> {
        Element::start(self, tag)
    }

    /// Concludes writing and drops the writer.
    pub fn done(mut self) -> Result<(), io::Error> {
        if let Some(err) = self.error.take() {
            Err(err)
        }
        else {
            Ok(())
        }
    }

    fn store_error(&mut self, error: io::Error) {
        self.error = Some(error)
    }
}

impl<W: io::Write> io::Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        if let Some(err) = self.error.take() {
            return Err(err)
        }
        self.wrapped.write(buf)
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        if let Some(err) = self.error.take() {
            return Err(err)
        }
        self.wrapped.flush()
    }
}


//------------ Element -------------------------------------------------------

/// An XML element in the process of being written.
#[derive(Debug)]
pub struct Element<'a, W: io::Write> {
    /// The writer to write to.
    writer: &'a mut Writer<W>,

    /// The tag.
    tag: Name<'static>,

    /// Is the element still empty?
    ///
    /// We have to keep this because of the different way empty elements are
    /// closed.
    empty: bool,
}

impl<'a, W: io::Write> Element<'a, W> {
    fn start(
        writer: &'a mut Writer<W>, tag: Name<'static>,
    ) -> Result<Self, io::Error> {
        writer.write_all(b"<")?;
        writer.write_all(tag.local())?;
        Ok(Element { writer, tag, empty: true })
    }

    /// Write the content of the element.
    ///
    /// The actual content is written by the closure passed in.
    pub fn content(
        mut self, op: impl FnOnce(&mut Content<W>) -> Result<(), io::Error>
    ) -> Result<Self, io::Error> {
        self.open()?;
        op(&mut Content { writer: &mut *self.writer })?;
        Ok(self)
    }

    fn open(&mut self) -> Result<(), io::Error> {
        if self.empty {
            self.empty = false;
            self.writer.write_all(b">")?;
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), io::Error> {
        if self.empty {
            self.writer.write_all(b"/>")
        }
        else {
            self.writer.write_all(b"</")?;
            self.writer.write_all(self.tag.local())?;
            self.writer.write_all(b">")
        }
    }
}

impl<'a, W: io::Write> Drop for Element<'a, W> {
    fn drop(&mut self) {
        if let Err(err) = self.end() {
            self.writer.store_error(err)
        }
    }
}


//------------ Content -------------------------------------------------------

/// The content of an element.
///
/// This is passed to the closure for [`Element::content`] to use for actually
/// producing content.
#[derive(Debug)]
pub struct Content<'a, W> {
    writer: &'a mut Writer<W>,
}

impl<'a, W: io::Write> Content<'a, W> {
    /// Add an element with the given tag holding only text.
    ///
    /// Tags of parameter sets are only known at runtime. The tag must be a
    /// valid XML name, otherwise an error of kind `InvalidInput` is
    /// returned before anything is written.
    pub fn text_element(
        &mut self, tag: &str, text: &str
    ) -> Result<(), io::Error> {
        if !is_name(tag) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid XML element name '{}'", tag)
            ))
        }
        self.writer.write_all(b"<")?;
        self.writer.write_all(tag.as_bytes())?;
        self.writer.write_all(b">")?;
        write_escaped(text.as_bytes(), &mut *self.writer)?;
        self.writer.write_all(b"</")?;
        self.writer.write_all(tag.as_bytes())?;
        self.writer.write_all(b">")
    }
}


//------------ Helpers -------------------------------------------------------

/// Write an octet sequence escaping all characters special in PCDATA.
fn write_escaped(
    mut s: &[u8], target: &mut impl io::Write
) -> Result<(), io::Error> {
    while let Some(idx) = s.iter().position(|ch| replace_char(*ch).is_some()) {
        target.write_all(&s[..idx])?;
        if let Some(repl) = replace_char(s[idx]) {
            target.write_all(repl.as_bytes())?;
        }
        s = &s[idx + 1..];
    }
    target.write_all(s)
}

fn replace_char(ch: u8) -> Option<&'static str> {
    match ch {
        b'<' => Some("&lt;"),
        b'>' => Some("&gt;"),
        b'&' => Some("&amp;"),
        _ => None
    }
}

/// Checks for the ASCII subset of XML names the provider uses.
fn is_name(s: &str) -> bool {
    let mut chars = s.bytes();
    match chars.next() {
        Some(ch) if ch.is_ascii_alphabetic() || ch == b'_' => { }
        _ => return false
    }
    chars.all(|ch| {
        ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'-' || ch == b'.'
    })
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    const ROOT_TAG: Name = Name::unqualified(b"xml");

    #[test]
    fn empty_root() -> io::Result<()> {
        let mut buf = Vec::<u8>::new();
        let mut writer = Writer::new(&mut buf);

        writer.element(ROOT_TAG)?;
        writer.done()?;

        assert_eq!("<xml/>", std::str::from_utf8(&buf).unwrap());
        Ok(())
    }

    #[test]
    fn compact_nesting() -> io::Result<()> {
        let mut buf = Vec::<u8>::new();
        let mut writer = Writer::new(&mut buf);

        writer.element(ROOT_TAG)?.content(|content| {
            content.text_element("inner", "a<b & c>d")?;
            content.text_element("mch_id", "10000100")?;
            content.text_element("empty", "")?;
            Ok(())
        })?;
        writer.done()?;

        assert_eq!(
            "<xml>\
             <inner>a&lt;b &amp; c&gt;d</inner>\
             <mch_id>10000100</mch_id>\
             <empty></empty>\
             </xml>",
            std::str::from_utf8(&buf).unwrap()
        );
        Ok(())
    }

    #[test]
    fn reject_bad_names() {
        let mut buf = Vec::<u8>::new();
        let mut writer = Writer::new(&mut buf);
        let res = writer.element(ROOT_TAG).and_then(|el| {
            el.content(|content| content.text_element("a b", "x"))
        });
        assert_eq!(res.err().map(|e| e.kind()), Some(io::ErrorKind::InvalidInput));
        assert!(!is_name(""));
        assert!(!is_name("1a"));
        assert!(is_name("sandbox_signkey"));
    }
}
