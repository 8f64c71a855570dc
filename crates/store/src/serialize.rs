//! Serializer contract and a plain XML text writer.

use core::fmt::Write;

use crate::runtime::Error;

/// Event sink fed by subtree serialization. `start_element` leaves the start
/// tag open for attributes; `finish_element` or `empty_element` seals it.
pub trait Serializer {
    fn start_element(&mut self, name: &str) -> Result<(), Error>;
    fn attribute(&mut self, name: &str, value: &str) -> Result<(), Error>;
    fn finish_element(&mut self) -> Result<(), Error>;
    fn empty_element(&mut self) -> Result<(), Error>;
    fn close_element(&mut self, name: &str) -> Result<(), Error>;
    fn text(&mut self, value: &str) -> Result<(), Error>;
    fn comment(&mut self, value: &str) -> Result<(), Error>;
    fn pi(&mut self, value: &str) -> Result<(), Error>;

    /// Boundary markers around each result of a sequence.
    fn open_result(&mut self) -> Result<(), Error> {
        Ok(())
    }
    fn close_result(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Polled between emitted results; true requests early termination.
    fn finished(&self) -> bool {
        false
    }
}

/// Serializer writing entity-escaped XML text to any [`Write`] target.
pub struct XmlWriter<W: Write> {
    out: W,
    open: bool,
}

impl XmlWriter<String> {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            open: false,
        }
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl Default for XmlWriter<String> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> XmlWriter<W> {
    pub fn with_output(out: W) -> Self {
        Self { out, open: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Seal a pending start tag before emitting content.
    fn seal(&mut self) -> Result<(), Error> {
        if self.open {
            self.out.write_char('>')?;
            self.open = false;
        }
        Ok(())
    }

    fn escaped_text(&mut self, value: &str) -> Result<(), Error> {
        for c in value.chars() {
            match c {
                '&' => self.out.write_str("&amp;")?,
                '<' => self.out.write_str("&lt;")?,
                '>' => self.out.write_str("&gt;")?,
                _ => self.out.write_char(c)?,
            }
        }
        Ok(())
    }

    fn escaped_attr(&mut self, value: &str) -> Result<(), Error> {
        for c in value.chars() {
            match c {
                '&' => self.out.write_str("&amp;")?,
                '<' => self.out.write_str("&lt;")?,
                '>' => self.out.write_str("&gt;")?,
                '"' => self.out.write_str("&quot;")?,
                _ => self.out.write_char(c)?,
            }
        }
        Ok(())
    }
}

impl<W: Write> Serializer for XmlWriter<W> {
    fn start_element(&mut self, name: &str) -> Result<(), Error> {
        self.seal()?;
        self.out.write_char('<')?;
        self.out.write_str(name)?;
        self.open = true;
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if self.open {
            self.out.write_char(' ')?;
        }
        self.out.write_str(name)?;
        self.out.write_str("=\"")?;
        self.escaped_attr(value)?;
        self.out.write_char('"')?;
        Ok(())
    }

    fn finish_element(&mut self) -> Result<(), Error> {
        self.out.write_char('>')?;
        self.open = false;
        Ok(())
    }

    fn empty_element(&mut self) -> Result<(), Error> {
        self.out.write_str("/>")?;
        self.open = false;
        Ok(())
    }

    fn close_element(&mut self, name: &str) -> Result<(), Error> {
        self.out.write_str("</")?;
        self.out.write_str(name)?;
        self.out.write_char('>')?;
        Ok(())
    }

    fn text(&mut self, value: &str) -> Result<(), Error> {
        self.seal()?;
        self.escaped_text(value)
    }

    fn comment(&mut self, value: &str) -> Result<(), Error> {
        self.seal()?;
        self.out.write_str("<!--")?;
        self.out.write_str(value)?;
        self.out.write_str("-->")?;
        Ok(())
    }

    fn pi(&mut self, value: &str) -> Result<(), Error> {
        self.seal()?;
        self.out.write_str("<?")?;
        self.out.write_str(value)?;
        self.out.write_str("?>")?;
        Ok(())
    }
}
