use std::fmt::{Display, Formatter, Result, Write};

/// Wrapper struct whose [`Display`] implementation renders bytes as a C++ narrow string literal
///
/// Anything outside of printable ASCII is written as a three digit octal escape, which (unlike
/// `\x`) cannot swallow the characters that follow it.
pub struct CppStringLiteral<'a>(pub &'a [u8]);

impl Display for CppStringLiteral<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_char('"')?;
        for byte in self.0 {
            match byte {
                b'\t' => f.write_str("\\t")?,
                b'\r' => f.write_str("\\r")?,
                b'\n' => f.write_str("\\n")?,
                b'\\' | b'\'' | b'"' | b'?' => {
                    f.write_char('\\')?;
                    f.write_char(*byte as char)?;
                }
                0x20..=0x7e => f.write_char(*byte as char)?,
                _ => write!(f, "\\{:03o}", byte)?,
            }
        }
        f.write_char('"')
    }
}
