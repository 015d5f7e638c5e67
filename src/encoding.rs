use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use crate::error::SealError;

/// Line terminator appended after every line of text.
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// How appended text is turned into plaintext bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-8 without byte-order mark.
    #[default]
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    pub fn bom(&self) -> &'static [u8] {
        match self {
            TextEncoding::Utf8 => &[],
            TextEncoding::Utf8Bom => &[0xEF, 0xBB, 0xBF],
            TextEncoding::Utf16Le => &[0xFF, 0xFE],
            TextEncoding::Utf16Be => &[0xFE, 0xFF],
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => text.as_bytes().to_vec(),
            TextEncoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            TextEncoding::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }

    /// Writes `text` plus [`LINE_ENDING`]. The BOM goes first only when
    /// `at_start` is set, i.e. the plaintext is still empty.
    pub(crate) fn write_line<W: Write + ?Sized>(
        &self,
        out: &mut W,
        text: &str,
        at_start: bool,
    ) -> io::Result<()> {
        if at_start {
            out.write_all(self.bom())?;
        }
        out.write_all(&self.encode(text))?;
        out.write_all(&self.encode(LINE_ENDING))
    }
}

impl FromStr for TextEncoding {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            "utf8-bom" | "utf-8-bom" => Ok(TextEncoding::Utf8Bom),
            "utf16" | "utf-16" | "utf16le" | "utf-16le" => Ok(TextEncoding::Utf16Le),
            "utf16be" | "utf-16be" => Ok(TextEncoding::Utf16Be),
            other => Err(SealError::config(format!("unknown text encoding '{other}'"))),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Bom => "utf-8-bom",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
        };
        f.write_str(name)
    }
}
