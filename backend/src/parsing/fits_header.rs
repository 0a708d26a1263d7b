//! Minimal FITS primary header reader/writer.
//!
//! Only what the exporter needs: split a file into its primary header and the
//! bytes that follow, read and update keyword values, and serialize the
//! header back into 2880-byte blocks. The data unit is never decoded.

use std::fmt;
use std::path::Path;

/// Size of a FITS logical record.
pub const BLOCK_SIZE: usize = 2880;
/// Size of a header card.
pub const CARD_SIZE: usize = 80;

#[derive(Debug, thiserror::Error)]
pub enum FitsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File is not a FITS file: {0}")]
    NotFits(String),

    #[error("Header has no END card")]
    MissingEnd,

    #[error("Keyword {0} not found in header")]
    MissingKeyword(String),

    #[error("Keyword {keyword} has unexpected value: {value}")]
    InvalidValue { keyword: String, value: String },
}

pub type FitsResult<T> = Result<T, FitsError>;

/// A header keyword value.
#[derive(Debug, Clone, PartialEq)]
pub enum FitsValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl FitsValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FitsValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FitsValue::Int(i) => Some(*i as f64),
            FitsValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim_start();
        if let Some(rest) = raw.strip_prefix('\'') {
            // Quotes inside strings are doubled
            let mut out = String::new();
            let mut chars = rest.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\'' {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        out.push('\'');
                    } else {
                        return Some(FitsValue::Str(out.trim_end().to_string()));
                    }
                } else {
                    out.push(c);
                }
            }
            return None;
        }

        let token = raw.split('/').next().unwrap_or("").trim();
        match token {
            "" => None,
            "T" => Some(FitsValue::Bool(true)),
            "F" => Some(FitsValue::Bool(false)),
            _ => token
                .parse::<i64>()
                .map(FitsValue::Int)
                .ok()
                .or_else(|| token.replace(['D', 'd'], "E").parse::<f64>().ok().map(FitsValue::Float)),
        }
    }

    /// Value field as written after `= `.
    fn render(&self) -> String {
        match self {
            FitsValue::Str(s) => {
                let quoted = format!("'{:<8}'", s.replace('\'', "''"));
                format!("{:<20}", quoted)
            }
            FitsValue::Int(i) => format!("{:>20}", i),
            FitsValue::Float(f) => {
                let text = if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{:.1}", f)
                } else {
                    format!("{}", f)
                };
                format!("{:>20}", text)
            }
            FitsValue::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        }
    }
}

impl fmt::Display for FitsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitsValue::Str(s) => f.write_str(s),
            FitsValue::Int(i) => write!(f, "{}", i),
            FitsValue::Float(v) => write!(f, "{}", v),
            FitsValue::Bool(b) => f.write_str(if *b { "T" } else { "F" }),
        }
    }
}

/// Primary header as an ordered list of 80-character cards (END excluded).
#[derive(Debug, Clone, PartialEq)]
pub struct FitsHeader {
    cards: Vec<String>,
}

impl FitsHeader {
    fn keyword_of(card: &str) -> &str {
        card.get(..8).unwrap_or(card).trim_end()
    }

    fn has_value(card: &str) -> bool {
        card.get(8..10) == Some("= ")
    }

    /// Value of `keyword`, if present and parseable.
    pub fn get(&self, keyword: &str) -> Option<FitsValue> {
        self.cards
            .iter()
            .find(|card| Self::keyword_of(card) == keyword && Self::has_value(card))
            .and_then(|card| FitsValue::parse(card.get(10..).unwrap_or("")))
    }

    pub fn get_str(&self, keyword: &str) -> Option<String> {
        self.get(keyword).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(|v| v.as_f64())
    }

    /// Replace the value of `keyword`, or append a new card.
    pub fn set(&mut self, keyword: &str, value: FitsValue) {
        let keyword = keyword.to_ascii_uppercase();
        let mut card = format!("{:<8}= {}", keyword, value.render());
        card.truncate(CARD_SIZE);
        let card = format!("{:<width$}", card, width = CARD_SIZE);

        match self
            .cards
            .iter_mut()
            .find(|existing| Self::keyword_of(existing) == keyword)
        {
            Some(existing) => *existing = card,
            None => self.cards.push(card),
        }
    }

    /// Serialized header, END card included, padded to a whole number of blocks.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity((self.cards.len() + 1) * CARD_SIZE);
        for card in &self.cards {
            out.push_str(card);
        }
        out.push_str(&format!("{:<width$}", "END", width = CARD_SIZE));
        let mut bytes = out.into_bytes();
        let padded = bytes.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
        bytes.resize(padded, b' ');
        bytes
    }
}

/// Split raw file contents into the primary header and the remaining bytes.
pub fn split_fits(bytes: &[u8]) -> FitsResult<(FitsHeader, &[u8])> {
    if !bytes.starts_with(b"SIMPLE  =") {
        return Err(FitsError::NotFits("missing SIMPLE card".to_string()));
    }

    let mut cards = Vec::new();
    for (block_idx, block) in bytes.chunks(BLOCK_SIZE).enumerate() {
        if block.len() < BLOCK_SIZE {
            return Err(FitsError::NotFits("truncated header block".to_string()));
        }
        for raw in block.chunks(CARD_SIZE) {
            let card = String::from_utf8_lossy(raw).into_owned();
            if FitsHeader::keyword_of(&card) == "END" {
                let data_start = (block_idx + 1) * BLOCK_SIZE;
                return Ok((FitsHeader { cards }, &bytes[data_start..]));
            }
            cards.push(card);
        }
    }

    Err(FitsError::MissingEnd)
}

/// Read the primary header and data bytes of a FITS file.
pub fn read_fits_file(path: &Path) -> FitsResult<(FitsHeader, Vec<u8>)> {
    let bytes = std::fs::read(path)?;
    let (header, data) = split_fits(&bytes)?;
    Ok((header, data.to_vec()))
}

/// Write a header followed by unchanged data bytes.
pub fn write_fits_file(path: &Path, header: &FitsHeader, data: &[u8]) -> FitsResult<()> {
    let mut bytes = header.to_bytes();
    bytes.extend_from_slice(data);
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn sample_fits(extra: &[(&str, FitsValue)], data: &[u8]) -> Vec<u8> {
    let mut header = FitsHeader { cards: Vec::new() };
    header.set("SIMPLE", FitsValue::Bool(true));
    header.set("BITPIX", FitsValue::Int(8));
    header.set("NAXIS", FitsValue::Int(1));
    header.set("NAXIS1", FitsValue::Int(data.len() as i64));
    for (key, value) in extra {
        header.set(key, value.clone());
    }
    let mut bytes = header.to_bytes();
    bytes.extend_from_slice(data);
    bytes
}
