//! YANG module revision dates and their packed LYB form.
//!
//! A revision `YYYY-MM-DD` is stored in 2 bytes:
//!
//! ```text
//! YYYY YYYM MMMD DDDD   (year is an offset from 2000)
//! ```

use std::fmt;

const REV_YEAR_OFFSET: u16 = 2000;
const REV_YEAR_MASK: u16 = 0xFE00;
const REV_YEAR_SHIFT: u16 = 9;
const REV_MONTH_MASK: u16 = 0x01E0;
const REV_MONTH_SHIFT: u16 = 5;
const REV_DAY_MASK: u16 = 0x001F;

/// Error type for revision parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionParseError {
    pub message: String,
}

impl fmt::Display for RevisionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RevisionParseError {}

/// A module revision date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision {
    year: u16,
    month: u8,
    day: u8,
}

impl Revision {
    /// Creates a revision, checking that it can be packed.
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self, RevisionParseError> {
        if !(REV_YEAR_OFFSET..=REV_YEAR_OFFSET + 127).contains(&year) {
            return Err(RevisionParseError {
                message: format!("Revision year {} outside of 2000..=2127", year),
            });
        }
        if !(1..=12).contains(&month) {
            return Err(RevisionParseError {
                message: format!("Invalid revision month: {}", month),
            });
        }
        if !(1..=days_in_month(year, month)).contains(&day) {
            return Err(RevisionParseError {
                message: format!("Invalid revision day: {}", day),
            });
        }
        Ok(Self { year, month, day })
    }

    /// Parses a `YYYY-MM-DD` revision string.
    pub fn parse(s: &str) -> Result<Self, RevisionParseError> {
        let invalid = || RevisionParseError {
            message: format!("Invalid revision format: {}", s),
        };

        let bytes = s.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(invalid());
        }

        let year: u16 = s[0..4].parse().map_err(|_| invalid())?;
        let month: u8 = s[5..7].parse().map_err(|_| invalid())?;
        let day: u8 = s[8..10].parse().map_err(|_| invalid())?;

        Self::new(year, month, day)
    }

    /// Returns the packed 16-bit wire form.
    pub fn packed(&self) -> u16 {
        let mut packed = ((self.year - REV_YEAR_OFFSET) << REV_YEAR_SHIFT) & REV_YEAR_MASK;
        packed |= (u16::from(self.month) << REV_MONTH_SHIFT) & REV_MONTH_MASK;
        packed |= u16::from(self.day) & REV_DAY_MASK;
        packed
    }

    /// Unpacks a revision, `None` for the "no revision" zero value.
    pub fn from_packed(packed: u16) -> Option<Self> {
        if packed == 0 {
            return None;
        }
        let year = ((packed & REV_YEAR_MASK) >> REV_YEAR_SHIFT) + REV_YEAR_OFFSET;
        let month = ((packed & REV_MONTH_MASK) >> REV_MONTH_SHIFT) as u8;
        let day = (packed & REV_DAY_MASK) as u8;
        Self::new(year, month, day).ok()
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}
