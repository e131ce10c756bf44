/// Per-byte tables of the internal single-byte character set,
/// parsed from a `.cset` data file.
use crate::error::{Error, Result};
use crate::reader::{DataLines, LineReader};

/// Class of a byte in the internal character set. Order matters:
/// a byte is a word character iff its type is at least `Letter`.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub enum CharType {
    Unknown,
    WhiteSpace,
    Hyphen,
    Digit,
    NonLetter,
    Modifier,
    Letter,
}

impl CharType {
    fn from_class_letter(c: char) -> CharType {
        match c.to_ascii_uppercase() {
            'W' => CharType::WhiteSpace,
            'H' => CharType::Hyphen,
            'D' => CharType::Digit,
            'A' => CharType::NonLetter,
            'M' => CharType::Modifier,
            'L' => CharType::Letter,
            _ => CharType::Unknown,
        }
    }
}

// char_info bits
pub const LOWER: u8 = 1 << 0;
pub const UPPER: u8 = 1 << 1;
pub const TITLE: u8 = 1 << 2;
pub const PLAIN: u8 = 1 << 3;
pub const LETTER: u8 = 1 << 4;
pub const CLEAN: u8 = 1 << 5;

/// Where an otherwise non-letter byte is a legal part of a word.
#[derive(Debug, Default, Copy, Clone)]
pub struct SpecialChar {
    pub begin: bool,
    pub middle: bool,
    pub end: bool,
}

impl SpecialChar {
    pub fn new(begin: bool, middle: bool, end: bool) -> SpecialChar {
        SpecialChar { begin, middle, end }
    }

    pub fn any(&self) -> bool {
        self.begin || self.middle || self.end
    }
}

/// How words are keyed in the dictionary: accents stripped, or
/// only lowercased.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum StoreAs {
    Stripped,
    Lower,
}

/// Marker byte that never occurs in a stored word; `to_clean` and
/// `to_plain` map the zero unit to it so comparisons stop cleanly.
pub const CLEAN_SENTINEL: u8 = 0x10;

pub struct CharTable {
    pub cht_name: String,
    pub cht_to_upper: [u8; 256],
    pub cht_to_lower: [u8; 256],
    pub cht_to_title: [u8; 256],
    pub cht_to_plain: [u8; 256],
    pub cht_to_stripped: [u8; 256],
    pub cht_to_clean: [u8; 256],
    pub cht_de_accent: [u8; 256],
    pub cht_to_uni: [u32; 256],
    pub cht_sl_first: [u8; 256],
    pub cht_sl_rest: [u8; 256],
    pub cht_char_type: [CharType; 256],
    pub cht_char_info: [u8; 256],
    pub cht_special: [SpecialChar; 256],
}

impl CharTable {
    /// Parses a `.cset` stream: free-form header up to a lone `/`,
    /// then 256 lines `HH UUUU C UP LO TI PL F R`.
    pub fn load(reader: &mut dyn LineReader) -> Result<CharTable> {
        let file_name = reader.get_name();
        let mut lines = DataLines::new(reader);
        loop {
            let line = lines.next_line().ok_or_else(|| {
                Error::bad_file_format(&file_name, "Unexpected end of the header.")
            })?;
            if line.dtl_text.trim() == "/" {
                break;
            }
        }
        let mut table = CharTable {
            cht_name: file_name.clone(),
            cht_to_upper: [0; 256],
            cht_to_lower: [0; 256],
            cht_to_title: [0; 256],
            cht_to_plain: [0; 256],
            cht_to_stripped: [0; 256],
            cht_to_clean: [0; 256],
            cht_de_accent: [0; 256],
            cht_to_uni: [0; 256],
            cht_sl_first: [0; 256],
            cht_sl_rest: [0; 256],
            cht_char_type: [CharType::Unknown; 256],
            cht_char_info: [0; 256],
            cht_special: [SpecialChar::default(); 256],
        };
        for i in 0..256usize {
            let line = lines.next_line().ok_or_else(|| {
                Error::bad_file_format(&file_name, "Missing character entries.")
            })?;
            let fields: Vec<&str> = line.dtl_text.split_whitespace().collect();
            if fields.len() < 9 {
                return Err(Error::bad_file_format(&file_name, "Short character entry.")
                    .with_file_line(&file_name, line.dtl_line_no));
            }
            let byte = usize::from_str_radix(fields[0], 16).unwrap_or(usize::MAX);
            if byte != i {
                return Err(Error::bad_file_format(&file_name, "Entries out of order.")
                    .with_file_line(&file_name, line.dtl_line_no));
            }
            let hex8 = |s: &str| u8::from_str_radix(s, 16).unwrap_or(0);
            table.cht_to_uni[i] = u32::from_str_radix(fields[1], 16).unwrap_or(0);
            table.cht_char_type[i] =
                CharType::from_class_letter(fields[2].chars().next().unwrap_or('-'));
            table.cht_to_upper[i] = hex8(fields[3]);
            table.cht_to_lower[i] = hex8(fields[4]);
            table.cht_to_title[i] = hex8(fields[5]);
            table.cht_to_plain[i] = hex8(fields[6]);
            table.cht_sl_first[i] = hex8(fields[7]);
            table.cht_sl_rest[i] = hex8(fields[8]);

            let mut info = 0u8;
            if table.cht_char_type[i] >= CharType::Letter {
                info |= LETTER;
            }
            if table.cht_to_upper[i] as usize == i {
                info |= UPPER;
            }
            if table.cht_to_lower[i] as usize == i {
                info |= LOWER;
            }
            if table.cht_to_title[i] as usize == i {
                info |= TITLE;
            }
            if table.cht_to_plain[i] as usize == i || table.cht_to_plain[i] == 0 {
                info |= PLAIN;
            }
            table.cht_char_info[i] = info;
        }
        for i in 0..256usize {
            table.cht_de_accent[i] = if table.cht_to_plain[i] == 0 {
                i as u8
            } else {
                table.cht_to_plain[i]
            };
        }
        table.cht_to_plain[0] = CLEAN_SENTINEL;
        table.cht_to_plain[1] = CLEAN_SENTINEL;
        for i in 0..256usize {
            table.cht_to_stripped[i] = table.cht_to_plain[table.cht_to_lower[i] as usize];
        }
        Ok(table)
    }

    /// Second setup step: derive `to_clean` once the language's
    /// `store-as` policy is known.
    pub fn set_clean(&mut self, store_as: StoreAs) {
        let base = match store_as {
            StoreAs::Stripped => &self.cht_to_stripped,
            StoreAs::Lower => &self.cht_to_lower,
        };
        let mut to_clean = [0u8; 256];
        for i in 0..256usize {
            to_clean[i] = if self.cht_char_type[i] > CharType::NonLetter {
                base[i]
            } else {
                0
            };
        }
        to_clean[0] = CLEAN_SENTINEL;
        to_clean[CLEAN_SENTINEL as usize] = CLEAN_SENTINEL;
        self.cht_to_clean = to_clean;
        for i in 0..256usize {
            if self.cht_to_clean[i] as usize == i {
                self.cht_char_info[i] |= CLEAN;
            } else {
                self.cht_char_info[i] &= !CLEAN;
            }
        }
    }

    pub fn is_alpha(&self, c: u8) -> bool {
        self.cht_char_type[c as usize] >= CharType::Letter
    }

    pub fn char_info(&self, c: u8) -> u8 {
        self.cht_char_info[c as usize]
    }

    pub fn special(&self, c: u8) -> SpecialChar {
        self.cht_special[c as usize]
    }

    /// Builds the reverse map from Unicode code points to internal
    /// bytes; later entries never override earlier ones.
    pub fn from_uni_map(&self) -> hashbrown::HashMap<u32, u8> {
        let mut map = hashbrown::HashMap::new();
        for i in 0..256usize {
            map.entry(self.cht_to_uni[i]).or_insert(i as u8);
        }
        map
    }
}

/// A latin-1 style table for tests and for languages without a
/// packaged `.cset`: bytes map to themselves, ASCII casing plus the
/// 0xC0-0xFF accented range.
#[cfg(test)]
pub fn latin1_test_table() -> CharTable {
    let text = crate::charset::latin1_cset_text();
    let mut reader = crate::reader::VecLineReader::from_str("iso-8859-1.cset", &text);
    let mut table = CharTable::load(&mut reader).unwrap();
    table.set_clean(StoreAs::Stripped);
    table
}

/// Generated `.cset` content describing ISO-8859-1, used by tests
/// in several modules.
#[cfg(test)]
pub fn latin1_cset_text() -> String {
    let mut out = String::from("iso-8859-1\n/\n");
    for i in 0..256u32 {
        let b = i as u8;
        let ch = b as char;
        let (class, up, lo, ti, pl) = if ch.is_ascii_uppercase() {
            ('L', b, b + 32, b, b)
        } else if ch.is_ascii_lowercase() {
            ('L', b - 32, b, b - 32, b)
        } else if ch.is_ascii_digit() {
            ('D', b, b, b, b)
        } else if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
            ('W', b, b, b, b)
        } else if b == b'-' {
            ('H', b, b, b, b)
        } else if (0xC0..=0xDE).contains(&b) && b != 0xD7 {
            // accented uppercase; plain form strips to the base ascii letter
            ('L', b, b + 32, b, latin1_plain(b))
        } else if (0xE0..=0xFE).contains(&b) && b != 0xF7 {
            ('L', b - 32, b, b - 32, latin1_plain(b - 32) + 32)
        } else {
            ('A', b, b, b, b)
        };
        out.push_str(&format!(
            "{:02X} {:04X} {} {:02X} {:02X} {:02X} {:02X} {:02X} {:02X}\n",
            b, i, class, up, lo, ti, pl, lo, lo
        ));
    }
    out
}

#[cfg(test)]
fn latin1_plain(upper: u8) -> u8 {
    match upper {
        0xC0..=0xC5 => b'A',
        0xC6 => b'A',
        0xC7 => b'C',
        0xC8..=0xCB => b'E',
        0xCC..=0xCF => b'I',
        0xD0 => b'D',
        0xD1 => b'N',
        0xD2..=0xD6 => b'O',
        0xD8 => b'O',
        0xD9..=0xDC => b'U',
        0xDD => b'Y',
        0xDE => b'T',
        other => other,
    }
}
