/// The pluggable soundslike transform a language uses to group
/// words that sound alike.
use crate::charset::CharTable;
use crate::error::{Error, ErrorKind, Result};
use crate::phonet::PhonetParms;
use crate::reader::LineReader;

#[derive(Debug)]
pub enum Soundslike {
    /// No real soundslike; the clean form stands in.
    NoSl,
    /// Accent-stripped, lowercased form.
    Stripped,
    /// Per-byte fold through the `sl_first` / `sl_rest` tables.
    Simple,
    /// The generic phonetic rule machine.
    Phonet(PhonetParms),
}

impl Soundslike {
    /// Builds the variant named in the language data. Any name other
    /// than the three built-ins is a phonet rule file.
    pub fn new(
        name: &str,
        table: &CharTable,
        conv: &dyn Fn(&str) -> Vec<u8>,
        phonet_reader: Option<&mut dyn LineReader>,
    ) -> Result<Soundslike> {
        match name {
            "none" | "" => Ok(Soundslike::NoSl),
            "stripped" => Ok(Soundslike::Stripped),
            "simple" => Ok(Soundslike::Simple),
            _ => {
                let reader = phonet_reader.ok_or_else(|| {
                    Error::new(
                        ErrorKind::CantReadFile,
                        format!("The phonet rules for \"{}\" can not be read.", name),
                    )
                })?;
                Ok(Soundslike::Phonet(PhonetParms::load(reader, table, conv)?))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Soundslike::NoSl => "none",
            Soundslike::Stripped => "stripped",
            Soundslike::Simple => "simple",
            Soundslike::Phonet(_) => "phonet",
        }
    }

    /// True for every variant that produces a genuine soundslike
    /// key; "none" only mirrors the clean form.
    pub fn have_soundslike(&self) -> bool {
        !matches!(self, Soundslike::NoSl)
    }

    pub fn to_soundslike(&self, table: &CharTable, word: &[u8]) -> Vec<u8> {
        match self {
            Soundslike::NoSl => fold(word, &table.cht_to_clean),
            Soundslike::Stripped => fold(word, &table.cht_to_stripped),
            Soundslike::Simple => {
                let mut out = Vec::with_capacity(word.len());
                for (ix, b) in word.iter().enumerate() {
                    let folded = if ix == 0 {
                        table.cht_sl_first[*b as usize]
                    } else {
                        table.cht_sl_rest[*b as usize]
                    };
                    if folded != 0 {
                        out.push(folded);
                    }
                }
                out
            }
            Soundslike::Phonet(parms) => parms.transform(word),
        }
    }

    /// The bytes a soundslike key can contain, for downstream
    /// search tables.
    pub fn soundslike_chars(&self, table: &CharTable) -> Vec<u8> {
        let mut seen = [false; 256];
        for i in 0..256usize {
            let b = i as u8;
            if !(table.is_alpha(b) || table.special(b).any()) {
                continue;
            }
            for out in self.to_soundslike(table, &[b]) {
                seen[out as usize] = true;
            }
        }
        (1..256).filter(|i| seen[*i]).map(|i| i as u8).collect()
    }
}

fn fold(word: &[u8], map: &[u8; 256]) -> Vec<u8> {
    word.iter()
        .map(|b| map[*b as usize])
        .filter(|b| *b != 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::latin1_test_table;
    use crate::reader::{line_bytes, VecLineReader};

    #[test]
    fn none_mirrors_clean_form() {
        let table = latin1_test_table();
        let sl = Soundslike::new("none", &table, &|s| line_bytes(s), None).unwrap();
        assert!(!sl.have_soundslike());
        assert_eq!(sl.to_soundslike(&table, b"Hello"), b"hello".to_vec());
    }

    #[test]
    fn stripped_folds_accents() {
        let table = latin1_test_table();
        let sl = Soundslike::new("stripped", &table, &|s| line_bytes(s), None).unwrap();
        assert_eq!(sl.to_soundslike(&table, &[b'C', 0xE9]), b"ce".to_vec());
    }

    #[test]
    fn simple_uses_first_and_rest_tables() {
        let table = latin1_test_table();
        let sl = Soundslike::new("simple", &table, &|s| line_bytes(s), None).unwrap();
        // the test table folds both positions to lowercase
        assert_eq!(sl.to_soundslike(&table, b"AbC"), b"abc".to_vec());
    }

    #[test]
    fn phonet_variant_loads_rules() {
        let table = latin1_test_table();
        let mut reader =
            VecLineReader::from_str("en_phonet.dat", "version 1\nA A\nB B\nC C\nT T\n");
        let sl = Soundslike::new("en", &table, &|s| line_bytes(s), Some(&mut reader)).unwrap();
        assert_eq!(sl.name(), "phonet");
        assert_eq!(sl.to_soundslike(&table, b"cab"), b"CAB".to_vec());
    }

    #[test]
    fn missing_phonet_rules_fail() {
        let table = latin1_test_table();
        let err = Soundslike::new("en", &table, &|s| line_bytes(s), None).unwrap_err();
        assert!(err.is_a(ErrorKind::FileError));
    }
}
