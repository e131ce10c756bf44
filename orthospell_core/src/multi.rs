/// The composite dictionary: an ordered list of children loaded
/// from a recipe file and queried as one.
use std::sync::Arc;

use crate::dict::{DictFlags, DictId, Dictionary, WordEntry};
use crate::error::{Error, ErrorKind, Result};
use crate::lang::SensitiveCompare;
use crate::reader::{DataLines, LineReader};

/// Resolves a dictionary name from a recipe into a loaded
/// dictionary. The std crate implements this over the search path.
pub trait DictLoader {
    fn load_dict(&mut self, name: &str) -> Result<Arc<dyn Dictionary>>;
}

pub struct MultiDict {
    mul_id: DictId,
    mul_lang_name: String,
    mul_dicts: Vec<Arc<dyn Dictionary>>,
}

impl std::fmt::Debug for MultiDict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiDict")
            .field("mul_lang_name", &self.mul_lang_name)
            .finish()
    }
}

impl MultiDict {
    /// Reads a recipe whose lines are `add <path-or-name>`. At
    /// least one `add` is required and every child must agree on
    /// the language.
    pub fn load(reader: &mut dyn LineReader, loader: &mut dyn DictLoader) -> Result<MultiDict> {
        let file_name = reader.get_name();
        let mut dict = MultiDict {
            mul_id: DictId::from_path(&file_name),
            mul_lang_name: String::new(),
            mul_dicts: Vec::new(),
        };
        let mut lines = DataLines::new(reader);
        while let Some(line) = lines.next_line() {
            let (key, value) = line.split_pair();
            if key != "add" {
                return Err(Error::new(
                    ErrorKind::UnknownKey,
                    format!("The key \"{}\" is unknown.", key),
                )
                .with_file_line(&file_name, line.dtl_line_no));
            }
            let child = loader.load_dict(value)?;
            if dict.mul_lang_name.is_empty() {
                dict.mul_lang_name = child.lang_name().to_string();
            } else if dict.mul_lang_name != child.lang_name() {
                return Err(Error::new(
                    ErrorKind::MismatchedLanguage,
                    format!(
                        "The dictionary \"{}\" is for language \"{}\", not \"{}\".",
                        value,
                        child.lang_name(),
                        dict.mul_lang_name
                    ),
                )
                .with_file_line(&file_name, line.dtl_line_no));
            }
            dict.mul_dicts.push(child);
        }
        if dict.mul_dicts.is_empty() {
            return Err(Error::bad_file_format(
                &file_name,
                "There must be at least one \"add\" line.",
            ));
        }
        Ok(dict)
    }

    pub fn dictionaries(&self) -> &[Arc<dyn Dictionary>] {
        &self.mul_dicts
    }
}

impl Dictionary for MultiDict {
    fn class_name(&self) -> &'static str {
        "MultiDict"
    }

    fn id(&self) -> &DictId {
        &self.mul_id
    }

    fn lang_name(&self) -> &str {
        &self.mul_lang_name
    }

    fn flags(&self) -> DictFlags {
        let mut flags = DictFlags::default();
        for child in &self.mul_dicts {
            let cf = child.flags();
            flags.affix_compressed |= cf.affix_compressed;
            flags.invisible_soundslike |= cf.invisible_soundslike;
        }
        flags
    }

    fn size(&self) -> usize {
        self.mul_dicts.iter().map(|d| d.size()).sum()
    }

    fn empty(&self) -> bool {
        self.mul_dicts.iter().all(|d| d.empty())
    }

    fn lookup(&self, word: &[u8], cmp: &SensitiveCompare) -> Option<WordEntry> {
        self.mul_dicts.iter().find_map(|d| d.lookup(word, cmp))
    }

    fn clean_lookup(&self, clean: &[u8]) -> Option<WordEntry> {
        self.mul_dicts.iter().find_map(|d| d.clean_lookup(clean))
    }

    fn soundslike_lookup(&self, sl: &[u8]) -> Option<WordEntry> {
        self.mul_dicts.iter().find_map(|d| d.soundslike_lookup(sl))
    }

    fn detailed_elements(&self) -> Vec<WordEntry> {
        let mut out = Vec::new();
        for child in &self.mul_dicts {
            out.extend(child.detailed_elements());
        }
        out
    }

    fn soundslike_elements(&self) -> Vec<WordEntry> {
        let mut out = Vec::new();
        for child in &self.mul_dicts {
            out.extend(child.soundslike_elements());
        }
        out
    }
}
