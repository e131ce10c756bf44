/// The main dictionary: an immutable word list loaded once, indexed
/// by clean form and (when the language has one) by soundslike.
/// The legacy binary block format is recognized but not read.
use std::sync::Arc;

use hashbrown::HashMap;

use crate::dict::{DictFlags, DictId, Dictionary, EntryKind, WordEntry};
use crate::error::{Error, ErrorKind, Result};
use crate::lang::{Lang, SensitiveCompare};
use crate::reader::{DataLines, LineReader};

pub const ROWL_MAGIC: &str = "aspell default speller rowl";

struct StoredEntry {
    sen_word: Vec<u8>,
    sen_aff: Vec<u8>,
    sen_info: u8,
}

/// Load-time policy for word-list entries: validate, optionally
/// clean, and either skip or fail on bad input.
#[derive(Clone, Copy)]
pub struct LoadOptions {
    pub lop_validate_words: bool,
    pub lop_validate_affixes: bool,
    pub lop_clean_words: bool,
    pub lop_clean_affixes: bool,
    pub lop_skip_invalid_words: bool,
}

impl Default for LoadOptions {
    fn default() -> LoadOptions {
        LoadOptions {
            lop_validate_words: true,
            lop_validate_affixes: true,
            lop_clean_words: false,
            lop_clean_affixes: true,
            lop_skip_invalid_words: true,
        }
    }
}

pub struct MainDict {
    mnd_id: DictId,
    mnd_lang: Arc<Lang>,
    mnd_entries: Vec<StoredEntry>,
    mnd_clean: HashMap<Vec<u8>, Vec<u32>>,
    mnd_sl: HashMap<Vec<u8>, Vec<u32>>,
    mnd_affix_compressed: bool,
}

impl std::fmt::Debug for MainDict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainDict").finish()
    }
}

// splits "word/flags" at the last slash not preceded by a
// backslash; "\/" stays part of the word
fn split_flags(text: &str) -> (String, String) {
    if let Some(ix) = text.rfind('/') {
        if ix > 0 && text.as_bytes()[ix - 1] != b'\\' {
            return (
                text[..ix].replace("\\/", "/"),
                text[ix + 1..].to_string(),
            );
        }
    }
    (text.replace("\\/", "/"), String::new())
}

impl MainDict {
    /// Loads a word-list stream: one `word[/flags]` per line, an
    /// optional leading count line.
    pub fn load(
        reader: &mut dyn LineReader,
        lang: Arc<Lang>,
        options: LoadOptions,
    ) -> Result<MainDict> {
        let file_name = reader.get_name();
        let mut dict = MainDict {
            mnd_id: DictId::from_path(&file_name),
            mnd_lang: lang,
            mnd_entries: Vec::new(),
            mnd_clean: HashMap::new(),
            mnd_sl: HashMap::new(),
            mnd_affix_compressed: false,
        };
        let mut lines = DataLines::new(reader);
        let mut first = true;
        while let Some(line) = lines.next_line() {
            let text = line.dtl_text.trim().to_string();
            if first {
                first = false;
                if text.starts_with(ROWL_MAGIC) {
                    return Err(Error::bad_file_format(
                        &file_name,
                        "The binary dictionary format is not supported here.",
                    ));
                }
                if text.chars().all(|c| c.is_ascii_digit()) {
                    continue; // entry count header
                }
            }
            let (word_text, aff_text) = split_flags(&text);
            let mut word = dict.mnd_lang.conv_data(&word_text);
            let mut aff = dict.mnd_lang.conv_data(&aff_text);
            if options.lop_clean_words {
                word = clean_word_edges(&dict.mnd_lang, &word);
            }
            if word.is_empty() {
                continue;
            }
            if options.lop_validate_words {
                if let Err(err) = dict.mnd_lang.check_if_valid(&word) {
                    if options.lop_skip_invalid_words {
                        log::warn!("{} Skipping word.", err);
                        continue;
                    }
                    return Err(err.with_file_line(&file_name, line.dtl_line_no));
                }
            }
            if options.lop_validate_affixes && !aff.is_empty() {
                if options.lop_clean_affixes {
                    aff = clean_affixes(&dict.mnd_lang, &word, &aff);
                } else if let Err(err) = dict.mnd_lang.validate_affix(&word, &aff) {
                    return Err(err.with_file_line(&file_name, line.dtl_line_no));
                }
            }
            dict.insert(word, aff);
        }
        Ok(dict)
    }

    fn insert(&mut self, word: Vec<u8>, aff: Vec<u8>) {
        let ix = self.mnd_entries.len() as u32;
        let clean = self.mnd_lang.to_clean_word(&word);
        let info = self.mnd_lang.get_word_info(&word);
        if !aff.is_empty() {
            self.mnd_affix_compressed = true;
        }
        if self.mnd_lang.have_soundslike() {
            let sl = self.mnd_lang.to_soundslike(&word);
            self.mnd_sl.entry(sl).or_default().push(ix);
        }
        self.mnd_clean.entry(clean).or_default().push(ix);
        self.mnd_entries.push(StoredEntry {
            sen_word: word,
            sen_aff: aff,
            sen_info: info,
        });
    }

    pub fn lang(&self) -> &Arc<Lang> {
        &self.mnd_lang
    }

    pub fn set_id(&mut self, id: DictId) {
        self.mnd_id = id;
    }

    fn entry_of(&self, ix: u32) -> WordEntry {
        let stored = &self.mnd_entries[ix as usize];
        WordEntry::new(
            EntryKind::WordEntryKind,
            stored.sen_word.clone(),
            stored.sen_aff.clone(),
            stored.sen_info,
        )
    }

    fn collect(&self, indexes: &[u32]) -> Option<WordEntry> {
        let mut iter = indexes.iter();
        let mut entry = self.entry_of(*iter.next()?);
        for ix in iter {
            let stored = &self.mnd_entries[*ix as usize];
            entry.push_sibling(
                stored.sen_word.clone(),
                stored.sen_aff.clone(),
                stored.sen_info,
            );
        }
        Some(entry)
    }
}

// strip leading bytes that can not begin a word and trailing bytes
// that can not end one
fn clean_word_edges(lang: &Lang, word: &[u8]) -> Vec<u8> {
    let mut begin = 0usize;
    let mut end = word.len();
    while begin < end && !lang.is_alpha(word[begin]) && !lang.special(word[begin]).begin {
        begin += 1;
    }
    while end > begin && !lang.is_alpha(word[end - 1]) && !lang.special(word[end - 1]).end {
        end -= 1;
    }
    word[begin..end].to_vec()
}

fn clean_affixes(lang: &Lang, word: &[u8], aff: &[u8]) -> Vec<u8> {
    let affix = match lang.affix() {
        Some(affix) => affix,
        None => return Vec::new(),
    };
    let mut out = Vec::with_capacity(aff.len());
    for flag in aff {
        if affix.check_affix(word, *flag) == crate::affix::CheckAffixRes::ValidAffix {
            out.push(*flag);
        } else {
            log::warn!(
                "removing affix '{}' from word {}",
                *flag as char,
                lang.to_display(word)
            );
        }
    }
    out
}

impl Dictionary for MainDict {
    fn class_name(&self) -> &'static str {
        "MainDict"
    }

    fn id(&self) -> &DictId {
        &self.mnd_id
    }

    fn lang_name(&self) -> &str {
        self.mnd_lang.name()
    }

    fn flags(&self) -> DictFlags {
        DictFlags {
            affix_compressed: self.mnd_affix_compressed,
            invisible_soundslike: !self.mnd_lang.have_soundslike(),
            fast_lookup: true,
            fast_scan: true,
        }
    }

    fn size(&self) -> usize {
        self.mnd_entries.len()
    }

    fn lookup(&self, word: &[u8], cmp: &SensitiveCompare) -> Option<WordEntry> {
        let clean = self.mnd_lang.to_clean_word(word);
        let indexes = self.mnd_clean.get(&clean)?;
        for ix in indexes {
            let stored = &self.mnd_entries[*ix as usize];
            if cmp.compare(word, &stored.sen_word) {
                return Some(self.entry_of(*ix));
            }
        }
        None
    }

    fn clean_lookup(&self, clean: &[u8]) -> Option<WordEntry> {
        self.collect(self.mnd_clean.get(clean)?)
    }

    fn soundslike_lookup(&self, sl: &[u8]) -> Option<WordEntry> {
        if !self.mnd_lang.have_soundslike() {
            return self.clean_lookup(sl);
        }
        self.collect(self.mnd_sl.get(sl)?)
    }

    fn detailed_elements(&self) -> Vec<WordEntry> {
        (0..self.mnd_entries.len() as u32)
            .map(|ix| self.entry_of(ix))
            .collect()
    }

    fn soundslike_elements(&self) -> Vec<WordEntry> {
        let mut out = Vec::with_capacity(self.mnd_sl.len());
        for (sl, indexes) in self.mnd_sl.iter() {
            let mut entry = WordEntry::new(EntryKind::SoundslikeEntry, sl.clone(), Vec::new(), 0);
            for ix in indexes {
                let stored = &self.mnd_entries[*ix as usize];
                entry.push_sibling(
                    stored.sen_word.clone(),
                    stored.sen_aff.clone(),
                    stored.sen_info,
                );
            }
            out.push(entry);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::testkit::test_lang;
    use crate::reader::VecLineReader;

    fn load_list(text: &str) -> MainDict {
        let lang = test_lang();
        let mut reader = VecLineReader::from_str("en-common.wl", text);
        MainDict::load(&mut reader, lang, LoadOptions::default()).unwrap()
    }

    #[test]
    fn count_header_is_skipped() {
        let dict = load_list("3\nhello\nworld\ncar\n");
        assert_eq!(dict.size(), 3);
    }

    #[test]
    fn lookup_by_clean_form_and_case() {
        let lang = test_lang();
        let dict = load_list("hello\nLondon\n");
        let cmp = SensitiveCompare::new(&lang);
        assert!(dict.lookup(b"hello", &cmp).is_some());
        assert!(dict.lookup(b"Hello", &cmp).is_some());
        assert!(dict.lookup(b"london", &cmp).is_none());
        assert!(dict.clean_lookup(b"london").is_some());
    }

    #[test]
    fn lookup_is_stable_under_relookup() {
        let lang = test_lang();
        let dict = load_list("hello\nLondon\n");
        let cmp = SensitiveCompare::new(&lang);
        let entry = dict.lookup(b"Hello", &cmp).unwrap();
        let again = dict.lookup(&entry.wen_word, &cmp).unwrap();
        assert_eq!(entry.wen_word, again.wen_word);
        assert_eq!(entry.wen_aff, again.wen_aff);
    }

    #[test]
    fn flags_mark_affix_compression() {
        let dict = load_list("hello\n");
        assert!(!dict.flags().affix_compressed);
        let dict = load_list("cat/S\n");
        assert!(dict.flags().affix_compressed);
        let entry = dict.clean_lookup(b"cat").unwrap();
        assert_eq!(entry.wen_aff, b"S".to_vec());
    }

    #[test]
    fn invalid_words_are_skipped_with_warning() {
        let dict = load_list("good\nb..ad\nfine\n");
        assert_eq!(dict.size(), 2);
    }

    #[test]
    fn invalid_words_can_be_fatal() {
        let lang = test_lang();
        let mut reader = VecLineReader::from_str("en.wl", "good\nb..ad\n");
        let mut options = LoadOptions::default();
        options.lop_skip_invalid_words = false;
        let err = MainDict::load(&mut reader, lang, options).unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::InvalidWord);
    }

    #[test]
    fn binary_magic_is_rejected() {
        let lang = test_lang();
        let mut reader =
            VecLineReader::from_str("en.rws", "aspell default speller rowl 0.60\n");
        let err = MainDict::load(&mut reader, lang, LoadOptions::default()).unwrap_err();
        assert!(err.is_a(ErrorKind::BadFileFormat));
    }

    #[test]
    fn soundslike_index_groups_accents() {
        let lang = test_lang();
        let text = "resume\nresum\u{e9}\n";
        // latin-1 view: the accented byte must survive the reader
        let bytes: Vec<u8> = text
            .chars()
            .map(|c| if c == '\u{e9}' { 0xE9 } else { c as u8 })
            .collect();
        let mut reader = VecLineReader::new("en.wl", bytes);
        let dict = MainDict::load(&mut reader, lang.clone(), LoadOptions::default()).unwrap();
        let sl = lang.to_soundslike(b"resume");
        let entry = dict.soundslike_lookup(&sl).unwrap();
        assert_eq!(entry.all_words().len(), 2);
    }

    #[test]
    fn cleaning_strips_stray_edges() {
        let lang = test_lang();
        let mut reader = VecLineReader::from_str("en.wl", "(hello)\n");
        let mut options = LoadOptions::default();
        options.lop_clean_words = true;
        let dict = MainDict::load(&mut reader, lang, options).unwrap();
        assert!(dict.clean_lookup(b"hello").is_some());
    }

    #[test]
    fn escaped_slash_stays_in_word() {
        let (word, aff) = split_flags("km\\/h");
        assert_eq!(word, "km/h");
        assert!(aff.is_empty());
        let (word, aff) = split_flags("cat/S");
        assert_eq!(word, "cat");
        assert_eq!(aff, "S");
    }
}
