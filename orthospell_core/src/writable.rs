/// The writable dictionaries: the personal/session word list and
/// the replacement list. In-memory state is a hash table keyed by
/// clean form; persistence is the line oriented text format with a
/// versioned header.
use std::io::Write;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::dict::{DictFlags, DictId, Dictionary, EntryKind, WordEntry};
use crate::error::{Error, ErrorKind, Result};
use crate::lang::{Lang, SensitiveCompare};
use crate::reader::LineReader;

pub const PERSONAL_HEADER: &str = "personal_ws-1.1";
pub const REPL_HEADER: &str = "personal_repl-1.1";

#[derive(Clone)]
struct StoredWord {
    swd_word: Vec<u8>,
    swd_info: u8,
}

fn escape_into(out: &mut Vec<u8>, word: &[u8]) {
    for b in word {
        match *b {
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            other => out.push(other),
        }
    }
}

fn unescape(line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len());
    let mut ix = 0usize;
    while ix < line.len() {
        if line[ix] == b'\\' && ix + 1 < line.len() {
            match line[ix + 1] {
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b'\\' => out.push(b'\\'),
                other => {
                    out.push(b'\\');
                    out.push(other);
                    ix += 1;
                    continue;
                }
            }
            ix += 2;
        } else {
            out.push(line[ix]);
            ix += 1;
        }
    }
    out
}

// raw data lines of a personal file: no comment handling, only
// line-ending cleanup
fn next_raw_line(reader: &mut dyn LineReader) -> Option<Vec<u8>> {
    let mut line = reader.read_line()?;
    if line.is_empty() {
        return None;
    }
    while line.ends_with(b"\n") || line.ends_with(b"\r") {
        line.pop();
    }
    Some(line)
}

struct ParsedHeader {
    hdr_count: usize,
    hdr_encoding: String,
}

fn parse_header(
    reader: &mut dyn LineReader,
    magic: &str,
    lang: &Lang,
    file_name: &str,
) -> Result<ParsedHeader> {
    let line = next_raw_line(reader)
        .ok_or_else(|| Error::bad_file_format(file_name, "The file is empty."))?;
    let text: String = line.iter().map(|b| *b as char).collect();
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.is_empty() || !fields[0].starts_with("personal_") {
        return Err(Error::new(
            ErrorKind::MissingMagic,
            format!("The file \"{}\" does not start with a magic line.", file_name),
        ));
    }
    if fields[0] != magic {
        return Err(Error::new(
            ErrorKind::BadMagic,
            format!(
                "The file \"{}\" starts with \"{}\" instead of \"{}\".",
                file_name, fields[0], magic
            ),
        ));
    }
    if fields.len() < 2 {
        return Err(Error::bad_file_format(file_name, "Missing language name."));
    }
    if fields[1] != lang.name() {
        return Err(Error::new(
            ErrorKind::MismatchedLanguage,
            format!(
                "The file \"{}\" is for language \"{}\", not \"{}\".",
                file_name,
                fields[1],
                lang.name()
            ),
        ));
    }
    let count = fields
        .get(2)
        .and_then(|f| f.parse::<usize>().ok())
        .unwrap_or(0);
    let encoding = fields
        .get(3)
        .map(|f| f.to_string())
        .unwrap_or_else(|| lang.charset().to_string());
    Ok(ParsedHeader {
        hdr_count: count,
        hdr_encoding: encoding,
    })
}

/// A writable word list: the personal and session dictionaries.
pub struct WritableDict {
    wrd_id: DictId,
    wrd_lang: Arc<Lang>,
    wrd_class: &'static str,
    wrd_use_soundslike: bool,
    wrd_words: HashMap<Vec<u8>, Vec<StoredWord>>,
    wrd_sl: HashMap<Vec<u8>, Vec<Vec<u8>>>,
    wrd_file_encoding: String,
    wrd_size: usize,
}

impl WritableDict {
    pub fn new(lang: Arc<Lang>) -> WritableDict {
        let use_soundslike = lang.have_soundslike();
        let file_encoding = lang.data_encoding().to_string();
        WritableDict {
            wrd_id: DictId::anonymous(),
            wrd_lang: lang,
            wrd_class: "WritableDict",
            wrd_use_soundslike: use_soundslike,
            wrd_words: HashMap::new(),
            wrd_sl: HashMap::new(),
            wrd_file_encoding: file_encoding,
            wrd_size: 0,
        }
    }

    /// A session dictionary is the same store under another name
    /// and is never persisted.
    pub fn new_session(lang: Arc<Lang>) -> WritableDict {
        let mut dict = WritableDict::new(lang);
        dict.wrd_class = "SessionDict";
        dict
    }

    pub fn set_id(&mut self, id: DictId) {
        self.wrd_id = id;
    }

    pub fn lang(&self) -> &Arc<Lang> {
        &self.wrd_lang
    }

    pub fn file_encoding(&self) -> &str {
        &self.wrd_file_encoding
    }

    fn entry_of(&self, stored: &StoredWord) -> WordEntry {
        WordEntry::new(
            EntryKind::WordEntryKind,
            stored.swd_word.clone(),
            Vec::new(),
            stored.swd_info,
        )
    }

    fn add_validated(&mut self, word: &[u8], sl: &[u8]) -> Result<()> {
        let cmp = SensitiveCompare::new(&self.wrd_lang);
        let clean = self.wrd_lang.to_clean_word(word);
        let bucket = self.wrd_words.entry(clean.clone()).or_default();
        if bucket.iter().any(|s| cmp.compare(word, &s.swd_word)) {
            return Ok(());
        }
        bucket.push(StoredWord {
            swd_word: word.to_vec(),
            swd_info: self.wrd_lang.get_word_info(word),
        });
        self.wrd_size += 1;
        if self.wrd_use_soundslike {
            let keys = self.wrd_sl.entry(sl.to_vec()).or_default();
            if !keys.iter().any(|k| k == &clean) {
                keys.push(clean);
            }
        }
        Ok(())
    }

    /// Adds a word, deriving its soundslike. Validation failure is
    /// fatal to this add only.
    pub fn add_word(&mut self, word: &[u8]) -> Result<()> {
        self.wrd_lang.check_if_valid(word)?;
        let sl = self.wrd_lang.to_soundslike(word);
        self.add_validated(word, &sl)
    }

    /// Adds a word with a caller-supplied soundslike.
    pub fn add_word_sl(&mut self, word: &[u8], sl: &[u8]) -> Result<()> {
        self.wrd_lang.check_if_valid(word)?;
        self.add_validated(word, sl)
    }

    /// Merges the contents of a persisted word list into this one.
    /// A bad entry clears the merge result and fails.
    pub fn merge(&mut self, reader: &mut dyn LineReader) -> Result<()> {
        let file_name = reader.get_name();
        let header = parse_header(reader, PERSONAL_HEADER, &self.wrd_lang, &file_name)?;
        self.wrd_file_encoding = header.hdr_encoding.clone();
        self.wrd_words.reserve(header.hdr_count);
        while let Some(line) = next_raw_line(reader) {
            if line.is_empty() {
                continue;
            }
            let raw = unescape(&line);
            let word = self
                .wrd_lang
                .bytes_to_internal(&header.hdr_encoding, &raw)
                .map_err(|e| e.with_file(&file_name))?;
            if let Err(err) = self.add_word(&word) {
                let _ = Dictionary::clear(self);
                return Err(err.with_file(&file_name));
            }
        }
        Ok(())
    }

    /// Writes the word list in the persisted format.
    pub fn save(&self, out: &mut dyn Write) -> Result<()> {
        let header = format!(
            "{} {} {} {}\n",
            PERSONAL_HEADER,
            self.wrd_lang.name(),
            self.wrd_size,
            self.wrd_file_encoding
        );
        let write_err = |_| Error::new(ErrorKind::CantWriteFile, "The write failed.");
        out.write_all(header.as_bytes()).map_err(write_err)?;
        let mut line = Vec::new();
        for bucket in self.wrd_words.values() {
            for stored in bucket {
                let raw = self
                    .wrd_lang
                    .internal_to_bytes(&self.wrd_file_encoding, &stored.swd_word)?;
                line.clear();
                escape_into(&mut line, &raw);
                line.push(b'\n');
                out.write_all(&line).map_err(write_err)?;
            }
        }
        Ok(())
    }
}

impl Dictionary for WritableDict {
    fn class_name(&self) -> &'static str {
        self.wrd_class
    }

    fn id(&self) -> &DictId {
        &self.wrd_id
    }

    fn lang_name(&self) -> &str {
        self.wrd_lang.name()
    }

    fn flags(&self) -> DictFlags {
        DictFlags {
            affix_compressed: false,
            invisible_soundslike: !self.wrd_use_soundslike,
            fast_lookup: true,
            fast_scan: false,
        }
    }

    fn size(&self) -> usize {
        self.wrd_size
    }

    fn lookup(&self, word: &[u8], cmp: &SensitiveCompare) -> Option<WordEntry> {
        let clean = self.wrd_lang.to_clean_word(word);
        let bucket = self.wrd_words.get(&clean)?;
        bucket
            .iter()
            .find(|s| cmp.compare(word, &s.swd_word))
            .map(|s| self.entry_of(s))
    }

    fn clean_lookup(&self, clean: &[u8]) -> Option<WordEntry> {
        let bucket = self.wrd_words.get(clean)?;
        let mut iter = bucket.iter();
        let mut entry = self.entry_of(iter.next()?);
        for stored in iter {
            entry.push_sibling(stored.swd_word.clone(), Vec::new(), stored.swd_info);
        }
        Some(entry)
    }

    fn soundslike_lookup(&self, sl: &[u8]) -> Option<WordEntry> {
        if !self.wrd_use_soundslike {
            return self.clean_lookup(sl);
        }
        let keys = self.wrd_sl.get(sl)?;
        let mut entry: Option<WordEntry> = None;
        for clean in keys {
            for stored in self.wrd_words.get(clean).into_iter().flatten() {
                match entry.as_mut() {
                    None => entry = Some(self.entry_of(stored)),
                    Some(e) => {
                        e.push_sibling(stored.swd_word.clone(), Vec::new(), stored.swd_info)
                    }
                }
            }
        }
        entry
    }

    fn detailed_elements(&self) -> Vec<WordEntry> {
        let mut out = Vec::with_capacity(self.wrd_size);
        for bucket in self.wrd_words.values() {
            for stored in bucket {
                out.push(self.entry_of(stored));
            }
        }
        out
    }

    fn soundslike_elements(&self) -> Vec<WordEntry> {
        if !self.wrd_use_soundslike {
            let mut out = self.detailed_elements();
            for entry in out.iter_mut() {
                entry.wen_what = EntryKind::WordEntryKind;
            }
            return out;
        }
        let mut out = Vec::with_capacity(self.wrd_sl.len());
        for (sl, keys) in self.wrd_sl.iter() {
            let mut entry =
                WordEntry::new(EntryKind::SoundslikeEntry, sl.clone(), Vec::new(), 0);
            for clean in keys {
                for stored in self.wrd_words.get(clean).into_iter().flatten() {
                    entry.push_sibling(stored.swd_word.clone(), Vec::new(), stored.swd_info);
                }
            }
            out.push(entry);
        }
        out
    }

    fn add(&mut self, word: &[u8]) -> Result<()> {
        self.add_word(word)
    }

    fn remove(&mut self, word: &[u8]) -> Result<()> {
        let cmp = SensitiveCompare::new(&self.wrd_lang);
        let clean = self.wrd_lang.to_clean_word(word);
        let removed = match self.wrd_words.get_mut(&clean) {
            Some(bucket) => {
                let before = bucket.len();
                bucket.retain(|s| !cmp.compare(word, &s.swd_word));
                before - bucket.len()
            }
            None => 0,
        };
        self.wrd_size -= removed;
        if self
            .wrd_words
            .get(&clean)
            .map(|b| b.is_empty())
            .unwrap_or(false)
        {
            self.wrd_words.remove(&clean);
            for keys in self.wrd_sl.values_mut() {
                keys.retain(|k| k != &clean);
            }
            self.wrd_sl.retain(|_, keys| !keys.is_empty());
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.wrd_words.clear();
        self.wrd_sl.clear();
        self.wrd_size = 0;
        Ok(())
    }
}

#[derive(Clone)]
struct StoredRepl {
    srp_mis: Vec<u8>,
    srp_info: u8,
    srp_repls: Vec<Vec<u8>>,
}

/// The replacement list: misspellings mapped to the corrections the
/// user has accepted for them.
pub struct ReplDict {
    rpd_id: DictId,
    rpd_lang: Arc<Lang>,
    rpd_use_soundslike: bool,
    rpd_words: HashMap<Vec<u8>, Vec<StoredRepl>>,
    rpd_sl: HashMap<Vec<u8>, Vec<Vec<u8>>>,
    rpd_file_encoding: String,
    rpd_size: usize,
}

impl ReplDict {
    pub fn new(lang: Arc<Lang>) -> ReplDict {
        let use_soundslike = lang.have_soundslike();
        let file_encoding = lang.data_encoding().to_string();
        ReplDict {
            rpd_id: DictId::anonymous(),
            rpd_lang: lang,
            rpd_use_soundslike: use_soundslike,
            rpd_words: HashMap::new(),
            rpd_sl: HashMap::new(),
            rpd_file_encoding: file_encoding,
            rpd_size: 0,
        }
    }

    pub fn set_id(&mut self, id: DictId) {
        self.rpd_id = id;
    }

    /// Stores a replacement pair; duplicates by sensitive compare
    /// are silently ignored.
    pub fn add_repl_pair(&mut self, mis: &[u8], cor: &[u8]) -> Result<()> {
        let cmp = SensitiveCompare::new(&self.rpd_lang);
        let clean = self.rpd_lang.to_clean_word(mis);
        let use_sl = self.rpd_use_soundslike;
        let sl = if use_sl {
            self.rpd_lang.to_soundslike(mis)
        } else {
            Vec::new()
        };
        let info = self.rpd_lang.get_word_info(mis);
        let bucket = self.rpd_words.entry(clean.clone()).or_default();
        let ix = match bucket.iter().position(|s| cmp.compare(mis, &s.srp_mis)) {
            Some(ix) => ix,
            None => {
                bucket.push(StoredRepl {
                    srp_mis: mis.to_vec(),
                    srp_info: info,
                    srp_repls: Vec::new(),
                });
                if use_sl {
                    let keys = self.rpd_sl.entry(sl).or_default();
                    if !keys.iter().any(|k| k == &clean) {
                        keys.push(clean);
                    }
                }
                bucket.len() - 1
            }
        };
        let stored = &mut bucket[ix];
        if stored.srp_repls.iter().any(|r| cmp.compare(cor, r)) {
            return Ok(());
        }
        stored.srp_repls.push(cor.to_vec());
        self.rpd_size += 1;
        Ok(())
    }

    pub fn merge(&mut self, reader: &mut dyn LineReader) -> Result<()> {
        let file_name = reader.get_name();
        let header = parse_header(reader, REPL_HEADER, &self.rpd_lang, &file_name)?;
        self.rpd_file_encoding = header.hdr_encoding.clone();
        while let Some(line) = next_raw_line(reader) {
            if line.is_empty() {
                continue;
            }
            let raw = unescape(&line);
            // a data line is "<misspelling> <replacement>"
            let split = match raw.iter().position(|b| *b == b' ') {
                Some(ix) => ix,
                None => continue, // bad line, ignore
            };
            let (mis_raw, cor_raw) = raw.split_at(split);
            let cor_raw = &cor_raw[1..];
            if cor_raw.is_empty() {
                continue;
            }
            let mis = self
                .rpd_lang
                .bytes_to_internal(&header.hdr_encoding, mis_raw)?;
            let cor = self
                .rpd_lang
                .bytes_to_internal(&header.hdr_encoding, cor_raw)?;
            self.add_repl_pair(&mis, &cor)
                .map_err(|e| e.with_file(&file_name))?;
        }
        Ok(())
    }

    pub fn save(&self, out: &mut dyn Write) -> Result<()> {
        let header = format!(
            "{} {} 0 {}\n",
            REPL_HEADER,
            self.rpd_lang.name(),
            self.rpd_file_encoding
        );
        let write_err = |_| Error::new(ErrorKind::CantWriteFile, "The write failed.");
        out.write_all(header.as_bytes()).map_err(write_err)?;
        let mut line = Vec::new();
        for bucket in self.rpd_words.values() {
            for stored in bucket {
                for repl in &stored.srp_repls {
                    let mis_raw = self
                        .rpd_lang
                        .internal_to_bytes(&self.rpd_file_encoding, &stored.srp_mis)?;
                    let cor_raw = self
                        .rpd_lang
                        .internal_to_bytes(&self.rpd_file_encoding, repl)?;
                    line.clear();
                    escape_into(&mut line, &mis_raw);
                    line.push(b' ');
                    escape_into(&mut line, &cor_raw);
                    line.push(b'\n');
                    out.write_all(&line).map_err(write_err)?;
                }
            }
        }
        Ok(())
    }

    fn repl_entry(&self, stored: &StoredRepl) -> Option<WordEntry> {
        let mut iter = stored.srp_repls.iter();
        let mut entry = WordEntry::new(
            EntryKind::WordEntryKind,
            iter.next()?.clone(),
            Vec::new(),
            0,
        );
        for repl in iter {
            entry.push_sibling(repl.clone(), Vec::new(), 0);
        }
        Some(entry)
    }
}

impl Dictionary for ReplDict {
    fn class_name(&self) -> &'static str {
        "ReplDict"
    }

    fn id(&self) -> &DictId {
        &self.rpd_id
    }

    fn lang_name(&self) -> &str {
        self.rpd_lang.name()
    }

    fn flags(&self) -> DictFlags {
        DictFlags {
            affix_compressed: false,
            invisible_soundslike: !self.rpd_use_soundslike,
            fast_lookup: true,
            fast_scan: false,
        }
    }

    fn size(&self) -> usize {
        self.rpd_size
    }

    fn lookup(&self, word: &[u8], cmp: &SensitiveCompare) -> Option<WordEntry> {
        let clean = self.rpd_lang.to_clean_word(word);
        let bucket = self.rpd_words.get(&clean)?;
        bucket
            .iter()
            .find(|s| cmp.compare(word, &s.srp_mis))
            .map(|s| {
                WordEntry::new(
                    EntryKind::MisspelledEntry,
                    s.srp_mis.clone(),
                    Vec::new(),
                    s.srp_info,
                )
            })
    }

    fn repl_lookup(&self, mis: &[u8]) -> Option<WordEntry> {
        let cmp = SensitiveCompare::new(&self.rpd_lang);
        let clean = self.rpd_lang.to_clean_word(mis);
        let bucket = self.rpd_words.get(&clean)?;
        let stored = bucket.iter().find(|s| cmp.compare(mis, &s.srp_mis))?;
        self.repl_entry(stored)
    }

    fn detailed_elements(&self) -> Vec<WordEntry> {
        let mut out = Vec::new();
        for bucket in self.rpd_words.values() {
            for stored in bucket {
                out.push(WordEntry::new(
                    EntryKind::MisspelledEntry,
                    stored.srp_mis.clone(),
                    Vec::new(),
                    stored.srp_info,
                ));
            }
        }
        out
    }

    fn add_repl(&mut self, mis: &[u8], cor: &[u8]) -> Result<()> {
        self.add_repl_pair(mis, cor)
    }

    fn remove_repl(&mut self, mis: &[u8], cor: &[u8]) -> Result<()> {
        let cmp = SensitiveCompare::new(&self.rpd_lang);
        let clean = self.rpd_lang.to_clean_word(mis);
        if let Some(bucket) = self.rpd_words.get_mut(&clean) {
            for stored in bucket.iter_mut() {
                if cmp.compare(mis, &stored.srp_mis) {
                    let before = stored.srp_repls.len();
                    stored.srp_repls.retain(|r| !cmp.compare(cor, r));
                    self.rpd_size -= before - stored.srp_repls.len();
                }
            }
            bucket.retain(|s| !s.srp_repls.is_empty());
            if bucket.is_empty() {
                self.rpd_words.remove(&clean);
            }
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.rpd_words.clear();
        self.rpd_sl.clear();
        self.rpd_size = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::testkit::test_lang;
    use crate::reader::VecLineReader;

    #[test]
    fn add_lookup_remove() {
        let lang = test_lang();
        let mut dict = WritableDict::new(lang.clone());
        dict.add_word(b"foobar").unwrap();
        dict.add_word(b"Hague").unwrap();
        assert_eq!(dict.size(), 2);
        let cmp = SensitiveCompare::new(&lang);
        assert!(dict.lookup(b"foobar", &cmp).is_some());
        assert!(dict.lookup(b"FOOBAR", &cmp).is_some());
        assert!(dict.lookup(b"Foobar", &cmp).is_some());
        assert!(dict.lookup(b"hague", &cmp).is_none()); // stored case binds
        assert!(dict.lookup(b"Hague", &cmp).is_some());
        dict.remove(b"foobar").unwrap();
        assert!(dict.lookup(b"foobar", &cmp).is_none());
        assert_eq!(dict.size(), 1);
    }

    #[test]
    fn invalid_add_is_rejected_without_insertion() {
        let lang = test_lang();
        let mut dict = WritableDict::new(lang);
        assert!(dict.add_word(b"a..b").is_err());
        assert_eq!(dict.size(), 0);
    }

    #[test]
    fn duplicate_add_is_a_noop() {
        let lang = test_lang();
        let mut dict = WritableDict::new(lang);
        dict.add_word(b"cat").unwrap();
        dict.add_word(b"cat").unwrap();
        assert_eq!(dict.size(), 1);
    }

    #[test]
    fn soundslike_lookup_groups_words() {
        let lang = test_lang();
        let mut dict = WritableDict::new(lang.clone());
        dict.add_word(b"resume").unwrap();
        dict.add_word(&[b'r', b'e', b's', b'u', b'm', 0xE9]).unwrap();
        let sl = lang.to_soundslike(b"resume");
        let entry = dict.soundslike_lookup(&sl).unwrap();
        assert_eq!(entry.all_words().len(), 2);
    }

    #[test]
    fn save_and_merge_round_trip() {
        let lang = test_lang();
        let mut dict = WritableDict::new(lang.clone());
        dict.add_word(b"foobar").unwrap();
        dict.add_word(b"it's").unwrap();
        let mut saved = Vec::new();
        dict.save(&mut saved).unwrap();
        let text = String::from_utf8(saved.clone()).unwrap();
        let first = text.lines().next().unwrap();
        assert!(first.starts_with("personal_ws-1.1 en 2 "));

        let mut reloaded = WritableDict::new(lang.clone());
        let mut reader = VecLineReader::new("en.pws", saved);
        reloaded.merge(&mut reader).unwrap();
        assert_eq!(reloaded.size(), 2);
        let cmp = SensitiveCompare::new(&lang);
        assert!(reloaded.lookup(b"foobar", &cmp).is_some());
        assert!(reloaded.lookup(b"it's", &cmp).is_some());
    }

    #[test]
    fn merge_rejects_wrong_language() {
        let lang = test_lang();
        let mut dict = WritableDict::new(lang);
        let mut reader =
            VecLineReader::from_str("de.pws", "personal_ws-1.1 de 1 iso-8859-1\nwort\n");
        let err = dict.merge(&mut reader).unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::MismatchedLanguage);
    }

    #[test]
    fn merge_rejects_bad_magic() {
        let lang = test_lang();
        let mut dict = WritableDict::new(lang);
        let mut reader = VecLineReader::from_str("x.pws", "personal_wl en 1\nword\n");
        let err = dict.merge(&mut reader).unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::BadMagic);
        assert!(err.is_a(ErrorKind::BadFileFormat));
    }

    #[test]
    fn escapes_round_trip() {
        let mut out = Vec::new();
        escape_into(&mut out, b"a\nb\\c\rd");
        assert_eq!(out, b"a\\nb\\\\c\\rd".to_vec());
        assert_eq!(unescape(&out), b"a\nb\\c\rd".to_vec());
    }

    #[test]
    fn repl_store_and_lookup() {
        let lang = test_lang();
        let mut dict = ReplDict::new(lang);
        dict.add_repl_pair(b"teh", b"the").unwrap();
        dict.add_repl_pair(b"teh", b"the").unwrap(); // duplicate ignored
        dict.add_repl_pair(b"teh", b"ten").unwrap();
        assert_eq!(dict.size(), 2);
        let entry = dict.repl_lookup(b"teh").unwrap();
        let words = entry.all_words();
        assert_eq!(words[0], b"the".to_vec());
        assert_eq!(words.len(), 2);
        assert!(dict.repl_lookup(b"xyz").is_none());
    }

    #[test]
    fn repl_save_and_merge_round_trip() {
        let lang = test_lang();
        let mut dict = ReplDict::new(lang.clone());
        dict.add_repl_pair(b"teh", b"the").unwrap();
        let mut saved = Vec::new();
        dict.save(&mut saved).unwrap();
        let text = String::from_utf8(saved.clone()).unwrap();
        assert!(text.starts_with("personal_repl-1.1 en 0 "));
        assert!(text.contains("teh the"));

        let mut reloaded = ReplDict::new(lang);
        let mut reader = VecLineReader::new("en.prepl", saved);
        reloaded.merge(&mut reader).unwrap();
        let entry = reloaded.repl_lookup(b"teh").unwrap();
        assert_eq!(entry.wen_word, b"the".to_vec());
    }

    #[test]
    fn remove_repl_drops_pair() {
        let lang = test_lang();
        let mut dict = ReplDict::new(lang);
        dict.add_repl_pair(b"teh", b"the").unwrap();
        dict.remove_repl(b"teh", b"the").unwrap();
        assert!(dict.repl_lookup(b"teh").is_none());
        assert_eq!(dict.size(), 0);
    }
}
