/// The uniform dictionary interface: every word source, readonly or
/// writable, is queried through it. Unsupported operations report
/// `UnimplementedMethod` rather than being absent.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::lang::SensitiveCompare;

/// What a returned entry is.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum EntryKind {
    #[default]
    OtherEntry,
    WordEntryKind,
    SoundslikeEntry,
    CleanEntry,
    MisspelledEntry,
}

/// The result of any lookup. A single returned entry can be walked
/// to its siblings when one key maps to several words.
#[derive(Debug, Clone, Default)]
pub struct WordEntry {
    pub wen_word: Vec<u8>,
    pub wen_aff: Vec<u8>,
    pub wen_what: EntryKind,
    pub wen_info: u8,
    pub wen_freq: u32,
    wen_rest: Vec<(Vec<u8>, Vec<u8>, u8)>,
}

impl WordEntry {
    pub fn new(what: EntryKind, word: Vec<u8>, aff: Vec<u8>, info: u8) -> WordEntry {
        WordEntry {
            wen_word: word,
            wen_aff: aff,
            wen_what: what,
            wen_info: info,
            wen_freq: 0,
            wen_rest: Vec::new(),
        }
    }

    /// Queues a sibling behind this entry.
    pub fn push_sibling(&mut self, word: Vec<u8>, aff: Vec<u8>, info: u8) {
        self.wen_rest.push((word, aff, info));
    }

    pub fn have_more(&self) -> bool {
        !self.wen_rest.is_empty()
    }

    /// Steps to the next sibling; false when exhausted.
    pub fn adv(&mut self) -> bool {
        if self.wen_rest.is_empty() {
            return false;
        }
        let (word, aff, info) = self.wen_rest.remove(0);
        self.wen_word = word;
        self.wen_aff = aff;
        self.wen_info = info;
        true
    }

    /// This entry and all its siblings as plain words.
    pub fn all_words(mut self) -> Vec<Vec<u8>> {
        let mut out = vec![std::mem::take(&mut self.wen_word)];
        while self.adv() {
            out.push(std::mem::take(&mut self.wen_word));
        }
        out
    }
}

/// Which lookup shapes a dictionary supports.
#[derive(Debug, Default, Copy, Clone)]
pub struct DictFlags {
    pub affix_compressed: bool,
    pub invisible_soundslike: bool,
    pub fast_lookup: bool,
    pub fast_scan: bool,
}

/// Identity of a dictionary, used by the process-wide cache so one
/// file loaded under two paths is shared. Two ids are equal when
/// their OS file identities match; without one, the normalized path
/// decides; without either, the instance token does.
#[derive(Debug, Clone)]
pub struct DictId {
    did_token: u64,
    did_path: Option<String>,
    did_file_id: Option<(u64, u64)>, // (dev, ino)
}

static NEXT_DICT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl DictId {
    pub fn anonymous() -> DictId {
        DictId {
            did_token: NEXT_DICT_TOKEN.fetch_add(1, Ordering::Relaxed),
            did_path: None,
            did_file_id: None,
        }
    }

    pub fn from_path(path: &str) -> DictId {
        DictId {
            did_token: NEXT_DICT_TOKEN.fetch_add(1, Ordering::Relaxed),
            did_path: Some(path.to_string()),
            did_file_id: None,
        }
    }

    pub fn set_file_id(&mut self, dev: u64, ino: u64) {
        self.did_file_id = Some((dev, ino));
    }

    pub fn path(&self) -> Option<&str> {
        self.did_path.as_deref()
    }

    fn cache_key(&self) -> String {
        if let Some((dev, ino)) = self.did_file_id {
            return format!("id:{}:{}", dev, ino);
        }
        if let Some(path) = &self.did_path {
            return format!("path:{}", path);
        }
        format!("tok:{}", self.did_token)
    }
}

impl PartialEq for DictId {
    fn eq(&self, other: &DictId) -> bool {
        if let (Some(a), Some(b)) = (self.did_file_id, other.did_file_id) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.did_path, &other.did_path) {
            return a == b;
        }
        self.did_token == other.did_token
    }
}

impl Eq for DictId {}

/// The dictionary interface. Lookups are infallible (a miss is just
/// None); mutation defaults to `UnimplementedMethod`.
pub trait Dictionary: Send + Sync {
    fn class_name(&self) -> &'static str;
    fn id(&self) -> &DictId;
    fn lang_name(&self) -> &str;

    fn flags(&self) -> DictFlags {
        DictFlags::default()
    }

    fn size(&self) -> usize;

    fn empty(&self) -> bool {
        self.size() == 0
    }

    /// Case/accent sensitive match.
    fn lookup(&self, _word: &[u8], _cmp: &SensitiveCompare) -> Option<WordEntry> {
        None
    }

    /// Match by pre-normalized clean form.
    fn clean_lookup(&self, _clean: &[u8]) -> Option<WordEntry> {
        None
    }

    /// All words sharing a soundslike key.
    fn soundslike_lookup(&self, _sl: &[u8]) -> Option<WordEntry> {
        None
    }

    /// Stored replacements for a misspelling (replacement
    /// dictionaries only).
    fn repl_lookup(&self, _mis: &[u8]) -> Option<WordEntry> {
        None
    }

    /// Every entry, in detail.
    fn detailed_elements(&self) -> Vec<WordEntry> {
        Vec::new()
    }

    /// Every entry as a plain word.
    fn elements(&self) -> Vec<Vec<u8>> {
        self.detailed_elements()
            .into_iter()
            .map(|e| e.wen_word)
            .collect()
    }

    /// One entry per soundslike key, walkable to its words.
    fn soundslike_elements(&self) -> Vec<WordEntry> {
        Vec::new()
    }

    fn add(&mut self, _word: &[u8]) -> Result<()> {
        Err(Error::unimplemented("add", self.class_name()))
    }

    fn add_with_aff(&mut self, _word: &[u8], _aff: &[u8]) -> Result<()> {
        Err(Error::unimplemented("add_with_aff", self.class_name()))
    }

    fn remove(&mut self, _word: &[u8]) -> Result<()> {
        Err(Error::unimplemented("remove", self.class_name()))
    }

    fn add_repl(&mut self, _mis: &[u8], _cor: &[u8]) -> Result<()> {
        Err(Error::unimplemented("add_repl", self.class_name()))
    }

    fn remove_repl(&mut self, _mis: &[u8], _cor: &[u8]) -> Result<()> {
        Err(Error::unimplemented("remove_repl", self.class_name()))
    }

    fn clear(&mut self) -> Result<()> {
        Err(Error::unimplemented("clear", self.class_name()))
    }

    fn synchronize(&mut self) -> Result<()> {
        Err(Error::unimplemented("synchronize", self.class_name()))
    }

    fn save_noupdate(&mut self) -> Result<()> {
        Err(Error::unimplemented("save_noupdate", self.class_name()))
    }
}

// The process-wide dictionary cache. Entries are reference counted
// through Arc; releasing drops entries nobody else holds.
static DICT_CACHE: OnceLock<Mutex<HashMap<String, Arc<dyn Dictionary>>>> = OnceLock::new();

fn dict_cache() -> &'static Mutex<HashMap<String, Arc<dyn Dictionary>>> {
    DICT_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Finds a cached dictionary by identity, or loads and caches one.
pub fn cached_dict(
    id: &DictId,
    make: impl FnOnce() -> Result<Arc<dyn Dictionary>>,
) -> Result<Arc<dyn Dictionary>> {
    let key = id.cache_key();
    {
        let map = dict_cache().lock().unwrap();
        if let Some(found) = map.get(&key) {
            return Ok(found.clone());
        }
    }
    let made = make()?;
    let mut map = dict_cache().lock().unwrap();
    Ok(map.entry(key).or_insert(made).clone())
}

/// Releases one cache slot; the dictionary itself lives on while
/// other handles exist.
pub fn release_dict(id: &DictId) {
    let mut map = dict_cache().lock().unwrap();
    map.remove(&id.cache_key());
}

/// Empties the cache entirely.
pub fn detach_all_dicts() {
    let mut map = dict_cache().lock().unwrap();
    map.clear();
}
