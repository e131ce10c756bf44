/// The speller: the ordered dictionary stack plus per-session
/// state. Checking walks the stack, then the affix tables, then
/// run-together splitting.
use std::sync::Arc;

use crate::config::Config;
use crate::dict::Dictionary;
use crate::error::Result;
use crate::lang::{Lang, SensitiveCompare};
use crate::writable::{ReplDict, WritableDict};

/// The explicit interface through which the speller's writable
/// lists are persisted; the std crate implements it with locked,
/// re-merging file saves.
pub trait WordListStore {
    fn sync_personal(&mut self, dict: &mut WritableDict) -> Result<()>;
    fn sync_repl(&mut self, dict: &mut ReplDict) -> Result<()>;
}

pub struct SpellerOptions {
    pub spo_run_together: bool,
    pub spo_run_together_limit: u32,
    pub spo_run_together_min: u32,
    pub spo_ignore_case: bool,
    pub spo_ignore_accents: bool,
}

impl SpellerOptions {
    pub fn from_config(config: &Config) -> Result<SpellerOptions> {
        Ok(SpellerOptions {
            spo_run_together: config.retrieve_bool("run-together")?,
            spo_run_together_limit: config.retrieve_int("run-together-limit")? as u32,
            spo_run_together_min: config.retrieve_int("run-together-min")? as u32,
            spo_ignore_case: config.retrieve_bool("ignore-case")?,
            spo_ignore_accents: config.retrieve_bool("ignore-accents")?,
        })
    }

    pub fn defaults() -> SpellerOptions {
        SpellerOptions {
            spo_run_together: false,
            spo_run_together_limit: 8,
            spo_run_together_min: 3,
            spo_ignore_case: false,
            spo_ignore_accents: false,
        }
    }
}

pub struct Speller {
    spl_lang: Arc<Lang>,
    spl_main: Vec<Arc<dyn Dictionary>>,
    spl_session: WritableDict,
    spl_personal: WritableDict,
    spl_repl: ReplDict,
    spl_opts: SpellerOptions,
}

impl Speller {
    pub fn new(lang: Arc<Lang>, opts: SpellerOptions) -> Speller {
        Speller {
            spl_session: WritableDict::new_session(lang.clone()),
            spl_personal: WritableDict::new(lang.clone()),
            spl_repl: ReplDict::new(lang.clone()),
            spl_lang: lang,
            spl_main: Vec::new(),
            spl_opts: opts,
        }
    }

    pub fn lang(&self) -> &Arc<Lang> {
        &self.spl_lang
    }

    pub fn options(&self) -> &SpellerOptions {
        &self.spl_opts
    }

    /// Appends a dictionary to the main stack, in search order.
    pub fn add_main(&mut self, dict: Arc<dyn Dictionary>) {
        self.spl_main.push(dict);
    }

    pub fn main_dicts(&self) -> &[Arc<dyn Dictionary>] {
        &self.spl_main
    }

    pub fn personal_mut(&mut self) -> &mut WritableDict {
        &mut self.spl_personal
    }

    pub fn repl_mut(&mut self) -> &mut ReplDict {
        &mut self.spl_repl
    }

    fn compare(&self) -> SensitiveCompare {
        let mut cmp = SensitiveCompare::new(&self.spl_lang);
        cmp.scm_case_insensitive = self.spl_opts.spo_ignore_case;
        cmp.scm_ignore_accents = self.spl_opts.spo_ignore_accents;
        cmp
    }

    // a direct hit in any dictionary of the stack, session and
    // personal lists first
    fn stack_lookup(&self, word: &[u8]) -> bool {
        let cmp = self.compare();
        if self.spl_session.lookup(word, &cmp).is_some() {
            return true;
        }
        if self.spl_personal.lookup(word, &cmp).is_some() {
            return true;
        }
        self.spl_main.iter().any(|d| d.lookup(word, &cmp).is_some())
    }

    // affix expansion over every affix-compressed dictionary
    fn affix_lookup(&self, word: &[u8]) -> bool {
        let affix = match self.spl_lang.affix() {
            Some(affix) => affix,
            None => return false,
        };
        let lang = &self.spl_lang;
        for dict in self.spl_main.iter().filter(|d| d.flags().affix_compressed) {
            let lookup = |root: &[u8]| -> Option<Vec<u8>> {
                let clean = lang.to_clean_word(root);
                let mut entry = dict.clean_lookup(&clean)?;
                let mut aff = std::mem::take(&mut entry.wen_aff);
                while entry.adv() {
                    aff.extend_from_slice(&entry.wen_aff);
                }
                Some(aff)
            };
            let mut info = crate::affix::CheckInfo::default();
            if affix.affix_check(&lookup, word, &mut info) {
                return true;
            }
        }
        false
    }

    fn check_single(&self, word: &[u8]) -> bool {
        if word.is_empty() {
            return false;
        }
        if self.stack_lookup(word) {
            return true;
        }
        self.affix_lookup(word)
    }

    // bounded recursive split into run-together components
    fn check_runtogether(&self, word: &[u8], limit: u32) -> bool {
        if self.check_single(word) {
            return true;
        }
        if limit == 0 {
            return false;
        }
        let min = self.spl_opts.spo_run_together_min as usize;
        if word.len() < 2 * min {
            return false;
        }
        for split in min..=word.len() - min {
            let (head, tail) = word.split_at(split);
            if self.check_single(head) && self.check_runtogether(tail, limit - 1) {
                return true;
            }
        }
        false
    }

    /// Checks a word given in internal bytes.
    pub fn check_word_bytes(&self, word: &[u8]) -> bool {
        if word.is_empty() {
            return true;
        }
        if word.len() > 240 {
            return false;
        }
        if self.spl_opts.spo_run_together {
            self.check_runtogether(word, self.spl_opts.spo_run_together_limit)
        } else {
            self.check_single(word)
        }
    }

    /// Checks a UTF-8 word.
    pub fn check(&self, word: &str) -> bool {
        let internal = self.spl_lang.to_internal_word(word);
        self.check_word_bytes(&internal)
    }

    /// Adds to the user's persistent list. Validation failure is
    /// fatal to this add only.
    pub fn add_to_personal(&mut self, word: &str) -> Result<()> {
        let internal = self.spl_lang.to_internal_word(word);
        self.spl_personal.add_word(&internal)
    }

    /// Adds to the transient session list.
    pub fn add_to_session(&mut self, word: &str) -> Result<()> {
        let internal = self.spl_lang.to_internal_word(word);
        self.spl_session.add_word(&internal)
    }

    /// Records a correction the user accepted for a misspelling.
    pub fn store_replacement(&mut self, mis: &str, cor: &str) -> Result<()> {
        let mis_b = self.spl_lang.to_internal_word(mis);
        let cor_b = self.spl_lang.to_internal_word(cor);
        self.spl_repl.add_repl_pair(&mis_b, &cor_b)
    }

    pub fn clear_session(&mut self) {
        let _ = crate::dict::Dictionary::clear(&mut self.spl_session);
    }

    /// The replacement-table seam of the suggestion search: stored
    /// corrections for this exact misspelling, best first. The
    /// edit-distance and phonetic search live in their own module
    /// and extend this list.
    pub fn suggest(&self, word: &str) -> Vec<String> {
        let internal = self.spl_lang.to_internal_word(word);
        let mut out = Vec::new();
        if let Some(entry) = self.spl_repl.repl_lookup(&internal) {
            for repl in entry.all_words() {
                out.push(self.spl_lang.to_display(&repl));
            }
        }
        out
    }

    /// Persists the personal and replacement lists through `store`.
    pub fn save_all_word_lists(&mut self, store: &mut dyn WordListStore) -> Result<()> {
        store.sync_personal(&mut self.spl_personal)?;
        store.sync_repl(&mut self.spl_repl)?;
        Ok(())
    }
}
