// Filesystem and environment plumbing around the engine: data-file
// discovery, dictionary-info scanning and scoring, personal
// word-list persistence with locking and re-merge, and the library
// facade used by the command line tool.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use orthospell_core::checker::Checker;
use orthospell_core::config::Config;
use orthospell_core::dict::{cached_dict, DictId, Dictionary};
use orthospell_core::error::{Error, ErrorKind, Result};
use orthospell_core::filter::{mode_filters, new_filter, FilterChain};
use orthospell_core::lang::{new_lang, Lang};
use orthospell_core::multi::{DictLoader, MultiDict};
use orthospell_core::reader::{DataLines, DataSource, LineReader};
use orthospell_core::readonly::{LoadOptions, MainDict};
use orthospell_core::speller::{Speller, SpellerOptions, WordListStore};
use orthospell_core::writable::{ReplDict, WritableDict};

pub const PROGRAM_VERSION: &str = "0.1.0";

const CONF_ENV: &str = "ORTHOSPELL_CONF";
const DICPATH_ENV: &str = "ORTHOSPELL_DICPATH";
const COMMON_DICPATH_ENV: &str = "DICPATH";

//
// file-backed line reading
//

pub struct FileLineReader {
    flr_name: String,
    flr_reader: BufReader<File>,
}

impl FileLineReader {
    pub fn open(path: &Path) -> Result<FileLineReader> {
        let file = File::open(path)
            .map_err(|_| Error::cant_read_file(&path.display().to_string()))?;
        Ok(FileLineReader {
            flr_name: path.display().to_string(),
            flr_reader: BufReader::new(file),
        })
    }
}

impl LineReader for FileLineReader {
    fn get_name(&self) -> String {
        self.flr_name.clone()
    }

    fn read_line(&mut self) -> Option<Vec<u8>> {
        let mut line_buf: Vec<u8> = Vec::with_capacity(128);
        let mut byte = [0u8; 1];
        loop {
            match self.flr_reader.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    line_buf.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(_) => return None,
            }
        }
        if line_buf.is_empty() {
            None
        } else {
            Some(line_buf)
        }
    }
}

/// Opens named data files by searching a directory list.
pub struct FsDataSource {
    fds_dirs: Vec<PathBuf>,
}

impl FsDataSource {
    pub fn new(dirs: Vec<PathBuf>) -> FsDataSource {
        FsDataSource { fds_dirs: dirs }
    }

    /// Search path from the config plus the path environment
    /// variables (the first defined of the two wins).
    pub fn from_config(config: &Config) -> Result<FsDataSource> {
        let mut dirs = Vec::new();
        for key in ["data-dir", "dict-dir"] {
            let dir = PathBuf::from(config.retrieve(key)?);
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        for env_name in [DICPATH_ENV, COMMON_DICPATH_ENV] {
            if let Some(paths) = std::env::var_os(env_name) {
                for dir in std::env::split_paths(&paths) {
                    if !dirs.contains(&dir) {
                        dirs.push(dir);
                    }
                }
                break;
            }
        }
        Ok(FsDataSource::new(dirs))
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.fds_dirs
    }

    /// The full path a name resolves to, if any directory has it.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(name);
        if name.contains(std::path::MAIN_SEPARATOR) && direct.exists() {
            return Some(direct);
        }
        for dir in &self.fds_dirs {
            let path = dir.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }
}

impl DataSource for FsDataSource {
    fn open(&self, name: &str) -> Result<Box<dyn LineReader>> {
        match self.resolve(name) {
            Some(path) => Ok(Box::new(FileLineReader::open(&path)?)),
            None => Err(Error::cant_read_file(name)),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

//
// dictionary info scanning and scoring
//

/// One dictionary description parsed from a `.info` file.
#[derive(Debug, Clone)]
pub struct DictInfo {
    pub dni_name: String,
    pub dni_code: String,
    pub dni_alternates: Vec<String>,
    pub dni_varieties: Vec<String>,
    pub dni_module: String,
    pub dni_size: u32,
    pub dni_path: String,
}

fn parse_dict_info(reader: &mut dyn LineReader) -> Result<DictInfo> {
    let file_name = reader.get_name();
    let mut info = DictInfo {
        dni_name: String::new(),
        dni_code: String::new(),
        dni_alternates: Vec::new(),
        dni_varieties: Vec::new(),
        dni_module: "default".to_string(),
        dni_size: 60,
        dni_path: String::new(),
    };
    let mut lines = DataLines::new(reader);
    while let Some(line) = lines.next_line() {
        let (key, value) = line.split_pair();
        match key {
            "name" => info.dni_name = value.to_string(),
            "code" => info.dni_code = value.to_string(),
            "alternate" => info.dni_alternates.push(value.to_string()),
            "variety" => info.dni_varieties.push(value.to_string()),
            "module" => info.dni_module = value.to_string(),
            "size" => {
                info.dni_size = value.parse().map_err(|_| {
                    Error::new(ErrorKind::BadValue, "The size must be a number.")
                        .with_file_line(&file_name, line.dtl_line_no)
                })?
            }
            "path" => info.dni_path = value.to_string(),
            _ => {
                return Err(Error::new(
                    ErrorKind::UnknownKey,
                    format!("The key \"{}\" is unknown.", key),
                )
                .with_file_line(&file_name, line.dtl_line_no))
            }
        }
    }
    if info.dni_code.is_empty() || info.dni_path.is_empty() {
        return Err(Error::bad_file_format(
            &file_name,
            "The fields \"code\" and \"path\" are required.",
        ));
    }
    Ok(info)
}

/// Every readable `.info` file in the search directories.
pub fn scan_dict_infos(source: &FsDataSource) -> Vec<DictInfo> {
    let mut infos = Vec::new();
    for dir in source.dirs() {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "info") != Some(true) {
                continue;
            }
            let mut reader = match FileLineReader::open(&path) {
                Ok(reader) => reader,
                Err(_) => continue,
            };
            match parse_dict_info(&mut reader) {
                Ok(info) => infos.push(info),
                Err(err) => log::warn!("{}", err),
            }
        }
    }
    infos
}

fn lang_part(code: &str) -> &str {
    code.split(['_', '-']).next().unwrap_or(code)
}

// 0 exact code, 1 listed alternate, 2 language-only; None rejected
fn code_class(info: &DictInfo, want: &str) -> Option<u32> {
    if info.dni_code.eq_ignore_ascii_case(want) {
        return Some(0);
    }
    if info
        .dni_alternates
        .iter()
        .any(|alt| alt.eq_ignore_ascii_case(want))
    {
        return Some(1);
    }
    if info.dni_code.eq_ignore_ascii_case(lang_part(want)) {
        return Some(2);
    }
    None
}

// 2 full variety match, 1 partial, 0 none
fn variety_score(info: &DictInfo, wanted: &[String]) -> u32 {
    if wanted.is_empty() {
        return if info.dni_varieties.is_empty() { 2 } else { 0 };
    }
    let hits = wanted
        .iter()
        .filter(|v| info.dni_varieties.contains(v))
        .count();
    if hits == wanted.len() {
        2
    } else if hits > 0 {
        1
    } else {
        0
    }
}

// sign-aware distance from the wanted size; None means excluded
fn size_penalty(spec: &str, have: u32) -> Option<u32> {
    let (modifier, digits) = match spec.chars().next() {
        Some(c @ ('+' | '-' | '<' | '>')) => (Some(c), &spec[1..]),
        _ => (None, spec),
    };
    let want: u32 = digits.parse().unwrap_or(60);
    match modifier {
        Some('+') => Some(if have >= want {
            have - want
        } else {
            1000 + (want - have)
        }),
        Some('-') => Some(if have <= want {
            want - have
        } else {
            1000 + (have - want)
        }),
        Some('<') => (have < want).then(|| want - have),
        Some('>') => (have > want).then(|| have - want),
        _ => Some(want.abs_diff(have)),
    }
}

/// Scores the scanned dictionaries against the config and picks the
/// best word list for the requested language.
pub fn find_word_list(config: &Config, infos: &[DictInfo]) -> Result<DictInfo> {
    let want = config.retrieve("master")?;
    let wanted_varieties = config.retrieve_list("variety")?;
    let module = config.retrieve("module")?;
    let size_spec = config.retrieve("size")?;
    let mut best: Option<(u32, u32, u32, u32, &DictInfo)> = None;
    for info in infos {
        let class = match code_class(info, &want) {
            Some(class) => class,
            None => continue,
        };
        let variety = variety_score(info, &wanted_varieties);
        let module_miss = if info.dni_module == module { 0 } else { 1 };
        let size = match size_penalty(&size_spec, info.dni_size) {
            Some(size) => size,
            None => continue,
        };
        let better = match &best {
            None => true,
            Some((c, v, m, s, b)) => {
                (class, 2 - variety, module_miss, size, &info.dni_code)
                    < (*c, *v, *m, *s, &b.dni_code)
            }
        };
        if better {
            best = Some((class, 2 - variety, module_miss, size, info));
        }
    }
    match best {
        Some((_, _, _, _, info)) => Ok(info.clone()),
        None => Err(Error::new(
            ErrorKind::NoWordlistForLang,
            format!("No word lists can be found for the language \"{}\".", want),
        )),
    }
}

//
// locked persistence of the writable lists
//

// advisory lock via a sibling lock file; systems without fcntl
// style locks get the same behavior everywhere
struct FileLock {
    flk_path: PathBuf,
}

impl FileLock {
    fn acquire(target: &Path) -> Result<FileLock> {
        let mut name = target.as_os_str().to_os_string();
        name.push(".lock");
        let lock_path = PathBuf::from(name);
        for _ in 0..50 {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => {
                    return Ok(FileLock {
                        flk_path: lock_path,
                    })
                }
                Err(_) => std::thread::sleep(std::time::Duration::from_millis(10)),
            }
        }
        Err(Error::new(
            ErrorKind::CantWriteFile,
            format!(
                "The file \"{}\" is locked by another process.",
                target.display()
            ),
        ))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.flk_path);
    }
}

fn mtime_of(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

// write to a sibling temp file, then atomically move into place
fn atomic_write(path: &Path, write: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    let mut name = path.as_os_str().to_os_string();
    name.push(".new");
    let tmp_path = PathBuf::from(name);
    {
        let mut file = File::create(&tmp_path)
            .map_err(|_| Error::cant_write_file(&tmp_path.display().to_string()))?;
        write(&mut file)?;
        file.flush()
            .map_err(|_| Error::cant_write_file(&tmp_path.display().to_string()))?;
    }
    fs::rename(&tmp_path, path)
        .map_err(|_| Error::cant_write_file(&path.display().to_string()))
}

/// Persists the speller's personal and replacement lists: loads
/// them at startup and saves them back under a lock, re-merging
/// whatever reached the files in the meantime.
pub struct FsWordListStore {
    fws_personal: PathBuf,
    fws_repl: PathBuf,
    fws_personal_date: Option<SystemTime>,
    fws_repl_date: Option<SystemTime>,
}

// the compatibility name an older installation may have used
fn compat_path(path: &Path) -> Option<PathBuf> {
    let text = path.display().to_string();
    if let Some(base) = text.strip_suffix(".pws") {
        return Some(PathBuf::from(format!("{}.per", base)));
    }
    if let Some(base) = text.strip_suffix(".prepl") {
        return Some(PathBuf::from(format!("{}.rpl", base)));
    }
    None
}

impl FsWordListStore {
    pub fn new(config: &Config) -> Result<FsWordListStore> {
        Ok(FsWordListStore {
            fws_personal: PathBuf::from(config.retrieve("personal-path")?),
            fws_repl: PathBuf::from(config.retrieve("repl-path")?),
            fws_personal_date: None,
            fws_repl_date: None,
        })
    }

    pub fn personal_path(&self) -> &Path {
        &self.fws_personal
    }

    fn load_one(
        path: &Path,
        date: &mut Option<SystemTime>,
        target: &mut dyn SyncTarget,
    ) -> Result<()> {
        if path.exists() {
            let mut reader = FileLineReader::open(path)?;
            target.merge_in(&mut reader)?;
            *date = mtime_of(path);
        } else if let Some(compat) = compat_path(path) {
            if compat.exists() {
                let mut reader = FileLineReader::open(&compat)?;
                target.merge_in(&mut reader)?;
            }
        }
        Ok(())
    }

    fn sync_one(
        path: &Path,
        date: &mut Option<SystemTime>,
        target: &mut dyn SyncTarget,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = fs::create_dir_all(parent);
            }
        }
        let lock = FileLock::acquire(path)?;
        // someone else may have written the file since we read it
        if path.exists() && mtime_of(path) != *date {
            let mut reader = FileLineReader::open(path)?;
            target.merge_in(&mut reader)?;
        }
        atomic_write(path, |out| target.save_out(out))?;
        *date = mtime_of(path);
        drop(lock);
        Ok(())
    }

    /// Loads both lists into the speller, if their files exist.
    pub fn load(&mut self, speller: &mut Speller) -> Result<()> {
        let personal = self.fws_personal.clone();
        Self::load_one(&personal, &mut self.fws_personal_date, speller.personal_mut())?;
        let repl = self.fws_repl.clone();
        Self::load_one(&repl, &mut self.fws_repl_date, speller.repl_mut())?;
        Ok(())
    }
}

// the two writable list kinds behind one merge/save surface
trait SyncTarget {
    fn merge_in(&mut self, reader: &mut dyn LineReader) -> Result<()>;
    fn save_out(&self, out: &mut dyn Write) -> Result<()>;
}

impl SyncTarget for WritableDict {
    fn merge_in(&mut self, reader: &mut dyn LineReader) -> Result<()> {
        self.merge(reader)
    }

    fn save_out(&self, out: &mut dyn Write) -> Result<()> {
        self.save(out)
    }
}

impl SyncTarget for ReplDict {
    fn merge_in(&mut self, reader: &mut dyn LineReader) -> Result<()> {
        self.merge(reader)
    }

    fn save_out(&self, out: &mut dyn Write) -> Result<()> {
        self.save(out)
    }
}

impl WordListStore for FsWordListStore {
    fn sync_personal(&mut self, dict: &mut WritableDict) -> Result<()> {
        let path = self.fws_personal.clone();
        Self::sync_one(&path, &mut self.fws_personal_date, dict)
    }

    fn sync_repl(&mut self, dict: &mut ReplDict) -> Result<()> {
        let path = self.fws_repl.clone();
        Self::sync_one(&path, &mut self.fws_repl_date, dict)
    }
}

//
// dictionary loading (word lists, multi recipes)
//

struct FsDictLoader<'a> {
    fdl_source: &'a FsDataSource,
    fdl_lang: Arc<Lang>,
    fdl_options: LoadOptions,
}

fn file_identity(path: &Path) -> Option<(u64, u64)> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let meta = fs::metadata(path).ok()?;
        Some((meta.dev(), meta.ino()))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

fn dict_id_for(path: &Path) -> DictId {
    let mut id = DictId::from_path(&path.display().to_string());
    if let Some((dev, ino)) = file_identity(path) {
        id.set_file_id(dev, ino);
    }
    id
}

// the first line decides what kind of dictionary a file is
fn sniff_magic(path: &Path) -> Result<DictMagic> {
    let mut reader = FileLineReader::open(path)?;
    let head = reader.read_line().unwrap_or_default();
    let text: String = head.iter().map(|b| *b as char).collect();
    if text.starts_with(orthospell_core::readonly::ROWL_MAGIC) {
        return Err(Error::bad_file_format(
            &path.display().to_string(),
            "The binary dictionary format is not supported here.",
        ));
    }
    if text.starts_with("personal_repl") {
        Ok(DictMagic::ReplList)
    } else if text.starts_with("personal_ws") {
        Ok(DictMagic::PersonalList)
    } else {
        Ok(DictMagic::WordList)
    }
}

enum DictMagic {
    WordList,
    PersonalList,
    ReplList,
}

impl<'a> DictLoader for FsDictLoader<'a> {
    fn load_dict(&mut self, name: &str) -> Result<Arc<dyn Dictionary>> {
        let path = self
            .fdl_source
            .resolve(name)
            .ok_or_else(|| Error::cant_read_file(name))?;
        if path.extension().map(|e| e == "multi") == Some(true) {
            let mut reader = FileLineReader::open(&path)?;
            let multi = MultiDict::load(&mut reader, self)?;
            return Ok(Arc::new(multi));
        }
        let magic = sniff_magic(&path)?;
        let id = dict_id_for(&path);
        let lang = self.fdl_lang.clone();
        let options = self.fdl_options;
        cached_dict(&id, || {
            let mut reader = FileLineReader::open(&path)?;
            match magic {
                DictMagic::WordList => {
                    let mut dict = MainDict::load(&mut reader, lang, options)?;
                    dict.set_id(dict_id_for(&path));
                    Ok(Arc::new(dict) as Arc<dyn Dictionary>)
                }
                DictMagic::PersonalList => {
                    let mut dict = WritableDict::new(lang);
                    dict.merge(&mut reader)?;
                    dict.set_id(dict_id_for(&path));
                    Ok(Arc::new(dict) as Arc<dyn Dictionary>)
                }
                DictMagic::ReplList => {
                    let mut dict = ReplDict::new(lang);
                    dict.merge(&mut reader)?;
                    dict.set_id(dict_id_for(&path));
                    Ok(Arc::new(dict) as Arc<dyn Dictionary>)
                }
            }
        })
    }
}

//
// the library facade
//

/// A fresh configuration with the environment applied: the
/// `ORTHOSPELL_CONF` override string and the locale variables that
/// default the language choice.
pub fn new_config() -> Config {
    let mut config = Config::new();
    for env_name in ["LANGUAGE", "LC_MESSAGES", "LANG"] {
        if let Ok(value) = std::env::var(env_name) {
            let code: &str = value.split(['.', '@']).next().unwrap_or("");
            if !code.is_empty() && code != "C" && code != "POSIX" {
                let _ = config.replace("lang", code);
                break;
            }
        }
    }
    if let Ok(overrides) = std::env::var(CONF_ENV) {
        apply_conf_string(&mut config, &overrides);
    }
    config
}

/// Applies a `;`-separated `key=value` (or `key value`) override
/// string, as found in the conf environment variable.
pub fn apply_conf_string(config: &mut Config, overrides: &str) {
    for item in overrides.split(';') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (key, value) = match item.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => match item.split_once(' ') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (item, ""),
            },
        };
        if let Err(err) = config.replace(key, value) {
            log::warn!("{}: {}", CONF_ENV, err);
        }
    }
}

/// A speller bound to its data source and persistence paths.
pub struct SpellerHandle {
    sph_speller: Speller,
    sph_config: Config,
    sph_store: FsWordListStore,
}

impl SpellerHandle {
    pub fn speller(&self) -> &Speller {
        &self.sph_speller
    }

    pub fn config(&self) -> &Config {
        &self.sph_config
    }

    pub fn check(&self, word: &str) -> bool {
        self.sph_speller.check(word)
    }

    pub fn suggest(&self, word: &str) -> Vec<String> {
        self.sph_speller.suggest(word)
    }

    pub fn add_to_personal(&mut self, word: &str) -> Result<()> {
        self.sph_speller.add_to_personal(word)
    }

    pub fn add_to_session(&mut self, word: &str) -> Result<()> {
        self.sph_speller.add_to_session(word)
    }

    pub fn store_replacement(&mut self, mis: &str, cor: &str) -> Result<()> {
        self.sph_speller.store_replacement(mis, cor)
    }

    pub fn clear_session(&mut self) {
        self.sph_speller.clear_session()
    }

    pub fn save_all_word_lists(&mut self) -> Result<()> {
        self.sph_speller.save_all_word_lists(&mut self.sph_store)
    }
}

// language lookup falls back from "en_US" to "en" when only the
// plain language data exists
fn resolve_lang_code(source: &FsDataSource, code: &str) -> String {
    if source.exists(&format!("{}.dat", code)) {
        return code.to_string();
    }
    let plain = lang_part(code);
    if source.exists(&format!("{}.dat", plain)) {
        return plain.to_string();
    }
    code.to_string()
}

/// Builds a speller from a configuration: finds the best word list,
/// loads the language and the dictionary stack, and attaches the
/// user's personal files.
pub fn new_speller(mut config: Config) -> Result<SpellerHandle> {
    let source = FsDataSource::from_config(&config)?;
    let infos = scan_dict_infos(&source);
    let info = find_word_list(&config, &infos)?;

    let lang_code = resolve_lang_code(&source, &info.dni_code);
    let lang = new_lang(&lang_code, &config, &source)?;
    lang.set_lang_defaults(&mut config);

    let opts = SpellerOptions::from_config(&config)?;
    let mut speller = Speller::new(lang.clone(), opts);

    let mut loader = FsDictLoader {
        fdl_source: &source,
        fdl_lang: lang.clone(),
        fdl_options: LoadOptions::default(),
    };
    let main = loader.load_dict(&info.dni_path)?;
    speller.add_main(main);
    for extra in config.retrieve_list("extra-dicts")? {
        let dict = loader.load_dict(&extra)?;
        speller.add_main(dict);
    }

    let mut store = FsWordListStore::new(&config)?;
    if let Err(err) = store.load(&mut speller) {
        // a broken personal file must not block checking
        log::warn!("{}", err);
    }

    Ok(SpellerHandle {
        sph_speller: speller,
        sph_config: config,
        sph_store: store,
    })
}

/// Builds a document checker wired to the speller's language and
/// the filters its configuration selects.
pub fn new_document_checker(handle: &SpellerHandle) -> Result<Checker> {
    let config = handle.config();
    let mut chain = FilterChain::new();
    let mode = config.retrieve("mode")?;
    for name in mode_filters(&mode)? {
        chain.add_filter(new_filter(name)?);
    }
    for name in config.retrieve_list("filter")? {
        chain.add_filter(new_filter(&name)?);
    }
    let mut checker = Checker::new(handle.speller().lang().clone(), chain);
    checker.set_span_strings(config.retrieve_bool("span-strings")?);
    Ok(checker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // a minimal on-disk language + dictionary fixture
    fn fixture_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        fs::write(
            base.join("en.dat"),
            "name en\ncharset iso-8859-1\nspecial ' -*- - ***\nsoundslike stripped\naffix en\n",
        )
        .unwrap();
        fs::write(base.join("iso-8859-1.cset"), latin1_cset()).unwrap();
        fs::write(
            base.join("en_affix.dat"),
            "SFX S Y 2\nSFX S 0 s [^sy]\nSFX S y ies y\n",
        )
        .unwrap();
        fs::write(base.join("en-common.wl"), "hello\nworld\ncat/S\nthe\n").unwrap();
        fs::write(
            base.join("en.info"),
            "name english\ncode en\nalternate en_US\npath en-common.wl\nsize 60\n",
        )
        .unwrap();
        dir
    }

    // an ascii-and-latin1 charset table, matching the engine's
    // internal expectations for a test language
    fn latin1_cset() -> String {
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
                ('L', b, b + 32, b, b)
            } else if (0xE0..=0xFE).contains(&b) && b != 0xF7 {
                ('L', b - 32, b, b - 32, b)
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

    fn fixture_config(dir: &TempDir) -> Config {
        let mut config = Config::new();
        config
            .replace("data-dir", &dir.path().display().to_string())
            .unwrap();
        config.replace("lang", "en").unwrap();
        config
            .replace(
                "home-dir",
                &dir.path().join("home").display().to_string(),
            )
            .unwrap();
        config
    }

    #[test]
    fn data_source_resolves_names() {
        let dir = fixture_dir();
        let source = FsDataSource::new(vec![dir.path().to_path_buf()]);
        assert!(source.exists("en.dat"));
        assert!(!source.exists("xx.dat"));
        let mut reader = source.open("en.dat").unwrap();
        let mut lines = DataLines::new(reader.as_mut());
        let first = lines.next_line().unwrap();
        assert_eq!(first.split_pair().0, "name");
    }

    #[test]
    fn info_scoring_prefers_exact_code_and_variety() {
        let infos = vec![
            DictInfo {
                dni_name: "english".into(),
                dni_code: "en".into(),
                dni_alternates: vec!["en_US".into()],
                dni_varieties: vec![],
                dni_module: "default".into(),
                dni_size: 60,
                dni_path: "en.wl".into(),
            },
            DictInfo {
                dni_name: "american".into(),
                dni_code: "en_US".into(),
                dni_alternates: vec![],
                dni_varieties: vec![],
                dni_module: "default".into(),
                dni_size: 60,
                dni_path: "en_US.wl".into(),
            },
            DictInfo {
                dni_name: "american medical".into(),
                dni_code: "en_US".into(),
                dni_alternates: vec![],
                dni_varieties: vec!["med".into()],
                dni_module: "default".into(),
                dni_size: 60,
                dni_path: "en_US-med.wl".into(),
            },
        ];
        let mut config = Config::new();
        config.replace("lang", "en_US").unwrap();
        let chosen = find_word_list(&config, &infos).unwrap();
        assert_eq!(chosen.dni_path, "en_US.wl");
        // asking for the variety flips the choice
        config.replace("add-variety", "med").unwrap();
        let chosen = find_word_list(&config, &infos).unwrap();
        assert_eq!(chosen.dni_path, "en_US-med.wl");
        // a code with no exact match falls back by language part
        config.replace("reset-variety", "").unwrap();
        config.replace("lang", "en_GB").unwrap();
        let chosen = find_word_list(&config, &infos).unwrap();
        assert_eq!(chosen.dni_path, "en.wl");
    }

    #[test]
    fn size_modifiers() {
        assert_eq!(size_penalty("+60", 70), Some(10));
        assert!(size_penalty("+60", 50).unwrap() > size_penalty("+60", 90).unwrap());
        assert_eq!(size_penalty("-60", 50), Some(10));
        assert_eq!(size_penalty("<60", 60), None);
        assert_eq!(size_penalty("<60", 50), Some(10));
        assert_eq!(size_penalty(">60", 60), None);
        assert_eq!(size_penalty("60", 50), Some(10));
    }

    #[test]
    fn missing_wordlist_reports_language() {
        let config = Config::new();
        let err = find_word_list(&config, &[]).unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::NoWordlistForLang);
        assert!(err.is_a(ErrorKind::LanguageError));
    }

    #[test]
    fn speller_end_to_end() {
        let dir = fixture_dir();
        let handle = new_speller(fixture_config(&dir)).unwrap();
        assert!(handle.check("hello"));
        assert!(handle.check("cats"));
        assert!(!handle.check("helllo"));
    }

    #[test]
    fn personal_add_and_persistence() {
        let dir = fixture_dir();
        let mut handle = new_speller(fixture_config(&dir)).unwrap();
        assert!(!handle.check("foobar"));
        handle.add_to_personal("foobar").unwrap();
        handle.store_replacement("teh", "the").unwrap();
        handle.save_all_word_lists().unwrap();

        let saved = fs::read_to_string(dir.path().join("home").join("en.pws")).unwrap();
        let first = saved.lines().next().unwrap();
        assert!(first.starts_with("personal_ws-1.1 en 1 "));
        assert!(saved.contains("foobar"));

        // a fresh speller sees the persisted words
        let handle = new_speller(fixture_config(&dir)).unwrap();
        assert!(handle.check("foobar"));
        assert_eq!(handle.suggest("teh"), vec!["the".to_string()]);
    }

    #[test]
    fn concurrent_additions_are_merged_on_save() {
        let dir = fixture_dir();
        let mut handle = new_speller(fixture_config(&dir)).unwrap();
        handle.add_to_personal("alpha").unwrap();
        handle.save_all_word_lists().unwrap();

        let mut other = new_speller(fixture_config(&dir)).unwrap();
        other.add_to_personal("beta").unwrap();
        other.save_all_word_lists().unwrap();

        // the first speller saves again; the other's word survives
        handle.add_to_personal("gamma").unwrap();
        handle.save_all_word_lists().unwrap();
        let saved = fs::read_to_string(dir.path().join("home").join("en.pws")).unwrap();
        assert!(saved.contains("alpha"));
        assert!(saved.contains("beta"));
        assert!(saved.contains("gamma"));
    }

    #[test]
    fn lock_file_blocks_second_writer() {
        let dir = fixture_dir();
        let target = dir.path().join("home").join("en.pws");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        let _held = FileLock::acquire(&target).unwrap();
        let mut handle = new_speller(fixture_config(&dir)).unwrap();
        handle.add_to_personal("blocked").unwrap();
        let err = handle.save_all_word_lists().unwrap_err();
        assert!(err.is_a(ErrorKind::CantWriteFile));
    }

    #[test]
    fn document_checker_replace_flow() {
        let dir = fixture_dir();
        fs::write(
            dir.path().join("en-doc.wl"),
            "I\nhave\na\ncar\nhello\nworld\nthe\ncat/S\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("en.info"),
            "name english\ncode en\npath en-doc.wl\nsize 60\n",
        )
        .unwrap();
        let handle = new_speller(fixture_config(&dir)).unwrap();
        let mut checker = new_document_checker(&handle).unwrap();
        checker.process(b"I has a car.", 0, 1);
        let bad = checker.next_misspelling(handle.speller()).unwrap();
        assert_eq!(bad.ctk_word, "has");
        assert_eq!(bad.ctk_begin, 2);
        assert_eq!(bad.ctk_len, 3);
        checker.replace(b"have");
        assert!(checker.next_misspelling(handle.speller()).is_none());
    }

    #[test]
    fn conf_string_overrides() {
        let mut config = Config::new();
        apply_conf_string(&mut config, "lang=nl; run-together=true ;bogus-key=1");
        assert_eq!(config.retrieve("lang").unwrap(), "nl");
        assert!(config.retrieve_bool("run-together").unwrap());
    }

    #[test]
    fn extra_dict_magic_dispatch() {
        let dir = fixture_dir();
        fs::write(
            dir.path().join("extra.pws"),
            "personal_ws-1.1 en 1 iso-8859-1\nquux\n",
        )
        .unwrap();
        let mut config = fixture_config(&dir);
        config.replace("add-extra-dicts", "extra.pws").unwrap();
        let handle = new_speller(config).unwrap();
        assert!(handle.check("quux"));
        assert!(handle.check("hello"));
    }

    #[test]
    fn multi_recipe_loads_children() {
        let dir = fixture_dir();
        fs::write(dir.path().join("en-extra.wl"), "zebra\n").unwrap();
        fs::write(
            dir.path().join("en-all.multi"),
            "add en-common.wl\nadd en-extra.wl\n",
        )
        .unwrap();
        let mut config = fixture_config(&dir);
        config.replace("add-extra-dicts", "en-all.multi").unwrap();
        let handle = new_speller(config).unwrap();
        assert!(handle.check("zebra"));
        assert!(handle.check("hello"));
    }
}
