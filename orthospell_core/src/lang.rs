/// The per-language model: character tables, case handling, word
/// validation, the soundslike, the affix table, and the conversion
/// into the internal byte form. Immutable once set up.
use std::sync::{Arc, Mutex, OnceLock};

use hashbrown::HashMap;

use crate::affix::{AffixMgr, CheckAffixRes, RootGuess, WordAff};
use crate::charset::{CharTable, CharType, SpecialChar, StoreAs, CLEAN, LETTER, LOWER, PLAIN, TITLE, UPPER};
use crate::config::Config;
use crate::convert::{canon_encoding, cached_decoder, Decoder, FilterChar, NormTables};
use crate::error::{Error, ErrorKind, Result};
use crate::reader::{line_bytes, DataLines, DataSource};

/// Case shape of a word.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum CasePattern {
    AllLower,
    AllUpper,
    FirstUpper,
    OtherCase,
}

// word_info bits: case pattern in the low two bits
pub const CASE_PATTERN: u8 = 0x3;
pub const ALL_PLAIN: u8 = 1 << 2;
pub const ALL_CLEAN: u8 = 1 << 3;

pub fn case_pattern_of(info: u8) -> CasePattern {
    match info & CASE_PATTERN {
        0 => CasePattern::AllLower,
        1 => CasePattern::AllUpper,
        2 => CasePattern::FirstUpper,
        _ => CasePattern::OtherCase,
    }
}

pub struct Lang {
    lng_name: String,
    lng_charset: String,
    lng_data_encoding: String,
    lng_table: CharTable,
    lng_store_as: StoreAs,
    lng_from_uni: Arc<HashMap<u32, u8>>,
    lng_norm: Option<NormTables>,
    lng_utf8_decoder: Arc<Decoder>,
    lng_data_decoder: Option<Arc<Decoder>>,
    lng_soundslike: crate::soundslike::Soundslike,
    lng_affix: Option<AffixMgr>,
    lng_repls: Vec<(Vec<u8>, Vec<u8>)>,
    /// key/value pairs the language contributes to the config
    lng_config_pairs: Vec<(String, String)>,
}

impl std::fmt::Debug for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lang").field("lng_name", &self.lng_name).finish()
    }
}

impl Lang {
    /// Loads `<name>.dat` and everything it references through
    /// `source`. The returned language is complete and immutable.
    pub fn setup(name: &str, config: &Config, source: &dyn DataSource) -> Result<Lang> {
        let dat_name = format!("{}.dat", name);
        let mut dat_reader = source.open(&dat_name).map_err(|err| {
            if err.is_a(ErrorKind::CantReadFile) {
                Error::new(
                    ErrorKind::UnknownLanguage,
                    format!(
                        "The language \"{}\" is not known. This is probably because: {}",
                        name, err.err_mesg
                    ),
                )
            } else {
                err
            }
        })?;
        let mut dat = HashMap::new();
        {
            let mut lines = DataLines::new(dat_reader.as_mut());
            while let Some(line) = lines.next_line() {
                let (key, value) = line.split_pair();
                dat.insert(key.to_ascii_lowercase(), value.to_string());
            }
        }
        if !dat.contains_key("name") {
            return Err(Error::bad_file_format(
                &dat_name,
                "The required field \"name\" is missing.",
            ));
        }

        let charset = canon_encoding(
            dat.get("charset").map(|s| s.as_str()).unwrap_or("iso-8859-1"),
        );
        let data_encoding = canon_encoding(
            dat.get("data-encoding")
                .map(|s| s.as_str())
                .unwrap_or(&charset),
        );

        let mut cset_reader = source.open(&format!("{}.cset", charset))?;
        let mut table = CharTable::load(cset_reader.as_mut())?;

        let affix_compress = dat.get("affix-compress").map(|v| v == "true").unwrap_or(false);
        let store_as = match dat.get("store-as").map(|s| s.as_str()) {
            Some("lower") => StoreAs::Lower,
            Some("stripped") => StoreAs::Stripped,
            Some(other) => {
                return Err(Error::bad_file_format(
                    &dat_name,
                    &format!("The store-as value \"{}\" is not known.", other),
                ))
            }
            None if affix_compress => StoreAs::Lower,
            None => StoreAs::Stripped,
        };
        table.set_clean(store_as);

        let cmap_name = format!("{}.cmap", charset);
        let norm = if source.exists(&cmap_name) {
            let mut cmap_reader = source.open(&cmap_name)?;
            Some(NormTables::load(cmap_reader.as_mut())?)
        } else if dat.get("norm-required").map(|v| v == "true").unwrap_or(false) {
            return Err(Error::bad_file_format(
                &dat_name,
                &format!("The required file \"{}\" is missing.", cmap_name),
            ));
        } else {
            None
        };

        let data_decoder = if data_encoding == charset {
            None
        } else {
            Some(cached_decoder(&data_encoding)?)
        };

        let mut config_pairs = Vec::new();
        for key in [
            "run-together",
            "run-together-limit",
            "run-together-min",
            "ignore-accents",
        ] {
            if let Some(value) = dat.get(key) {
                config_pairs.push((key.to_string(), value.clone()));
            }
        }

        let mut lang = Lang {
            lng_name: dat.get("name").unwrap().clone(),
            lng_charset: charset.clone(),
            lng_data_encoding: data_encoding,
            lng_from_uni: Arc::new(table.from_uni_map()),
            lng_table: table,
            lng_store_as: store_as,
            lng_norm: norm,
            lng_utf8_decoder: cached_decoder("utf-8")?,
            lng_data_decoder: data_decoder,
            lng_soundslike: crate::soundslike::Soundslike::NoSl,
            lng_affix: None,
            lng_repls: Vec::new(),
            lng_config_pairs: config_pairs,
        };

        // special characters: pairs of <char> <***> where each star
        // allows the begin/middle/end position
        if let Some(special) = dat.get("special") {
            let tokens: Vec<&str> = special.split_whitespace().collect();
            let mut specials = Vec::new();
            for pair in tokens.chunks(2) {
                if pair.len() != 2 || pair[1].len() < 3 {
                    return Err(Error::bad_file_format(
                        &dat_name,
                        "A special entry needs a character and three flags.",
                    ));
                }
                let bytes = lang.conv_data(pair[0]);
                if bytes.len() != 1 {
                    return Err(Error::bad_file_format(
                        &dat_name,
                        "A special entry must name a single character.",
                    ));
                }
                let stars: Vec<char> = pair[1].chars().collect();
                specials.push((
                    bytes[0],
                    SpecialChar::new(stars[0] == '*', stars[1] == '*', stars[2] == '*'),
                ));
            }
            for (byte, special) in specials {
                lang.lng_table.cht_special[byte as usize] = special;
            }
        }

        let sl_name = dat
            .get("soundslike")
            .cloned()
            .unwrap_or_else(|| "none".to_string());
        let soundslike = match sl_name.as_str() {
            "none" | "stripped" | "simple" => crate::soundslike::Soundslike::new(
                &sl_name,
                &lang.lng_table,
                &|s| lang.conv_data(s),
                None,
            )?,
            other => {
                let mut reader = source.open(&format!("{}_phonet.dat", other))?;
                crate::soundslike::Soundslike::new(
                    other,
                    &lang.lng_table,
                    &|s| lang.conv_data(s),
                    Some(reader.as_mut()),
                )?
            }
        };
        lang.lng_soundslike = soundslike;

        if let Some(affix_name) = dat.get("affix") {
            if affix_name != "none" && !affix_name.is_empty() {
                let mut reader = source.open(&format!("{}_affix.dat", affix_name))?;
                let mgr = AffixMgr::load(reader.as_mut(), &|s| lang.conv_data(s))?;
                lang.lng_affix = Some(mgr);
            }
        }

        if let Some(repl_name) = dat.get("repl-table") {
            if repl_name != "none" && !repl_name.is_empty() {
                let mut reader = source.open(&format!("{}_repl.dat", repl_name))?;
                let repls = lang.load_repls(reader.as_mut())?;
                lang.lng_repls = repls;
            }
        }

        let _ = config; // reserved for per-config language options
        Ok(lang)
    }

    // repl file: a "rep <count>" header line then "rep <from> <to>"
    // lines; entries that do not validate are skipped with a warning
    fn load_repls(
        &self,
        reader: &mut dyn crate::reader::LineReader,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut repls = Vec::new();
        let mut lines = DataLines::new(reader);
        while let Some(line) = lines.next_line() {
            let (key, value) = line.split_pair();
            if !key.eq_ignore_ascii_case("rep") {
                continue;
            }
            let (from, to) = crate::reader::split_pair_str(value);
            if to.is_empty() {
                continue; // the header line carries only the count
            }
            let from_b = self.conv_data(from);
            let to_b = self.conv_data(to);
            if self.check_if_valid(&from_b).is_err() || self.check_if_valid(&to_b).is_err() {
                log::warn!("skipping replacement pair {} {}", from, to);
                continue;
            }
            let from_c = self.to_clean_word(&from_b);
            let to_c = self.to_clean_word(&to_b);
            if from_c == to_c || from_c.is_empty() {
                continue;
            }
            repls.push((from_c, to_c));
        }
        Ok(repls)
    }

    pub fn name(&self) -> &str {
        &self.lng_name
    }

    pub fn charset(&self) -> &str {
        &self.lng_charset
    }

    pub fn data_encoding(&self) -> &str {
        &self.lng_data_encoding
    }

    pub fn store_as(&self) -> StoreAs {
        self.lng_store_as
    }

    pub fn table(&self) -> &CharTable {
        &self.lng_table
    }

    /// Copies the language's own config keys into `config`.
    pub fn set_lang_defaults(&self, config: &mut Config) {
        let _ = config.replace("actual-lang", &self.lng_name);
        for (key, value) in &self.lng_config_pairs {
            if let Err(err) = config.replace(key, value) {
                log::debug!("language option {} not applied: {}", key, err);
            }
        }
    }

    //
    // per-byte accessors
    //

    pub fn is_alpha(&self, c: u8) -> bool {
        self.lng_table.is_alpha(c)
    }

    pub fn char_type(&self, c: u8) -> CharType {
        self.lng_table.cht_char_type[c as usize]
    }

    pub fn char_info(&self, c: u8) -> u8 {
        self.lng_table.cht_char_info[c as usize]
    }

    pub fn special(&self, c: u8) -> SpecialChar {
        self.lng_table.cht_special[c as usize]
    }

    pub fn to_upper(&self, c: u8) -> u8 {
        self.lng_table.cht_to_upper[c as usize]
    }

    pub fn to_lower(&self, c: u8) -> u8 {
        self.lng_table.cht_to_lower[c as usize]
    }

    pub fn to_title(&self, c: u8) -> u8 {
        self.lng_table.cht_to_title[c as usize]
    }

    pub fn to_clean(&self, c: u8) -> u8 {
        self.lng_table.cht_to_clean[c as usize]
    }

    pub fn de_accent(&self, c: u8) -> u8 {
        self.lng_table.cht_de_accent[c as usize]
    }

    pub fn to_uni(&self, c: u8) -> u32 {
        self.lng_table.cht_to_uni[c as usize]
    }

    pub fn is_lower(&self, c: u8) -> bool {
        self.to_lower(c) == c
    }

    pub fn is_upper(&self, c: u8) -> bool {
        self.to_upper(c) == c
    }

    //
    // word transforms (internal bytes in, internal bytes out)
    //

    pub fn to_clean_word(&self, word: &[u8]) -> Vec<u8> {
        word.iter()
            .map(|b| self.to_clean(*b))
            .filter(|b| *b != 0)
            .collect()
    }

    pub fn to_stripped_word(&self, word: &[u8]) -> Vec<u8> {
        word.iter()
            .map(|b| self.lng_table.cht_to_stripped[*b as usize])
            .filter(|b| *b != 0)
            .collect()
    }

    pub fn to_lower_word(&self, word: &[u8]) -> Vec<u8> {
        word.iter().map(|b| self.to_lower(*b)).collect()
    }

    pub fn to_upper_word(&self, word: &[u8]) -> Vec<u8> {
        word.iter().map(|b| self.to_upper(*b)).collect()
    }

    pub fn de_accent_word(&self, word: &[u8]) -> Vec<u8> {
        word.iter().map(|b| self.de_accent(*b)).collect()
    }

    //
    // soundslike
    //

    pub fn have_soundslike(&self) -> bool {
        self.lng_soundslike.have_soundslike()
    }

    pub fn soundslike_name(&self) -> &'static str {
        self.lng_soundslike.name()
    }

    pub fn to_soundslike(&self, word: &[u8]) -> Vec<u8> {
        self.lng_soundslike.to_soundslike(&self.lng_table, word)
    }

    pub fn soundslike_chars(&self) -> Vec<u8> {
        self.lng_soundslike.soundslike_chars(&self.lng_table)
    }

    //
    // affix
    //

    pub fn have_affix(&self) -> bool {
        self.lng_affix.is_some()
    }

    pub fn affix(&self) -> Option<&AffixMgr> {
        self.lng_affix.as_ref()
    }

    pub fn munch(&self, word: &[u8], cross: bool) -> Vec<RootGuess> {
        match &self.lng_affix {
            Some(affix) => affix.munch(word, cross),
            None => Vec::new(),
        }
    }

    /// Expands through the affix table, or produces the bare word
    /// when the language has no affixes.
    pub fn expand(&self, word: &[u8], aff: &[u8], limit: usize) -> Vec<WordAff> {
        match &self.lng_affix {
            Some(affix) => affix.expand(word, aff, limit),
            None => vec![WordAff {
                waf_word: word.to_vec(),
                waf_aff: Vec::new(),
            }],
        }
    }

    //
    // repl table
    //

    pub fn have_repl(&self) -> bool {
        !self.lng_repls.is_empty()
    }

    pub fn repls(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.lng_repls
    }

    //
    // case analysis
    //

    pub fn case_pattern(&self, word: &[u8]) -> CasePattern {
        case_pattern_of(self.get_word_info(word))
    }

    /// One scan of the word: the case pattern plus the aggregate
    /// ALL_PLAIN / ALL_CLEAN bits.
    pub fn get_word_info(&self, word: &[u8]) -> u8 {
        let mut first: u8 = 0xFF;
        let mut all: u8 = 0xFF;
        let mut ix = 0usize;
        while ix < word.len() {
            first = self.char_info(word[ix]);
            all &= first;
            ix += 1;
            if first & LETTER != 0 {
                break;
            }
        }
        while ix < word.len() {
            all &= self.char_info(word[ix]);
            ix += 1;
        }
        let mut res = if all & LOWER != 0 {
            0 // AllLower
        } else if all & UPPER != 0 {
            1 // AllUpper
        } else if first & TITLE != 0 {
            2 // FirstUpper
        } else {
            3 // OtherCase
        };
        if all & PLAIN != 0 {
            res |= ALL_PLAIN;
        }
        if all & CLEAN != 0 {
            res |= ALL_CLEAN;
        }
        res
    }

    /// Re-applies a case pattern, the inverse of `case_pattern`.
    pub fn fix_case(&self, pattern: CasePattern, word: &mut [u8]) {
        if word.is_empty() {
            return;
        }
        match pattern {
            CasePattern::AllUpper => {
                for b in word.iter_mut() {
                    *b = self.to_upper(*b);
                }
            }
            CasePattern::FirstUpper => {
                if self.is_lower(word[0]) {
                    word[0] = self.to_title(word[0]);
                }
            }
            _ => {}
        }
    }

    pub fn fix_case_copy(&self, pattern: CasePattern, word: &[u8]) -> Vec<u8> {
        let mut out = word.to_vec();
        self.fix_case(pattern, &mut out);
        out
    }

    //
    // word validation
    //

    fn invalid_word(&self, word: &[u8], mesg: String) -> Error {
        Error::new(
            ErrorKind::InvalidWord,
            format!(
                "The word \"{}\" is invalid. {}",
                self.to_display(word),
                mesg
            ),
        )
    }

    fn char_mesg(&self, c: u8, text: &str) -> String {
        let shown = char::from_u32(self.to_uni(c)).unwrap_or('?');
        format!("The character '{}' (U+{:02X}) {}", shown, self.to_uni(c), text)
    }

    /// Validates a stored word: legal begin/middle/end characters
    /// and the 240 byte length cap.
    pub fn check_if_valid(&self, word: &[u8]) -> Result<()> {
        if word.is_empty() {
            return Err(self.invalid_word(word, "Empty string.".to_string()));
        }
        if word.len() > 240 {
            return Err(self.invalid_word(
                word,
                "The total length is larger than 240 characters.".to_string(),
            ));
        }
        let first = word[0];
        if !self.is_alpha(first) {
            if !self.special(first).begin {
                return Err(self.invalid_word(
                    word,
                    self.char_mesg(first, "may not appear at the beginning of a word."),
                ));
            } else if word.len() < 2 || !self.is_alpha(word[1]) {
                return Err(self.invalid_word(
                    word,
                    self.char_mesg(first, "must be followed by an alphabetic character."),
                ));
            }
        }
        let mut ix = 0usize;
        while ix + 1 < word.len() {
            let c = word[ix];
            if !self.is_alpha(c) && ix > 0 {
                if !self.special(c).middle {
                    return Err(self.invalid_word(
                        word,
                        self.char_mesg(c, "may not appear in the middle of a word."),
                    ));
                } else if !self.is_alpha(word[ix + 1]) {
                    return Err(self.invalid_word(
                        word,
                        self.char_mesg(c, "must be followed by an alphabetic character."),
                    ));
                }
            }
            ix += 1;
        }
        let last = word[word.len() - 1];
        if !self.is_alpha(last) && word.len() > 1 {
            if last == b'\r' {
                return Err(self.invalid_word(
                    word,
                    "The character '\\r' (U+0D) may not appear at the end of a word. \
                     This probably means that the file is using MS-DOS EOL instead of Unix EOL."
                        .to_string(),
                ));
            }
            if !self.special(last).end {
                return Err(self.invalid_word(
                    word,
                    self.char_mesg(last, "may not appear at the end of a word."),
                ));
            }
        }
        Ok(())
    }

    /// Validates every affix flag attached to a word.
    pub fn validate_affix(&self, word: &[u8], aff: &[u8]) -> Result<()> {
        let affix = match &self.lng_affix {
            Some(affix) => affix,
            None => return Ok(()),
        };
        for flag in aff {
            match affix.check_affix(word, *flag) {
                CheckAffixRes::ValidAffix => {}
                CheckAffixRes::InvalidAffix => {
                    return Err(Error::new(
                        ErrorKind::InvalidAffix,
                        format!(
                            "The affix flag '{}' is invalid for \"{}\".",
                            *flag as char,
                            self.to_display(word)
                        ),
                    ));
                }
                CheckAffixRes::InapplicableAffix => {
                    return Err(Error::new(
                        ErrorKind::InapplicableAffix,
                        format!(
                            "The affix flag '{}' can not be applied to \"{}\".",
                            *flag as char,
                            self.to_display(word)
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    //
    // conversion in and out of the internal byte form
    //

    /// Maps text in the data encoding (latin-1 view of raw bytes)
    /// to internal bytes.
    pub fn conv_data(&self, text: &str) -> Vec<u8> {
        let raw = line_bytes(text);
        match &self.lng_data_decoder {
            None => raw,
            Some(decoder) => {
                let mut chars = Vec::new();
                decoder.decode(&raw, &mut chars);
                let mut out = Vec::with_capacity(chars.len());
                self.map_units(&chars, &mut out, false);
                out.into_iter().map(|fc| fc.chr as u8).collect()
            }
        }
    }

    /// Decodes UTF-8 text into a plain internal word; characters
    /// with no internal representation come out as `?`.
    pub fn to_internal_word(&self, text: &str) -> Vec<u8> {
        let mut chars = Vec::new();
        self.lng_utf8_decoder.decode(text.as_bytes(), &mut chars);
        let mut units = Vec::with_capacity(chars.len());
        self.map_units(&chars, &mut units, false);
        units.into_iter().map(|fc| fc.chr as u8).collect()
    }

    /// Decodes UTF-8 bytes keeping per-character widths, for the
    /// document pipeline. Total width always equals the byte count.
    pub fn decode_utf8_chars(&self, src: &[u8], out: &mut Vec<FilterChar>) {
        let mut chars = Vec::new();
        self.lng_utf8_decoder.decode(src, &mut chars);
        self.map_units(&chars, out, true);
    }

    // Maps decoded (code point, width) units into internal units,
    // through the normalization tree when the language has one.
    // With keep_width a dropped unit still leaves a blank behind so
    // position math stays exact.
    fn map_units(&self, uni: &[FilterChar], out: &mut Vec<FilterChar>, keep_width: bool) {
        let codes: Vec<u32> = uni.iter().map(|fc| fc.chr).collect();
        let mut ix = 0usize;
        while ix < codes.len() {
            let (consumed, emitted) = match &self.lng_norm {
                Some(tables) => tables.nrm_internal.best_match(&codes[ix..]),
                None => (1, None),
            };
            let width: u32 = uni[ix..ix + consumed].iter().map(|fc| fc.width).sum();
            match emitted {
                Some(units) if units.is_empty() => {
                    if keep_width {
                        out.push(FilterChar::new(b' ' as u32, width));
                    }
                }
                Some(units) => {
                    for (k, unit) in units.iter().enumerate() {
                        out.push(FilterChar::new(*unit, if k == 0 { width } else { 0 }));
                    }
                }
                None => {
                    let byte = self
                        .lng_from_uni
                        .get(&codes[ix])
                        .copied()
                        .unwrap_or(b'?');
                    out.push(FilterChar::new(byte as u32, width));
                }
            }
            ix += consumed;
        }
    }

    /// Converts bytes in an arbitrary declared encoding into
    /// internal bytes (identity when the encoding is the charset).
    pub fn bytes_to_internal(&self, encoding: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        if canon_encoding(encoding) == self.lng_charset {
            return Ok(bytes.to_vec());
        }
        let decoder = cached_decoder(encoding)?;
        let mut chars = Vec::new();
        decoder.decode(bytes, &mut chars);
        let mut units = Vec::with_capacity(chars.len());
        self.map_units(&chars, &mut units, false);
        Ok(units.into_iter().map(|fc| fc.chr as u8).collect())
    }

    /// Converts internal bytes into an arbitrary encoding,
    /// replacing what the target can not express.
    pub fn internal_to_bytes(&self, encoding: &str, word: &[u8]) -> Result<Vec<u8>> {
        if canon_encoding(encoding) == self.lng_charset {
            return Ok(word.to_vec());
        }
        let encoder = crate::convert::cached_encoder(encoding)?;
        let units: Vec<u32> = word.iter().map(|b| self.to_uni(*b)).collect();
        let mut out = Vec::with_capacity(word.len());
        encoder.encode(&units, &mut out);
        Ok(out)
    }

    /// Internal bytes to a displayable UTF-8 string.
    pub fn to_display(&self, word: &[u8]) -> String {
        word.iter()
            .map(|b| char::from_u32(self.to_uni(*b)).unwrap_or('?'))
            .collect()
    }
}

/// Case/accent aware equality of a candidate against a stored form.
/// A leading begin-special on the candidate may be skipped, a
/// trailing end-special consumed.
pub struct SensitiveCompare<'l> {
    pub scm_lang: &'l Lang,
    pub scm_case_insensitive: bool,
    pub scm_ignore_accents: bool,
    pub scm_begin: bool,
    pub scm_end: bool,
}

impl<'l> SensitiveCompare<'l> {
    pub fn new(lang: &'l Lang) -> SensitiveCompare<'l> {
        SensitiveCompare {
            scm_lang: lang,
            scm_case_insensitive: false,
            scm_ignore_accents: false,
            scm_begin: true,
            scm_end: true,
        }
    }

    fn acc(&self, c: u8) -> u8 {
        if self.scm_ignore_accents {
            self.scm_lang.de_accent(c)
        } else {
            c
        }
    }

    pub fn compare(&self, word: &[u8], inlist: &[u8]) -> bool {
        if word.is_empty() || inlist.is_empty() {
            return false;
        }
        let mut start = 0usize;
        loop {
            if self.compare_from(&word[start..], inlist) {
                return true;
            }
            if self.scm_begin
                && start < word.len()
                && self.scm_lang.special(word[start]).begin
                && start + 1 < word.len()
            {
                start += 1;
                continue;
            }
            return false;
        }
    }

    fn compare_from(&self, word: &[u8], inlist: &[u8]) -> bool {
        if self.scm_case_insensitive {
            let lang = self.scm_lang;
            return self.pass(word, inlist, |w, l| {
                self.acc(lang.to_upper(w)) == self.acc(lang.to_upper(l))
            });
        }
        // exact pass, allowing a title-case first letter
        let lang = self.scm_lang;
        let exact = self.pass_begin(word, inlist);
        if exact {
            return true;
        }
        // all-upper rendition of the stored form
        self.pass(word, inlist, |w, l| self.acc(w) == self.acc(lang.to_upper(l)))
    }

    fn pass_begin(&self, word: &[u8], inlist: &[u8]) -> bool {
        let lang = self.scm_lang;
        let mut wi = 0usize;
        let mut li = 0usize;
        if self.scm_begin {
            if self.acc(word[0]) == self.acc(inlist[0])
                || self.acc(word[0]) == self.acc(lang.to_title(inlist[0]))
            {
                wi = 1;
                li = 1;
            } else {
                return false;
            }
        }
        while wi < word.len() && li < inlist.len() && self.acc(word[wi]) == self.acc(inlist[li]) {
            wi += 1;
            li += 1;
        }
        if li < inlist.len() {
            return false;
        }
        if self.scm_end && wi < word.len() && lang.special(word[wi]).end {
            wi += 1;
        }
        wi == word.len()
    }

    fn pass(&self, word: &[u8], inlist: &[u8], eq: impl Fn(u8, u8) -> bool) -> bool {
        let mut wi = 0usize;
        let mut li = 0usize;
        while wi < word.len() && li < inlist.len() && eq(word[wi], inlist[li]) {
            wi += 1;
            li += 1;
        }
        if li < inlist.len() {
            return false;
        }
        if self.scm_end && wi < word.len() && self.scm_lang.special(word[wi]).end {
            wi += 1;
        }
        wi == word.len()
    }
}

// Languages are shared between spellers through a process-wide
// cache keyed by name.
static LANG_CACHE: OnceLock<Mutex<HashMap<String, Arc<Lang>>>> = OnceLock::new();

pub fn new_lang(name: &str, config: &Config, source: &dyn DataSource) -> Result<Arc<Lang>> {
    let cache = LANG_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    {
        let map = cache.lock().unwrap();
        if let Some(found) = map.get(name) {
            return Ok(found.clone());
        }
    }
    let made = Arc::new(Lang::setup(name, config, source)?);
    let mut map = cache.lock().unwrap();
    Ok(map.entry(name.to_string()).or_insert(made).clone())
}

/// Drops every cached language not currently in use elsewhere.
pub fn detach_cached_langs() {
    if let Some(cache) = LANG_CACHE.get() {
        cache.lock().unwrap().clear();
    }
}

#[cfg(test)]
pub mod testkit {
    use super::*;
    use crate::charset::latin1_cset_text;
    use crate::reader::MapDataSource;

    /// A small english-like test language: latin-1 charset, an
    /// apostrophe that is a middle special, a hyphen special, a
    /// plural affix, and a phonet-free soundslike.
    pub fn test_source() -> MapDataSource {
        let mut source = MapDataSource::new();
        source.insert(
            "en.dat",
            "name en\n\
             charset iso-8859-1\n\
             special ' -*- - ***\n\
             soundslike stripped\n\
             affix en\n\
             repl-table en\n",
        );
        source.insert("iso-8859-1.cset", &latin1_cset_text());
        source.insert(
            "en_affix.dat",
            "SFX S Y 2\n\
             SFX S 0 s [^sy]\n\
             SFX S y ies y\n\
             PFX R Y 1\n\
             PFX R 0 re .\n",
        );
        source.insert(
            "en_repl.dat",
            "rep 2\n\
             rep teh the\n\
             rep ke que\n",
        );
        source
    }

    pub fn test_lang() -> Arc<Lang> {
        let config = Config::new();
        let source = test_source();
        Arc::new(Lang::setup("en", &config, &source).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::testkit::{test_lang, test_source};
    use super::*;
    use crate::reader::MapDataSource;

    #[test]
    fn setup_fails_for_unknown_language() {
        let config = Config::new();
        let source = MapDataSource::new();
        let err = Lang::setup("xx", &config, &source).unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::UnknownLanguage);
    }

    #[test]
    fn setup_requires_name_field() {
        let config = Config::new();
        let mut source = MapDataSource::new();
        source.insert("xx.dat", "charset iso-8859-1\n");
        let err = Lang::setup("xx", &config, &source).unwrap_err();
        assert!(err.is_a(ErrorKind::BadFileFormat));
    }

    #[test]
    fn case_patterns() {
        let lang = test_lang();
        assert_eq!(lang.case_pattern(b"web"), CasePattern::AllLower);
        assert_eq!(lang.case_pattern(b"UNICEF"), CasePattern::AllUpper);
        assert_eq!(lang.case_pattern(b"Hague"), CasePattern::FirstUpper);
        assert_eq!(lang.case_pattern(b"TikTok"), CasePattern::OtherCase);
    }

    #[test]
    fn word_info_aggregate_bits() {
        let lang = test_lang();
        let info = lang.get_word_info(b"plain");
        assert_eq!(case_pattern_of(info), CasePattern::AllLower);
        assert!(info & ALL_PLAIN != 0);
        assert!(info & ALL_CLEAN != 0);
        let info = lang.get_word_info(&[b'c', 0xE9]); // c + e-acute
        assert!(info & ALL_PLAIN == 0);
    }

    #[test]
    fn fix_case_inverts_case_pattern() {
        let lang = test_lang();
        for (pattern, word) in [
            (CasePattern::AllUpper, b"word".to_vec()),
            (CasePattern::FirstUpper, b"word".to_vec()),
            (CasePattern::AllLower, b"word".to_vec()),
        ] {
            let fixed = lang.fix_case_copy(pattern, &word);
            assert_eq!(lang.case_pattern(&fixed), pattern);
        }
    }

    #[test]
    fn clean_is_idempotent() {
        let lang = test_lang();
        for word in [&b"Hello"[..], &[b'C', 0xE9, b'z'][..], b"it's"] {
            let once = lang.to_clean_word(word);
            let twice = lang.to_clean_word(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn validation_of_special_positions() {
        let lang = test_lang();
        lang.check_if_valid(b"hello").unwrap();
        lang.check_if_valid(b"it's").unwrap();
        lang.check_if_valid(b"x-ray").unwrap();
        // apostrophe is not an end special in the test language
        assert!(lang.check_if_valid(b"its'").is_err());
        assert!(lang.check_if_valid(b"'tis").is_err()); // not a begin special either
        assert!(lang.check_if_valid(b"").is_err());
        let err = lang.check_if_valid(b"a..b").unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::InvalidWord);
        assert!(err.to_string().contains("middle"));
    }

    #[test]
    fn long_words_are_rejected() {
        let lang = test_lang();
        let word = vec![b'a'; 241];
        assert!(lang.check_if_valid(&word).is_err());
        let word = vec![b'a'; 240];
        lang.check_if_valid(&word).unwrap();
    }

    #[test]
    fn validate_affix_flags() {
        let lang = test_lang();
        lang.validate_affix(b"cat", b"S").unwrap();
        let err = lang.validate_affix(b"cat", b"Z").unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::InvalidAffix);
        let err = lang.validate_affix(b"miss", b"S").unwrap_err();
        assert_eq!(err.err_kind, ErrorKind::InapplicableAffix);
        assert!(err.is_a(ErrorKind::InvalidAffix));
    }

    #[test]
    fn repl_table_loads_clean_pairs() {
        let lang = test_lang();
        assert!(lang.have_repl());
        assert!(lang
            .repls()
            .iter()
            .any(|(from, to)| from == b"teh" && to == b"the"));
    }

    #[test]
    fn utf8_to_internal_and_back() {
        let lang = test_lang();
        let word = lang.to_internal_word("caf\u{e9}");
        assert_eq!(word, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(lang.to_display(&word), "caf\u{e9}");
    }

    #[test]
    fn decode_keeps_widths() {
        let lang = test_lang();
        let mut chars = Vec::new();
        lang.decode_utf8_chars("a\u{e9}b".as_bytes(), &mut chars);
        assert_eq!(chars.len(), 3);
        assert_eq!(chars[1].chr, 0xE9);
        assert_eq!(chars[1].width, 2);
        assert_eq!(FilterChar::sum_width(&chars), 4);
    }

    #[test]
    fn sensitive_compare_policy() {
        let lang = test_lang();
        let cmp = SensitiveCompare::new(&lang);
        assert!(cmp.compare(b"hello", b"hello"));
        assert!(cmp.compare(b"Hello", b"hello")); // title case accepted
        assert!(cmp.compare(b"HELLO", b"hello")); // all upper accepted
        assert!(!cmp.compare(b"hello", b"Hello")); // stored case is binding
        assert!(!cmp.compare(b"hEllo", b"hello"));
        // trailing end special on the candidate is consumed
        let mut with_end = SensitiveCompare::new(&lang);
        with_end.scm_end = true;
        assert!(with_end.compare(b"test-", b"test"));
    }

    #[test]
    fn sensitive_compare_begin_special() {
        let lang = test_lang();
        let cmp = SensitiveCompare::new(&lang);
        // hyphen is a begin special in the test language
        assert!(cmp.compare(b"-tis", b"tis"));
        let mut no_begin = SensitiveCompare::new(&lang);
        no_begin.scm_begin = false;
        assert!(!no_begin.compare(b"-tis", b"tis"));
    }

    #[test]
    fn case_insensitive_compare() {
        let lang = test_lang();
        let mut cmp = SensitiveCompare::new(&lang);
        cmp.scm_case_insensitive = true;
        assert!(cmp.compare(b"hELLo", b"HellO"));
    }

    #[test]
    fn ignore_accents_compare() {
        let lang = test_lang();
        let mut cmp = SensitiveCompare::new(&lang);
        cmp.scm_ignore_accents = true;
        assert!(cmp.compare(&[b'c', 0xE9], b"ce"));
        let plain = SensitiveCompare::new(&lang);
        assert!(!plain.compare(&[b'c', 0xE9], b"ce"));
    }

    #[test]
    fn soundslike_groups_accented_forms() {
        let lang = test_lang();
        assert!(lang.have_soundslike());
        assert_eq!(
            lang.to_soundslike(&[b'C', 0xE9]),
            lang.to_soundslike(b"ce")
        );
    }

    #[test]
    fn lang_cache_shares_instances() {
        let config = Config::new();
        let source = test_source();
        let a = new_lang("en", &config, &source).unwrap();
        let b = new_lang("en", &config, &source).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
