/// The generic phonetic transform: a rule file compiled into a
/// first-letter indexed table, walked over a cleaned word to emit
/// its phonetic code. Patterns support `(..)` letter sets, `-`
/// shortening, `<` in-place rewriting, priority digits, and the
/// `^` / `$` position anchors.
use crate::charset::CharTable;
use crate::error::{Error, ErrorKind, Result};
use crate::reader::{line_bytes, DataLines, LineReader};

struct PhonetRule {
    phr_pat: Vec<u8>,
    phr_repl: Vec<u8>,
}

impl std::fmt::Debug for PhonetParms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhonetParms")
            .field("phn_version", &self.phn_version)
            .finish()
    }
}

pub struct PhonetParms {
    phn_version: String,
    phn_followup: bool,
    phn_collapse_result: bool,
    phn_remove_accents: bool,
    phn_rules: Vec<PhonetRule>,
    /// first rule index per leading pattern byte
    phn_hash: [Option<usize>; 256],
    phn_to_clean: [u8; 256],
    phn_is_alpha: [bool; 256],
}

fn to_bool(value: &str) -> bool {
    value == "1" || value == "true"
}

impl PhonetParms {
    /// Compiles a `<lang>_phonet.dat` stream. `conv` maps a value in
    /// the file's data encoding to internal bytes.
    pub fn load(
        reader: &mut dyn LineReader,
        table: &CharTable,
        conv: &dyn Fn(&str) -> Vec<u8>,
    ) -> Result<PhonetParms> {
        let file_name = reader.get_name();
        let mut parms = PhonetParms {
            phn_version: String::new(),
            phn_followup: true,
            phn_collapse_result: false,
            phn_remove_accents: true,
            phn_rules: Vec::new(),
            phn_hash: [None; 256],
            phn_to_clean: [0; 256],
            phn_is_alpha: [false; 256],
        };
        let mut lines = DataLines::new(reader);
        while let Some(line) = lines.next_line() {
            let (key, value) = line.split_pair();
            match key {
                "version" => parms.phn_version = value.to_string(),
                "followup" => parms.phn_followup = to_bool(value),
                "collapse_result" => parms.phn_collapse_result = to_bool(value),
                "remove_accents" => parms.phn_remove_accents = to_bool(value),
                _ => {
                    let pat = conv(key);
                    let repl = if value == "_" {
                        Vec::new()
                    } else {
                        conv(value)
                    };
                    if !pat.is_empty() {
                        parms.phn_rules.push(PhonetRule {
                            phr_pat: pat,
                            phr_repl: repl,
                        });
                    }
                }
            }
        }
        if parms.phn_version.is_empty() {
            return Err(Error::new(
                ErrorKind::BadFileFormat,
                format!(
                    "The file \"{}\" is not in the proper format. You must specify a version string.",
                    file_name
                ),
            ));
        }
        for (ix, rule) in parms.phn_rules.iter().enumerate() {
            if let Some(first) = rule.phr_pat.first() {
                if parms.phn_hash[*first as usize].is_none() {
                    parms.phn_hash[*first as usize] = Some(ix);
                }
            }
        }
        for i in 0..256usize {
            let b = i as u8;
            parms.phn_is_alpha[i] = table.is_alpha(b);
            parms.phn_to_clean[i] = if table.is_alpha(b) {
                if parms.phn_remove_accents {
                    table.cht_to_upper[table.cht_de_accent[i] as usize]
                } else {
                    table.cht_to_upper[i]
                }
            } else {
                0
            };
        }
        Ok(parms)
    }

    pub fn version(&self) -> &str {
        &self.phn_version
    }

    fn alpha(&self, c: u8) -> bool {
        c != 0 && self.phn_is_alpha[c as usize]
    }

    /// The phonetic code of `inword` (internal bytes).
    pub fn transform(&self, inword: &[u8]) -> Vec<u8> {
        let len = inword.len();
        let mut word: Vec<u8> = inword
            .iter()
            .map(|b| self.phn_to_clean[*b as usize])
            .filter(|b| *b != 0)
            .collect();
        let mut target: Vec<u8> = Vec::with_capacity(len);

        let w = |word: &Vec<u8>, ix: usize| -> u8 { *word.get(ix).unwrap_or(&0) };
        let pat_at = |pat: &[u8], ix: usize| -> u8 { *pat.get(ix).unwrap_or(&0) };

        let mut i = 0usize;
        let mut z = false;
        let mut k = 0usize;
        let mut p0: i32 = -333;

        while w(&word, i) != 0 {
            let c = w(&word, i);
            // the "current letter": a replacement may change it for
            // the emit step without touching the word buffer
            let mut cur_c = c;
            let mut z0 = false;

            if let Some(start) = self.phn_hash[c as usize] {
                let mut n = start;
                while n < self.phn_rules.len() && self.phn_rules[n].phr_pat[0] == c {
                    let pat = &self.phn_rules[n].phr_pat;
                    k = 1;
                    let mut p: i32 = 5;
                    let mut s = 1usize;
                    while s < pat.len()
                        && w(&word, i + k) == pat[s]
                        && !pat[s].is_ascii_digit()
                        && !b"(-<^$".contains(&pat[s])
                    {
                        k += 1;
                        s += 1;
                    }
                    if pat_at(pat, s) == b'(' {
                        // letters in "(..)" match one input letter
                        let close = pat[s..].iter().position(|b| *b == b')');
                        if let Some(close_rel) = close {
                            let set = &pat[s + 1..s + close_rel];
                            if self.alpha(w(&word, i + k)) && set.contains(&w(&word, i + k)) {
                                k += 1;
                                s += close_rel + 1;
                            }
                        }
                    }
                    p0 = pat_at(pat, s) as i32;
                    let k0 = k;
                    while pat_at(pat, s) == b'-' && k > 1 {
                        k -= 1;
                        s += 1;
                    }
                    if pat_at(pat, s) == b'<' {
                        s += 1;
                    }
                    if pat_at(pat, s).is_ascii_digit() {
                        p = (pat_at(pat, s) - b'0') as i32;
                        s += 1;
                    }
                    if pat_at(pat, s) == b'^' && pat_at(pat, s + 1) == b'^' {
                        s += 1;
                    }

                    let s_ch = pat_at(pat, s);
                    let rule_fits = s_ch == 0
                        || (s_ch == b'^'
                            && (i == 0 || !self.alpha(w(&word, i - 1)))
                            && (pat_at(pat, s + 1) != b'$' || !self.alpha(w(&word, i + k0))))
                        || (s_ch == b'$'
                            && i > 0
                            && self.alpha(w(&word, i - 1))
                            && !self.alpha(w(&word, i + k0)));

                    if rule_fits {
                        // look for a follow-up rule on the last matched letter
                        let c0 = w(&word, i + k - 1);
                        let mut blocked = false;
                        if self.phn_followup
                            && k > 1
                            && p0 != b'-' as i32
                            && w(&word, i + k) != 0
                        {
                            if let Some(start0) = self.phn_hash[c0 as usize] {
                                let mut n0 = start0;
                                let mut pf: i32 = 5;
                                while n0 < self.phn_rules.len()
                                    && self.phn_rules[n0].phr_pat[0] == c0
                                {
                                    let fpat = &self.phn_rules[n0].phr_pat;
                                    let mut kf = k;
                                    pf = 5;
                                    let mut fs = 1usize;
                                    while fs < fpat.len()
                                        && w(&word, i + kf) == fpat[fs]
                                        && !fpat[fs].is_ascii_digit()
                                        && !b"(-<^$".contains(&fpat[fs])
                                    {
                                        kf += 1;
                                        fs += 1;
                                    }
                                    if pat_at(fpat, fs) == b'(' {
                                        let close = fpat[fs..].iter().position(|b| *b == b')');
                                        if let Some(close_rel) = close {
                                            let set = &fpat[fs + 1..fs + close_rel];
                                            if self.alpha(w(&word, i + kf))
                                                && set.contains(&w(&word, i + kf))
                                            {
                                                kf += 1;
                                                fs += close_rel + 1;
                                            }
                                        }
                                    }
                                    while pat_at(fpat, fs) == b'-' {
                                        // kf is not reduced here
                                        fs += 1;
                                    }
                                    if pat_at(fpat, fs) == b'<' {
                                        fs += 1;
                                    }
                                    if pat_at(fpat, fs).is_ascii_digit() {
                                        pf = (pat_at(fpat, fs) - b'0') as i32;
                                        fs += 1;
                                    }
                                    let fch = pat_at(fpat, fs);
                                    if fch == 0
                                        || (fch == b'$' && !self.alpha(w(&word, i + kf)))
                                    {
                                        if kf == k {
                                            // just a piece of the matched string
                                            n0 += 1;
                                            continue;
                                        }
                                        if pf < p {
                                            n0 += 1;
                                            continue;
                                        }
                                        break;
                                    }
                                    n0 += 1;
                                }
                                if pf >= p
                                    && n0 < self.phn_rules.len()
                                    && self.phn_rules[n0].phr_pat[0] == c0
                                {
                                    blocked = true;
                                }
                            }
                        }
                        if blocked {
                            n += 1;
                            continue;
                        }

                        // apply the replacement
                        let repl = self.phn_rules[n].phr_repl.clone();
                        let has_rewrite = pat[1..].contains(&b'<');
                        p0 = if has_rewrite { 1 } else { 0 };
                        if has_rewrite && !z {
                            // rewrite the input in place and rescan
                            if !target.is_empty() && !repl.is_empty() {
                                let last = *target.last().unwrap();
                                if last == c || last == repl[0] {
                                    target.pop();
                                }
                            }
                            z0 = true;
                            z = true;
                            let mut k0w = 0usize;
                            while k0w < repl.len() && w(&word, i + k0w) != 0 {
                                word[i + k0w] = repl[k0w];
                                k0w += 1;
                            }
                            if k > k0w {
                                word.drain(i + k0w..i + k);
                            }
                        } else {
                            i += k - 1;
                            z = false;
                            let mut last_c = 0u8;
                            if !repl.is_empty() {
                                for rix in 0..repl.len() - 1 {
                                    if target.len() < len
                                        && (target.is_empty()
                                            || *target.last().unwrap() != repl[rix])
                                    {
                                        target.push(repl[rix]);
                                    }
                                }
                                last_c = repl[repl.len() - 1];
                            }
                            // the last replacement byte becomes the current
                            // letter and goes through the collapse logic at
                            // the bottom of the loop
                            cur_c = last_c;
                            if pat[1..].windows(2).any(|wd| wd == b"^^") {
                                if cur_c != 0 && target.len() < len {
                                    target.push(cur_c);
                                }
                                word.drain(0..i + 1);
                                i = 0;
                                z0 = true;
                            }
                        }
                        break;
                    }
                    n += 1;
                }
            }

            if !z0 {
                if k != 0
                    && p0 == 0
                    && target.len() < len
                    && cur_c != 0
                    && (!self.phn_collapse_result
                        || target.is_empty()
                        || *target.last().unwrap() != cur_c)
                {
                    target.push(cur_c);
                }
                i += 1;
                z = false;
                k = 0;
            }
        }

        target
    }
}
