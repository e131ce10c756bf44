/// The document checker: a segment graph over the caller's source
/// strings supporting incremental checking and in-place replacement
/// without re-scanning unchanged regions.
///
/// Segments live in a slab with stable handles; the graph is a
/// doubly linked list of handles. Segment data sits behind an `Arc`
/// because a replace may produce segments that still borrow the
/// head or tail of an older buffer.
use std::sync::{Arc, OnceLock};

use crate::convert::FilterChar;
use crate::filter::FilterChain;
use crate::lang::Lang;
use crate::speller::Speller;
use crate::tokenizer::Tokenizer;

/// Data pushed by the caller in response to `need_more`.
pub struct SourceChunk {
    pub sck_text: Vec<u8>,
    pub sck_ignore: u32,
    pub sck_which: u32,
}

/// The checker's side of the conversation with its owner: asked for
/// more data at the end of the graph, told when a source string is
/// no longer referenced. A `which` of zero is an untagged string
/// and never reported.
pub trait CheckerHooks {
    fn need_more(&mut self, which: u32) -> Option<SourceChunk> {
        let _ = which;
        None
    }

    fn string_freed(&mut self, which: u32) {
        let _ = which;
    }
}

type SegRef = usize;

struct Segment {
    seg_data: Arc<Vec<FilterChar>>,
    seg_begin: usize,
    seg_end: usize,
    seg_prev: Option<SegRef>,
    seg_next: Option<SegRef>,
    seg_which: u32,
    seg_id: u32,
    /// source byte offset of this segment's first unit
    seg_offset: u32,
    /// skip tokens starting inside this many source bytes
    seg_ignore: u32,
    seg_sep: bool,
}

impl Segment {
    fn len(&self) -> usize {
        self.seg_end - self.seg_begin
    }

    fn unit(&self, rel: usize) -> FilterChar {
        self.seg_data[self.seg_begin + rel]
    }
}

// a separator: two marker units no token can cross, zero width so
// offsets are unaffected
fn separator_data() -> Arc<Vec<FilterChar>> {
    static SEP: OnceLock<Arc<Vec<FilterChar>>> = OnceLock::new();
    SEP.get_or_init(|| {
        Arc::new(vec![FilterChar::new(0x10, 0), FilterChar::new(0x10, 0)])
    })
    .clone()
}

/// A produced token. Offsets are byte positions into the caller's
/// original string identified by `ctk_which`.
#[derive(Debug, Clone)]
pub struct CheckerToken {
    pub ctk_word: String,
    pub ctk_word_bytes: Vec<u8>,
    pub ctk_begin: u32,
    pub ctk_len: u32,
    pub ctk_which: u32,
    pub ctk_correct: bool,
}

// the current token, pinned to the graph for replace()
#[derive(Clone)]
struct IToken {
    itk_b_seg: SegRef,
    itk_b_ix: usize,
    itk_e_seg: SegRef,
    itk_e_ix: usize,
    itk_b_off: u32,
    itk_e_off: u32,
}

struct SegCursor {
    cur_seg: SegRef,
    cur_ix: usize,
    cur_off: u32,
}

pub struct Checker {
    chk_lang: Arc<Lang>,
    chk_filter: FilterChain,
    chk_tok: Tokenizer,
    chk_segs: Vec<Option<Segment>>,
    chk_free: Vec<SegRef>,
    chk_first: SegRef,
    chk_last: SegRef,
    chk_last_id: u32,
    chk_span_strings: bool,
    chk_hooks: Option<Box<dyn CheckerHooks>>,
    chk_token: Option<IToken>,
    chk_cursor: SegCursor,
}

impl Checker {
    pub fn new(lang: Arc<Lang>, filter: FilterChain) -> Checker {
        let tok = Tokenizer::new(&lang);
        let mut checker = Checker {
            chk_lang: lang,
            chk_filter: filter,
            chk_tok: tok,
            chk_segs: Vec::new(),
            chk_free: Vec::new(),
            chk_first: 0,
            chk_last: 0,
            chk_last_id: 0,
            chk_span_strings: false,
            chk_hooks: None,
            chk_token: None,
            chk_cursor: SegCursor {
                cur_seg: 0,
                cur_ix: 0,
                cur_off: 0,
            },
        };
        checker.install_empty();
        checker
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn CheckerHooks>) {
        self.chk_hooks = Some(hooks);
    }

    pub fn span_strings(&self) -> bool {
        self.chk_span_strings
    }

    pub fn set_span_strings(&mut self, value: bool) {
        self.chk_span_strings = value;
    }

    //
    // slab plumbing
    //

    fn seg(&self, r: SegRef) -> &Segment {
        self.chk_segs[r].as_ref().unwrap()
    }

    fn seg_mut(&mut self, r: SegRef) -> &mut Segment {
        self.chk_segs[r].as_mut().unwrap()
    }

    fn alloc(&mut self, seg: Segment) -> SegRef {
        match self.chk_free.pop() {
            Some(r) => {
                self.chk_segs[r] = Some(seg);
                r
            }
            None => {
                self.chk_segs.push(Some(seg));
                self.chk_segs.len() - 1
            }
        }
    }

    fn release(&mut self, r: SegRef) -> Segment {
        let seg = self.chk_segs[r].take().unwrap();
        self.chk_free.push(r);
        seg
    }

    fn live_id(&self, id: u32) -> bool {
        self.chk_segs
            .iter()
            .flatten()
            .any(|seg| seg.seg_id == id)
    }

    // fires string_freed once per source string whose last segment
    // just left the graph
    fn fire_freed(&mut self, freed: Vec<(u32, u32)>) {
        let mut seen: Vec<u32> = Vec::new();
        for (id, which) in freed {
            if which == 0 || seen.contains(&id) {
                continue;
            }
            seen.push(id);
            if !self.live_id(id) {
                if let Some(mut hooks) = self.chk_hooks.take() {
                    hooks.string_freed(which);
                    self.chk_hooks = Some(hooks);
                }
            }
        }
    }

    // frees the chain strictly between f and l
    fn free_between(&mut self, f: SegRef, l: SegRef) {
        let mut freed = Vec::new();
        let mut cur = self.seg(f).seg_next;
        while let Some(r) = cur {
            if r == l {
                break;
            }
            let seg = self.release(r);
            freed.push((seg.seg_id, seg.seg_which));
            cur = seg.seg_next;
        }
        self.seg_mut(f).seg_next = Some(l);
        self.seg_mut(l).seg_prev = Some(f);
        self.fire_freed(freed);
    }

    fn install_empty(&mut self) {
        let seg = Segment {
            seg_data: Arc::new(Vec::new()),
            seg_begin: 0,
            seg_end: 0,
            seg_prev: None,
            seg_next: None,
            seg_which: 0,
            seg_id: 0,
            seg_offset: 0,
            seg_ignore: 0,
            seg_sep: false,
        };
        let r = self.alloc(seg);
        self.chk_first = r;
        self.chk_last = r;
        self.chk_cursor = SegCursor {
            cur_seg: r,
            cur_ix: 0,
            cur_off: 0,
        };
        self.chk_token = None;
    }

    /// Starts over: frees every segment and resets the tokenizer
    /// and filter state.
    pub fn reset(&mut self) {
        let mut freed = Vec::new();
        for slot in self.chk_segs.iter_mut() {
            if let Some(seg) = slot.take() {
                freed.push((seg.seg_id, seg.seg_which));
            }
        }
        self.chk_segs.clear();
        self.chk_free.clear();
        self.fire_freed(freed);
        self.chk_filter.reset();
        self.chk_tok.reset();
        self.install_empty();
    }

    // decode, filter, and wrap one source string
    fn fill_data(&mut self, text: &[u8]) -> Arc<Vec<FilterChar>> {
        let mut chars = Vec::with_capacity(text.len());
        self.chk_lang.decode_utf8_chars(text, &mut chars);
        self.chk_filter.process(&mut chars);
        Arc::new(chars)
    }

    /// Appends a source string to the tail of the graph. The first
    /// `ignore` source bytes produce no tokens. `which` is the
    /// caller's tag for this string (zero for untagged).
    pub fn process(&mut self, text: &[u8], ignore: u32, which: u32) {
        if text.len() as u32 > ignore {
            let data = self.fill_data(text);
            self.chk_last_id += 1;
            let id = self.chk_last_id;
            let seg = Segment {
                seg_begin: 0,
                seg_end: data.len(),
                seg_data: data,
                seg_prev: Some(self.chk_last),
                seg_next: None,
                seg_which: which,
                seg_id: id,
                seg_offset: 0,
                seg_ignore: ignore,
                seg_sep: false,
            };
            let r = self.alloc(seg);
            let last = self.chk_last;
            self.seg_mut(last).seg_next = Some(r);
            self.chk_last = r;
            if !self.chk_span_strings {
                self.add_separator();
            }
        } else {
            // nothing checkable, but stateful filters still see it
            let _ = self.fill_data(text);
            if which != 0 {
                if let Some(mut hooks) = self.chk_hooks.take() {
                    hooks.string_freed(which);
                    self.chk_hooks = Some(hooks);
                }
            }
        }
    }

    /// Inserts a separator after the last segment so no token can
    /// cross into the next source string.
    pub fn add_separator(&mut self) {
        let last = self.chk_last;
        let (which, id) = {
            let seg = self.seg(last);
            (seg.seg_which, seg.seg_id)
        };
        let sep = Segment {
            seg_data: separator_data(),
            seg_begin: 0,
            seg_end: 2,
            seg_prev: Some(last),
            seg_next: None,
            seg_which: which,
            seg_id: id,
            seg_offset: 0,
            seg_ignore: 0,
            seg_sep: true,
        };
        let r = self.alloc(sep);
        self.seg_mut(last).seg_next = Some(r);
        self.chk_last = r;
    }

    //
    // cursor movement
    //

    // moves the cursor to the next real unit, hopping segments;
    // false at the end of the graph
    fn cursor_normalize(&mut self) -> bool {
        loop {
            let seg = self.seg(self.chk_cursor.cur_seg);
            if self.chk_cursor.cur_ix < seg.len() {
                return true;
            }
            match seg.seg_next {
                Some(next) => {
                    self.chk_cursor.cur_seg = next;
                    self.chk_cursor.cur_ix = 0;
                    self.chk_cursor.cur_off = self.seg(next).seg_offset;
                }
                None => return false,
            }
        }
    }

    fn cursor_chr(&self) -> u32 {
        let seg = self.seg(self.chk_cursor.cur_seg);
        seg.unit(self.chk_cursor.cur_ix).chr
    }

    fn cursor_adv(&mut self) {
        let seg = self.seg(self.chk_cursor.cur_seg);
        self.chk_cursor.cur_off += seg.unit(self.chk_cursor.cur_ix).width;
        self.chk_cursor.cur_ix += 1;
    }

    // the unit `ahead` positions past the cursor, 0 at graph end
    fn peek_chr(&self, ahead: usize) -> u32 {
        let mut seg_ref = self.chk_cursor.cur_seg;
        let mut ix = self.chk_cursor.cur_ix + ahead;
        loop {
            let seg = self.seg(seg_ref);
            if ix < seg.len() {
                return seg.unit(ix).chr;
            }
            ix -= seg.len();
            match seg.seg_next {
                Some(next) => seg_ref = next,
                None => return 0,
            }
        }
    }

    // asks the hooks for more data; true if any arrived
    fn request_more(&mut self) -> bool {
        let which = self.seg(self.chk_last).seg_which;
        let chunk = match self.chk_hooks.take() {
            Some(mut hooks) => {
                let chunk = hooks.need_more(which);
                self.chk_hooks = Some(hooks);
                chunk
            }
            None => None,
        };
        match chunk {
            Some(chunk) => {
                self.process(&chunk.sck_text, chunk.sck_ignore, chunk.sck_which);
                true
            }
            None => false,
        }
    }

    //
    // token scan
    //

    /// The next candidate word, or None when the graph is exhausted
    /// and the hooks supply nothing further.
    pub fn next(&mut self) -> Option<CheckerToken> {
        'scan: loop {
            // find a start unit
            loop {
                if !self.cursor_normalize() {
                    if !self.request_more() {
                        return None;
                    }
                    continue;
                }
                let c = self.cursor_chr();
                if self.chk_tok.is_word_chr(c)
                    || (self.chk_tok.is_begin_chr(c) && self.chk_tok.is_word_chr(self.peek_chr(1)))
                {
                    break;
                }
                self.cursor_adv();
            }

            let b_seg = self.chk_cursor.cur_seg;
            let b_ix = self.chk_cursor.cur_ix;
            let b_off = self.chk_cursor.cur_off;
            let which = self.seg(b_seg).seg_which;
            let mut word: Vec<u8> = Vec::new();

            // a begin special is part of the span, not of the word
            if self.chk_tok.is_begin_chr(self.cursor_chr()) {
                self.cursor_adv();
            }

            let mut e_seg = self.chk_cursor.cur_seg;
            let mut e_ix = self.chk_cursor.cur_ix;
            let mut e_off = self.chk_cursor.cur_off;
            loop {
                if !self.cursor_normalize() {
                    break;
                }
                let c = self.cursor_chr();
                if self.chk_tok.is_word_chr(c)
                    || (self.chk_tok.is_middle_chr(c)
                        && !word.is_empty()
                        && self.chk_tok.is_word_chr(self.peek_chr(1)))
                {
                    word.push(c as u8);
                    self.cursor_adv();
                } else if self.chk_tok.is_end_chr(c) && !word.is_empty() {
                    word.push(c as u8);
                    self.cursor_adv();
                    e_seg = self.chk_cursor.cur_seg;
                    e_ix = self.chk_cursor.cur_ix;
                    e_off = self.chk_cursor.cur_off;
                    break;
                } else {
                    break;
                }
                e_seg = self.chk_cursor.cur_seg;
                e_ix = self.chk_cursor.cur_ix;
                e_off = self.chk_cursor.cur_off;
            }

            if word.is_empty() {
                // a lone begin special; move on
                continue 'scan;
            }

            // tokens inside the ignored prefix of their segment are
            // not reported
            if b_off < self.seg(b_seg).seg_ignore {
                continue 'scan;
            }

            self.chk_token = Some(IToken {
                itk_b_seg: b_seg,
                itk_b_ix: b_ix,
                itk_e_seg: e_seg,
                itk_e_ix: e_ix,
                itk_b_off: b_off,
                itk_e_off: e_off,
            });
            let display = self.chk_lang.to_display(&word);
            return Some(CheckerToken {
                ctk_word: display,
                ctk_word_bytes: word,
                ctk_begin: b_off,
                ctk_len: e_off - b_off,
                ctk_which: which,
                ctk_correct: false,
            });
        }
    }

    /// Advances to the next token the speller rejects.
    pub fn next_misspelling(&mut self, speller: &Speller) -> Option<CheckerToken> {
        loop {
            let mut token = self.next()?;
            token.ctk_correct = speller.check_word_bytes(&token.ctk_word_bytes);
            if !token.ctk_correct {
                return Some(token);
            }
        }
    }

    //
    // replacement
    //

    /// Splices `text` in place of the current token and re-anchors
    /// the cursor at the replacement, so corrections are re-checked
    /// and later offsets stay consistent.
    pub fn replace(&mut self, text: &[u8]) {
        let token = match self.chk_token.take() {
            Some(token) => token,
            None => {
                log::warn!("replace without a current token");
                return;
            }
        };
        let data = self.fill_data(text);
        let repl_width: u32 = FilterChar::sum_width(&data);
        let tok_width = token.itk_e_off - token.itk_b_off;
        let id = self.seg(token.itk_b_seg).seg_id;

        let new_seg;
        let whole_segment = token.itk_b_seg == token.itk_e_seg
            && token.itk_b_ix == 0
            && token.itk_e_ix == self.seg(token.itk_e_seg).len();
        if whole_segment {
            // reuse the segment, keeping its place in the chain
            let seg = self.seg_mut(token.itk_b_seg);
            seg.seg_begin = 0;
            seg.seg_end = data.len();
            seg.seg_data = data;
            new_seg = token.itk_b_seg;
        } else {
            let cross_segment = token.itk_b_seg != token.itk_e_seg;
            // the tail keeps everything after the token; when the
            // token sits inside one segment the tail is a second
            // view of the same buffer
            let tail_seg = if cross_segment {
                token.itk_e_seg
            } else {
                let src = self.seg(token.itk_e_seg);
                let tail = Segment {
                    seg_data: src.seg_data.clone(),
                    seg_begin: src.seg_begin,
                    seg_end: src.seg_end,
                    seg_prev: None,
                    seg_next: src.seg_next,
                    seg_which: src.seg_which,
                    seg_id: src.seg_id,
                    seg_offset: src.seg_offset,
                    seg_ignore: 0,
                    seg_sep: false,
                };
                self.alloc(tail)
            };
            if cross_segment {
                self.free_between(token.itk_b_seg, token.itk_e_seg);
            }

            let head = self.seg(token.itk_b_seg);
            let head_begin = head.seg_begin;
            let which = head.seg_which;
            let data_len = data.len();
            let repl = Segment {
                seg_data: data,
                seg_begin: 0,
                seg_end: data_len,
                seg_prev: Some(token.itk_b_seg),
                seg_next: Some(tail_seg),
                seg_which: which,
                seg_id: id,
                seg_offset: token.itk_b_off,
                seg_ignore: 0,
                seg_sep: false,
            };
            let repl_ref = self.alloc(repl);
            {
                let head = self.seg_mut(token.itk_b_seg);
                head.seg_end = head_begin + token.itk_b_ix;
                head.seg_next = Some(repl_ref);
            }
            {
                let tail_begin = self.seg(tail_seg).seg_begin;
                let tail = self.seg_mut(tail_seg);
                tail.seg_begin = tail_begin + token.itk_e_ix;
                tail.seg_offset = token.itk_e_off;
                tail.seg_prev = Some(repl_ref);
            }
            match self.seg(tail_seg).seg_next {
                Some(after) => self.seg_mut(after).seg_prev = Some(tail_seg),
                None => self.chk_last = tail_seg,
            }
            if cross_segment && !self.chk_span_strings {
                self.ensure_separator(id);
            }
            new_seg = repl_ref;
        }

        // every later segment of this source string shifts by the
        // width difference
        let diff = repl_width as i64 - tok_width as i64;
        let mut cur = self.seg(new_seg).seg_next;
        while let Some(r) = cur {
            let seg = self.seg_mut(r);
            if seg.seg_id != id {
                break;
            }
            if !seg.seg_sep {
                seg.seg_offset = (seg.seg_offset as i64 + diff) as u32;
            }
            cur = seg.seg_next;
        }

        // re-anchor at the replacement
        self.chk_cursor = SegCursor {
            cur_seg: new_seg,
            cur_ix: 0,
            cur_off: self.seg(new_seg).seg_offset,
        };
        self.chk_token = None;
    }

    // after a cross-segment splice the separator that closes this
    // source string must still exist
    fn ensure_separator(&mut self, id: u32) {
        let mut cur = Some(self.chk_first);
        let mut group_tail: Option<SegRef> = None;
        while let Some(r) = cur {
            if self.seg(r).seg_id == id {
                group_tail = Some(r);
            }
            cur = self.seg(r).seg_next;
        }
        let tail = match group_tail {
            Some(tail) => tail,
            None => return,
        };
        if self.seg(tail).seg_sep {
            return;
        }
        let (which, after) = {
            let seg = self.seg(tail);
            (seg.seg_which, seg.seg_next)
        };
        let sep = Segment {
            seg_data: separator_data(),
            seg_begin: 0,
            seg_end: 2,
            seg_prev: Some(tail),
            seg_next: after,
            seg_which: which,
            seg_id: id,
            seg_offset: 0,
            seg_ignore: 0,
            seg_sep: true,
        };
        let r = self.alloc(sep);
        self.seg_mut(tail).seg_next = Some(r);
        match after {
            Some(after_ref) => self.seg_mut(after_ref).seg_prev = Some(r),
            None => self.chk_last = r,
        }
    }

    #[cfg(test)]
    fn segment_count(&self) -> usize {
        self.chk_segs.iter().flatten().count()
    }

    #[cfg(test)]
    fn chain_is_consistent(&self) -> bool {
        let mut cur = Some(self.chk_first);
        let mut prev: Option<SegRef> = None;
        let mut count = 0usize;
        while let Some(r) = cur {
            let seg = self.seg(r);
            if seg.seg_prev != prev {
                return false;
            }
            prev = Some(r);
            cur = seg.seg_next;
            count += 1;
            if count > self.chk_segs.len() {
                return false; // cycle
            }
        }
        prev == Some(self.chk_last) && count == self.segment_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::testkit::test_lang;
    use crate::readonly::{LoadOptions, MainDict};
    use crate::reader::VecLineReader;
    use crate::speller::{Speller, SpellerOptions};

    fn test_speller(list: &str) -> Speller {
        let lang = test_lang();
        let mut reader = VecLineReader::from_str("en-common.wl", list);
        let main = MainDict::load(&mut reader, lang.clone(), LoadOptions::default()).unwrap();
        let mut speller = Speller::new(lang, SpellerOptions::defaults());
        speller.add_main(Arc::new(main));
        speller
    }

    fn new_checker() -> Checker {
        Checker::new(test_lang(), FilterChain::new())
    }

    fn words_of(checker: &mut Checker) -> Vec<(String, u32, u32, u32)> {
        let mut out = Vec::new();
        while let Some(token) = checker.next() {
            out.push((token.ctk_word, token.ctk_begin, token.ctk_len, token.ctk_which));
        }
        out
    }

    #[test]
    fn tokens_with_offsets() {
        let mut checker = new_checker();
        checker.process(b"I has a car.", 0, 1);
        let tokens = words_of(&mut checker);
        assert_eq!(
            tokens,
            vec![
                ("I".to_string(), 0, 1, 1),
                ("has".to_string(), 2, 3, 1),
                ("a".to_string(), 6, 1, 1),
                ("car".to_string(), 8, 3, 1),
            ]
        );
        assert!(checker.chain_is_consistent());
    }

    #[test]
    fn empty_process_creates_no_tokens() {
        let mut checker = new_checker();
        checker.process(b"", 0, 0);
        assert!(checker.next().is_none());
        checker.process(b"word.", 0, 0);
        let tokens = words_of(&mut checker);
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn ignore_prefix_suppresses_tokens() {
        let mut checker = new_checker();
        checker.process(b"skip this", 5, 1);
        let tokens = words_of(&mut checker);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].0, "this");
        assert_eq!(tokens[0].1, 5);
    }

    #[test]
    fn span_strings_controls_cross_string_tokens() {
        let mut checker = new_checker();
        checker.set_span_strings(true);
        checker.process(b"hel", 0, 1);
        checker.process(b"lo there", 0, 2);
        let tokens = words_of(&mut checker);
        assert_eq!(tokens[0].0, "hello");

        let mut split = new_checker();
        split.process(b"hel", 0, 1);
        split.process(b"lo there", 0, 2);
        let tokens = words_of(&mut split);
        let words: Vec<&str> = tokens.iter().map(|(w, _, _, _)| w.as_str()).collect();
        assert_eq!(words, vec!["hel", "lo", "there"]);
    }

    #[test]
    fn misspelling_walk() {
        let speller = test_speller("I\nhave\na\ncar\n");
        let mut checker = new_checker();
        checker.process(b"I has a car.", 0, 1);
        let bad = checker.next_misspelling(&speller).unwrap();
        assert_eq!(bad.ctk_word, "has");
        assert_eq!(bad.ctk_begin, 2);
        assert_eq!(bad.ctk_len, 3);
        assert!(checker.next_misspelling(&speller).is_none());
    }

    #[test]
    fn replace_whole_token_and_continue() {
        let speller = test_speller("I\nhave\na\ncar\ntoo\n");
        let mut checker = new_checker();
        checker.process(b"I has a carr too.", 0, 1);
        let bad = checker.next_misspelling(&speller).unwrap();
        assert_eq!(bad.ctk_word, "has");
        checker.replace(b"have");
        // the next misspelling reports offsets in the modified text:
        // "I have a carr too." puts carr at byte 9
        let bad = checker.next_misspelling(&speller).unwrap();
        assert_eq!(bad.ctk_word, "carr");
        assert_eq!(bad.ctk_begin, 9);
        checker.replace(b"car");
        assert!(checker.next_misspelling(&speller).is_none());
        assert!(checker.chain_is_consistent());
    }

    #[test]
    fn replace_adjusts_following_offsets() {
        let mut checker = new_checker();
        checker.process(b"aa bb cc", 0, 7);
        let tokens = words_of(&mut checker);
        assert_eq!(tokens[2].1, 6);

        let mut checker = new_checker();
        checker.process(b"aa bb cc", 0, 7);
        let t1 = checker.next().unwrap();
        assert_eq!(t1.ctk_word, "aa");
        let t2 = checker.next().unwrap();
        assert_eq!(t2.ctk_word, "bb");
        checker.replace(b"bbbb");
        // re-scan starts at the replacement
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "bbbb");
        assert_eq!(t.ctk_begin, 3);
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "cc");
        assert_eq!(t.ctk_begin, 8); // shifted by +2
        assert!(checker.chain_is_consistent());
    }

    #[test]
    fn replace_with_empty_text_collapses_token() {
        let mut checker = new_checker();
        checker.process(b"one two three", 0, 1);
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "one");
        checker.replace(b"");
        // the document is now " two three"
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "two");
        assert_eq!(t.ctk_begin, 1);
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "three");
        assert_eq!(t.ctk_begin, 5);
        assert!(checker.chain_is_consistent());
    }

    #[test]
    fn replace_token_spanning_segments() {
        let mut checker = new_checker();
        checker.set_span_strings(true);
        checker.process(b"mis", 0, 1);
        checker.process(b"take here", 0, 2);
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "mistake");
        checker.replace(b"error");
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "error");
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "here");
        assert!(checker.chain_is_consistent());
    }

    #[test]
    fn replace_inside_previously_split_string() {
        let mut checker = new_checker();
        checker.process(b"abc def", 0, 1);
        checker.process(b"next", 0, 2);
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "abc");
        checker.replace(b"ab");
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "ab");
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "def");
        assert_eq!(t.ctk_begin, 3); // "ab def"
        // def now lives in a tail segment; replace it again
        checker.replace(b"defg");
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "defg");
        // the separator still fences the next string
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "next");
        assert_eq!(t.ctk_which, 2);
        assert_eq!(t.ctk_begin, 0);
        assert!(checker.chain_is_consistent());
    }

    #[test]
    fn separator_rebuilt_after_cross_segment_replace() {
        // build a token spanning two source strings, then disable
        // spanning and replace it: the splice must leave a
        // separator closing the first string
        let mut checker = new_checker();
        checker.set_span_strings(true);
        checker.process(b"mis", 0, 1);
        checker.process(b"take here", 0, 2);
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "mistake");
        checker.set_span_strings(false);
        checker.replace(b"err");
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "err");
        let t = checker.next().unwrap();
        assert_eq!(t.ctk_word, "here");
        assert_eq!(t.ctk_which, 2);
        assert!(checker.chain_is_consistent());
    }

    #[test]
    fn string_freed_fires_once_per_string() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc as StdArc;

        struct Hooks {
            hks_freed: StdArc<AtomicU32>,
        }
        impl CheckerHooks for Hooks {
            fn string_freed(&mut self, which: u32) {
                self.hks_freed.fetch_add(which, Ordering::SeqCst);
            }
        }
        let freed = StdArc::new(AtomicU32::new(0));
        let mut checker = new_checker();
        checker.set_hooks(Box::new(Hooks {
            hks_freed: freed.clone(),
        }));
        checker.process(b"one", 0, 1);
        checker.process(b"two", 0, 2);
        checker.reset();
        // both strings freed exactly once: 1 + 2
        assert_eq!(freed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn need_more_refills_the_graph() {
        struct Hooks {
            hks_chunks: Vec<SourceChunk>,
        }
        impl CheckerHooks for Hooks {
            fn need_more(&mut self, _which: u32) -> Option<SourceChunk> {
                self.hks_chunks.pop()
            }
        }
        let mut checker = new_checker();
        checker.set_hooks(Box::new(Hooks {
            hks_chunks: vec![SourceChunk {
                sck_text: b"more words".to_vec(),
                sck_ignore: 0,
                sck_which: 9,
            }],
        }));
        checker.process(b"first", 0, 1);
        let words = words_of(&mut checker);
        let names: Vec<&str> = words.iter().map(|(w, _, _, _)| w.as_str()).collect();
        assert_eq!(names, vec!["first", "more", "words"]);
        assert_eq!(words[1].3, 9);
    }

    #[test]
    fn reset_allows_reuse() {
        let mut checker = new_checker();
        checker.process(b"alpha beta", 0, 1);
        assert_eq!(words_of(&mut checker).len(), 2);
        checker.reset();
        assert!(checker.next().is_none());
        checker.process(b"gamma", 0, 2);
        let tokens = words_of(&mut checker);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].0, "gamma");
        assert_eq!(tokens[0].1, 0);
    }

    #[test]
    fn filter_blanks_are_not_tokenized() {
        let mut chain = FilterChain::new();
        chain.add_filter(crate::filter::new_filter("url").unwrap());
        let mut checker = Checker::new(test_lang(), chain);
        checker.process(b"see http://example.com now", 0, 1);
        let tokens = words_of(&mut checker);
        let names: Vec<&str> = tokens.iter().map(|(w, _, _, _)| w.as_str()).collect();
        assert_eq!(names, vec!["see", "now"]);
        // the blanked span still occupies its source bytes
        assert_eq!(tokens[1].1, 23);
    }
}
