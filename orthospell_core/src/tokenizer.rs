/// Splits a filtered character stream into candidate word spans
/// using the language's character classes. Positions are source
/// byte offsets, recovered by summing unit widths.
use crate::convert::FilterChar;
use crate::lang::Lang;

#[derive(Debug, Default, Copy, Clone)]
pub struct TokClass {
    pub begin: bool,
    pub middle: bool,
    pub end: bool,
    pub word: bool,
}

pub struct Tokenizer {
    tok_class: [TokClass; 256],
    /// the current word in internal-charset bytes
    pub tok_word: Vec<u8>,
    /// source byte offset of the word's first unit
    pub tok_begin_pos: u32,
    /// source byte offset one past the word's last unit
    pub tok_end_pos: u32,
    tok_cursor: usize,
}

impl Tokenizer {
    pub fn new(lang: &Lang) -> Tokenizer {
        let mut class = [TokClass::default(); 256];
        for i in 0..256usize {
            let b = i as u8;
            let special = lang.special(b);
            class[i] = TokClass {
                begin: special.begin && !lang.is_alpha(b),
                middle: special.middle && !lang.is_alpha(b),
                end: special.end && !lang.is_alpha(b),
                word: lang.is_alpha(b),
            };
        }
        Tokenizer {
            tok_class: class,
            tok_word: Vec::new(),
            tok_begin_pos: 0,
            tok_end_pos: 0,
            tok_cursor: 0,
        }
    }

    pub fn reset(&mut self) {
        self.tok_word.clear();
        self.tok_begin_pos = 0;
        self.tok_end_pos = 0;
        self.tok_cursor = 0;
    }

    pub fn is_word_chr(&self, chr: u32) -> bool {
        chr < 256 && self.tok_class[chr as usize].word
    }

    pub fn is_begin_chr(&self, chr: u32) -> bool {
        chr < 256 && self.tok_class[chr as usize].begin
    }

    pub fn is_middle_chr(&self, chr: u32) -> bool {
        chr < 256 && self.tok_class[chr as usize].middle
    }

    pub fn is_end_chr(&self, chr: u32) -> bool {
        chr < 256 && self.tok_class[chr as usize].end
    }

    fn chr(chars: &[FilterChar], ix: usize) -> u32 {
        chars.get(ix).map(|fc| fc.chr).unwrap_or(0)
    }

    fn width(chars: &[FilterChar], ix: usize) -> u32 {
        chars.get(ix).map(|fc| fc.width).unwrap_or(0)
    }

    /// Scans the next word of `chars` (the same slice must be passed
    /// on every call until `reset`). False when input is exhausted.
    pub fn advance(&mut self, chars: &[FilterChar]) -> bool {
        self.tok_word.clear();
        let mut cur = self.tok_cursor;
        let mut cur_pos = self.tok_end_pos;

        // skip anything that can not start a word
        while Self::chr(chars, cur) != 0
            && !(self.is_word_chr(Self::chr(chars, cur))
                || (self.is_begin_chr(Self::chr(chars, cur))
                    && self.is_word_chr(Self::chr(chars, cur + 1))))
        {
            cur_pos += Self::width(chars, cur);
            cur += 1;
        }

        if Self::chr(chars, cur) == 0 {
            self.tok_cursor = cur;
            self.tok_begin_pos = cur_pos;
            self.tok_end_pos = cur_pos;
            return false;
        }

        let word_begin = cur;
        self.tok_begin_pos = cur_pos;

        // a begin special is part of the span but not of the word
        if self.is_begin_chr(Self::chr(chars, cur)) && self.is_word_chr(Self::chr(chars, cur + 1))
        {
            cur_pos += Self::width(chars, cur);
            cur += 1;
        }

        while self.is_word_chr(Self::chr(chars, cur))
            || (self.is_middle_chr(Self::chr(chars, cur))
                && cur > word_begin
                && self.is_word_chr(Self::chr(chars, cur - 1))
                && self.is_word_chr(Self::chr(chars, cur + 1)))
        {
            self.tok_word.push(Self::chr(chars, cur) as u8);
            cur_pos += Self::width(chars, cur);
            cur += 1;
        }

        if self.is_end_chr(Self::chr(chars, cur)) {
            self.tok_word.push(Self::chr(chars, cur) as u8);
            cur_pos += Self::width(chars, cur);
            cur += 1;
        }

        self.tok_cursor = cur;
        self.tok_end_pos = cur_pos;
        true
    }
}
