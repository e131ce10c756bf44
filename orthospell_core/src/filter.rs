/// Content filters blank out spans that should not be spell checked.
/// A filter may rewrite the code of a unit but never its width, so
/// positions keep mapping back to source bytes.
use crate::convert::FilterChar;
use crate::error::{Error, ErrorKind, Result};

pub const BLANK_CHAR: u32 = b' ' as u32;

/// Which stage of the pipeline a filter runs in: before
/// tokenization on freshly decoded units, in the middle rewriting
/// units in place, or on the output side before emission.
#[derive(Debug, PartialEq, Copy, Clone)]
pub enum FilterKind {
    DecoderFilter,
    UnitFilter,
    EncoderFilter,
}

pub trait TextFilter {
    fn name(&self) -> &'static str;

    fn kind(&self) -> FilterKind {
        FilterKind::UnitFilter
    }

    /// Where in the chain this filter runs; chains sort ascending.
    /// Must be strictly between 0 and 1.
    fn order_num(&self) -> f64;
    fn reset(&mut self);
    fn process(&mut self, chars: &mut [FilterChar]);
}

impl std::fmt::Debug for dyn TextFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextFilter").field("name", &self.name()).finish()
    }
}

/// An ordered chain of filters applied in sequence.
pub struct FilterChain {
    fch_filters: Vec<Box<dyn TextFilter>>,
}

impl FilterChain {
    pub fn new() -> FilterChain {
        FilterChain {
            fch_filters: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fch_filters.is_empty()
    }

    pub fn add_filter(&mut self, filter: Box<dyn TextFilter>) {
        let pos = self
            .fch_filters
            .iter()
            .position(|f| f.order_num() > filter.order_num())
            .unwrap_or(self.fch_filters.len());
        self.fch_filters.insert(pos, filter);
    }

    pub fn reset(&mut self) {
        for filter in self.fch_filters.iter_mut() {
            filter.reset();
        }
    }

    pub fn process(&mut self, chars: &mut [FilterChar]) {
        for filter in self.fch_filters.iter_mut() {
            filter.process(chars);
        }
    }
}

/// Creates a filter by registry name.
pub fn new_filter(name: &str) -> Result<Box<dyn TextFilter>> {
    match name {
        "url" => Ok(Box::new(UrlFilter)),
        _ => Err(Error::new(
            ErrorKind::NoSuchFilter,
            format!("There is no filter named \"{}\".", name),
        )),
    }
}

/// The filters a named mode turns on.
pub fn mode_filters(mode: &str) -> Result<&'static [&'static str]> {
    match mode {
        "none" => Ok(&[]),
        "url" => Ok(&["url"]),
        _ => Err(Error::new(
            ErrorKind::UnknownMode,
            format!("The mode \"{}\" is not known.", mode),
        )),
    }
}

/// Blanks out runs that look like URLs, host names, or email
/// addresses: a run of non-space characters containing `//` after a
/// dot-free prefix, an `@`, or more than one separated dot.
struct UrlFilter;

fn url_char(chr: u32) -> bool {
    chr != b'"' as u32
        && chr != b' ' as u32
        && chr != b'\n' as u32
        && chr != b'\t' as u32
        && chr != 0
}

impl TextFilter for UrlFilter {
    fn name(&self) -> &'static str {
        "url"
    }

    fn order_num(&self) -> f64 {
        0.95
    }

    fn reset(&mut self) {}

    fn process(&mut self, chars: &mut [FilterChar]) {
        let len = chars.len();
        let mut cur = 0usize;
        while cur < len {
            if !url_char(chars[cur].chr) {
                cur += 1;
                continue;
            }
            let run_start = cur;
            let mut blank_out = false;
            let mut point_chars = 0;
            // the deciding characters only count in the middle of a run
            while cur + 1 < len && url_char(chars[cur + 1].chr) {
                let this = chars[cur].chr;
                let next = chars[cur + 1].chr;
                if !blank_out {
                    if (this == b'/' as u32 && (point_chars > 0 || next == b'/' as u32))
                        || this == b'@' as u32
                    {
                        blank_out = true;
                    } else if this == b'.' as u32 && next != b'.' as u32 {
                        // a run of dots counts once
                        if point_chars < 1 {
                            point_chars += 1;
                        } else {
                            blank_out = true;
                        }
                    }
                }
                cur += 1;
            }
            cur += 1;
            if blank_out {
                for fc in chars[run_start..cur].iter_mut() {
                    fc.chr = BLANK_CHAR;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars_of(text: &str) -> Vec<FilterChar> {
        text.chars().map(|c| FilterChar::new(c as u32, 1)).collect()
    }

    fn text_of(chars: &[FilterChar]) -> String {
        chars
            .iter()
            .map(|fc| char::from_u32(fc.chr).unwrap())
            .collect()
    }

    #[test]
    fn url_filter_blanks_addresses() {
        let mut filter = new_filter("url").unwrap();
        let mut chars = chars_of("see http://example.com now");
        filter.process(&mut chars);
        assert_eq!(text_of(&chars), "see                    now");
    }

    #[test]
    fn url_filter_blanks_mail_and_hosts() {
        let mut filter = new_filter("url").unwrap();
        let mut chars = chars_of("ask info@example.org or www.example.org please");
        filter.process(&mut chars);
        assert_eq!(text_of(&chars), "ask                  or                 please");
    }

    #[test]
    fn url_filter_keeps_plain_text() {
        let mut filter = new_filter("url").unwrap();
        let original = "a sentence. with punctuation.";
        let mut chars = chars_of(original);
        filter.process(&mut chars);
        assert_eq!(text_of(&chars), original);
    }

    #[test]
    fn widths_survive_blanking() {
        let mut filter = new_filter("url").unwrap();
        let mut chars = chars_of("x@y.com");
        chars[0].width = 2;
        let before: Vec<u32> = chars.iter().map(|fc| fc.width).collect();
        filter.process(&mut chars);
        let after: Vec<u32> = chars.iter().map(|fc| fc.width).collect();
        assert_eq!(before, after);
        assert!(chars.iter().all(|fc| fc.chr == BLANK_CHAR));
    }

    #[test]
    fn unknown_filter_name() {
        let err = new_filter("tex").unwrap_err();
        assert!(err.is_a(ErrorKind::NoSuchFilter));
        let err = mode_filters("tex").unwrap_err();
        assert!(err.is_a(ErrorKind::UnknownMode));
    }

    #[test]
    fn registry_filters_are_unit_stage() {
        let filter = new_filter("url").unwrap();
        assert_eq!(filter.kind(), FilterKind::UnitFilter);
        assert!(filter.order_num() > 0.0 && filter.order_num() < 1.0);
    }

    #[test]
    fn chain_orders_by_order_num() {
        struct Tag(&'static str, f64, char);
        impl TextFilter for Tag {
            fn name(&self) -> &'static str {
                self.0
            }
            fn order_num(&self) -> f64 {
                self.1
            }
            fn reset(&mut self) {}
            fn process(&mut self, chars: &mut [FilterChar]) {
                chars[0].chr = self.2 as u32;
            }
        }
        let mut chain = FilterChain::new();
        chain.add_filter(Box::new(Tag("late", 0.9, 'b')));
        chain.add_filter(Box::new(Tag("early", 0.1, 'a')));
        let mut chars = chars_of("x");
        chain.process(&mut chars);
        // the later filter runs second and wins
        assert_eq!(chars[0].chr, 'b' as u32);
    }
}
