// The spell-checking engine: per-language character tables and case
// handling, the affix machinery, the dictionary layer, the
// conversion and filter pipeline, the tokenizer, and the incremental
// document checker. File and environment plumbing lives in the
// companion std crate.

pub mod affix;
pub mod charset;
pub mod checker;
pub mod config;
pub mod convert;
pub mod dict;
pub mod error;
pub mod filter;
pub mod lang;
pub mod multi;
pub mod phonet;
pub mod reader;
pub mod readonly;
pub mod soundslike;
pub mod speller;
pub mod tokenizer;
pub mod writable;

pub use config::Config;
pub use convert::FilterChar;
pub use error::{Error, ErrorKind, Result};
pub use lang::{Lang, SensitiveCompare};
pub use speller::Speller;
