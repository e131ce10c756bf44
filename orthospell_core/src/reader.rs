/// Line-oriented access to data files. The engine never touches the
/// filesystem itself; dictionaries, charsets and rule files all come
/// in through these traits.
use crate::error::{Error, ErrorKind, Result};

/// The text data files are read with such a trait.
pub trait LineReader {
    fn get_name(&self) -> String;
    /// One raw line including the trailing LF, or None at end of input.
    fn read_line(&mut self) -> Option<Vec<u8>>;
}

impl std::fmt::Debug for dyn LineReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineReader").field("name", &self.get_name()).finish()
    }
}

/// Opens named data files (`en.dat`, `iso-8859-1.cset`, word lists).
/// The std crate implements this over search directories; tests use
/// [`MapDataSource`].
pub trait DataSource {
    fn open(&self, name: &str) -> Result<Box<dyn LineReader>>;
    fn exists(&self, name: &str) -> bool;
}

/// A reader over an in-memory byte buffer.
pub struct VecLineReader {
    vlr_name: String,
    vlr_data: Vec<u8>,
    vlr_pos: usize,
}

impl VecLineReader {
    pub fn new(name: &str, data: Vec<u8>) -> VecLineReader {
        VecLineReader {
            vlr_name: name.to_string(),
            vlr_data: data,
            vlr_pos: 0,
        }
    }

    pub fn from_str(name: &str, text: &str) -> VecLineReader {
        VecLineReader::new(name, text.as_bytes().to_vec())
    }
}

impl LineReader for VecLineReader {
    fn get_name(&self) -> String {
        self.vlr_name.clone()
    }

    fn read_line(&mut self) -> Option<Vec<u8>> {
        if self.vlr_pos >= self.vlr_data.len() {
            return None;
        }
        let start = self.vlr_pos;
        let mut end = self.vlr_pos;
        while end < self.vlr_data.len() && self.vlr_data[end] != b'\n' {
            end += 1;
        }
        if end < self.vlr_data.len() {
            end += 1; // include the LF
        }
        self.vlr_pos = end;
        Some(self.vlr_data[start..end].to_vec())
    }
}

/// A data source over an in-memory name-to-content map, for tests.
pub struct MapDataSource {
    mds_files: hashbrown::HashMap<String, Vec<u8>>,
}

impl MapDataSource {
    pub fn new() -> MapDataSource {
        MapDataSource {
            mds_files: hashbrown::HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, content: &str) {
        self.mds_files
            .insert(name.to_string(), content.as_bytes().to_vec());
    }
}

impl DataSource for MapDataSource {
    fn open(&self, name: &str) -> Result<Box<dyn LineReader>> {
        match self.mds_files.get(name) {
            Some(data) => Ok(Box::new(VecLineReader::new(name, data.clone()))),
            None => Err(Error::new(
                ErrorKind::CantReadFile,
                format!("The file \"{}\" can not be opened for reading.", name),
            )),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.mds_files.contains_key(name)
    }
}

/// One cleaned-up line of a data file. The text is the raw bytes
/// mapped one-to-one into chars (latin-1 view), so no byte value is
/// lost; values that need the data encoding applied are recovered
/// with [`line_bytes`].
pub struct DataLine {
    pub dtl_line_no: u32,
    pub dtl_text: String,
}

impl DataLine {
    /// First whitespace separated token and the rest of the line.
    pub fn split_pair(&self) -> (&str, &str) {
        split_pair_str(&self.dtl_text)
    }
}

pub fn split_pair_str(text: &str) -> (&str, &str) {
    let trimmed = text.trim();
    match trimmed.find(|c: char| c == ' ' || c == '\t') {
        Some(ix) => (&trimmed[..ix], trimmed[ix..].trim_start()),
        None => (trimmed, ""),
    }
}

/// Recover the raw bytes of a latin-1 view produced by [`DataLines`].
pub fn line_bytes(text: &str) -> Vec<u8> {
    text.chars().map(|c| (c as u32) as u8).collect()
}

/// Iterates the non-empty, non-comment lines of a data file.
/// Strips the UTF-8 BOM on the first line, CR/LF endings, and
/// whole-line `#` comments.
pub struct DataLines<'a> {
    dls_reader: &'a mut dyn LineReader,
    dls_line_no: u32,
}

impl<'a> DataLines<'a> {
    pub fn new(reader: &'a mut dyn LineReader) -> DataLines<'a> {
        DataLines {
            dls_reader: reader,
            dls_line_no: 0,
        }
    }

    pub fn line_no(&self) -> u32 {
        self.dls_line_no
    }

    pub fn name(&self) -> String {
        self.dls_reader.get_name()
    }

    /// Next meaningful line, or None at end of file.
    pub fn next_line(&mut self) -> Option<DataLine> {
        loop {
            let mut line_buf = self.dls_reader.read_line()?;
            if line_buf.is_empty() {
                return None;
            }
            self.dls_line_no += 1;
            if self.dls_line_no == 1 && line_buf.starts_with(&[0xef, 0xbb, 0xbf]) {
                line_buf.splice(0..3, []);
            }
            while line_buf.ends_with(&[b'\n']) || line_buf.ends_with(&[b'\r']) {
                line_buf.pop();
            }
            // a line whose first non-blank byte is '#' is a comment
            let first = line_buf.iter().position(|b| *b != b' ' && *b != b'\t');
            match first {
                None => continue,
                Some(ix) if line_buf[ix] == b'#' => continue,
                Some(_) => {}
            }
            let text: String = line_buf.iter().map(|b| *b as char).collect();
            return Some(DataLine {
                dtl_line_no: self.dls_line_no,
                dtl_text: text,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_skip_comments_and_blanks() {
        let mut reader =
            VecLineReader::from_str("t.dat", "# header\n\nname english\n  # indented\ncharset x\n");
        let mut lines = DataLines::new(&mut reader);
        let l1 = lines.next_line().unwrap();
        assert_eq!(l1.dtl_text, "name english");
        assert_eq!(l1.dtl_line_no, 3);
        let (key, value) = l1.split_pair();
        assert_eq!(key, "name");
        assert_eq!(value, "english");
        let l2 = lines.next_line().unwrap();
        assert_eq!(l2.dtl_text, "charset x");
        assert!(lines.next_line().is_none());
    }

    #[test]
    fn latin1_view_round_trips_bytes() {
        let mut reader = VecLineReader::new("t", vec![b'a', 0xE9, b'\n']);
        let mut lines = DataLines::new(&mut reader);
        let line = lines.next_line().unwrap();
        assert_eq!(line_bytes(&line.dtl_text), vec![b'a', 0xE9]);
    }

    #[test]
    fn map_source_reports_missing_file() {
        let src = MapDataSource::new();
        let err = src.open("missing.dat").unwrap_err();
        assert!(err.is_a(crate::error::ErrorKind::FileError));
    }
}
