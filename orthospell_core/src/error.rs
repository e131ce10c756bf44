/// Error kinds and the tagged error carried by every fallible operation.
use thiserror::Error;

/// Tag identifying what went wrong. Kinds form a hierarchy through
/// [`ErrorKind::parent`]; `CantReadFile` is-a `FileError` and so on,
/// so callers can match on a whole family with [`Error::is_a`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Other,
    OperationNotSupported,
    UnimplementedMethod,

    FileError,
    CantReadFile,
    CantWriteFile,
    BadFileFormat,
    MissingMagic,
    BadMagic,
    BadVersion,
    ConfusingVersion,

    ConfigError,
    UnknownKey,
    BadValue,
    NoValue,
    KeyNotString,
    KeyNotBool,
    KeyNotInt,
    KeyNotList,
    IdenticalOption,
    OptionsOnly,
    UnknownEncoding,

    FilterError,
    NoSuchFilter,
    EmptyFilter,
    ExpectModeKey,
    BadModeKey,
    UnknownMode,

    LanguageError,
    UnknownLanguage,
    MismatchedLanguage,
    NoWordlistForLang,

    InvalidWord,
    InvalidAffix,
    InapplicableAffix,
    InvalidString,
}

impl ErrorKind {
    /// The kind one level up in the hierarchy, if any.
    pub fn parent(self) -> Option<ErrorKind> {
        use ErrorKind::*;
        match self {
            UnimplementedMethod => Some(OperationNotSupported),
            CantReadFile | CantWriteFile | BadFileFormat => Some(FileError),
            MissingMagic | BadMagic | BadVersion => Some(BadFileFormat),
            ConfusingVersion => Some(BadVersion),
            UnknownKey | BadValue | NoValue | IdenticalOption | OptionsOnly => Some(ConfigError),
            KeyNotString | KeyNotBool | KeyNotInt | KeyNotList => Some(BadValue),
            UnknownEncoding => Some(ConfigError),
            NoSuchFilter | EmptyFilter | ExpectModeKey | BadModeKey | UnknownMode => {
                Some(FilterError)
            }
            UnknownLanguage | MismatchedLanguage | NoWordlistForLang => Some(LanguageError),
            InapplicableAffix => Some(InvalidAffix),
            _ => None,
        }
    }

    /// True if self is `other` or a descendant of it.
    pub fn is_a(self, other: ErrorKind) -> bool {
        let mut cur = Some(self);
        while let Some(kind) = cur {
            if kind == other {
                return true;
            }
            cur = kind.parent();
        }
        false
    }
}

/// A tagged error. The message is complete by itself; the optional
/// file name and line number are filled in where the error surfaces
/// from a data file (the original site keeps them empty).
#[derive(Debug, Clone, Error)]
#[error("{err_mesg}")]
pub struct Error {
    pub err_kind: ErrorKind,
    pub err_mesg: String,
}

impl Error {
    pub fn new(err_kind: ErrorKind, mesg: impl Into<String>) -> Error {
        Error {
            err_kind,
            err_mesg: mesg.into(),
        }
    }

    /// Decorate the message with the data file it came from.
    pub fn with_file(mut self, file_name: &str) -> Error {
        self.err_mesg = format!("{}: {}", file_name, self.err_mesg);
        self
    }

    /// Decorate with file name and line number.
    pub fn with_file_line(mut self, file_name: &str, line_no: u32) -> Error {
        self.err_mesg = format!("{}:{}: {}", file_name, line_no, self.err_mesg);
        self
    }

    pub fn is_a(&self, kind: ErrorKind) -> bool {
        self.err_kind.is_a(kind)
    }

    pub fn unimplemented(method: &str, class_name: &str) -> Error {
        Error::new(
            ErrorKind::UnimplementedMethod,
            format!("The method \"{}\" is not implemented in \"{}\".", method, class_name),
        )
    }

    pub fn cant_read_file(file_name: &str) -> Error {
        Error::new(
            ErrorKind::CantReadFile,
            format!("The file \"{}\" can not be opened for reading.", file_name),
        )
    }

    pub fn cant_write_file(file_name: &str) -> Error {
        Error::new(
            ErrorKind::CantWriteFile,
            format!("The file \"{}\" can not be opened for writing.", file_name),
        )
    }

    pub fn bad_file_format(file_name: &str, detail: &str) -> Error {
        let mesg = if detail.is_empty() {
            format!("The file \"{}\" is not in the proper format.", file_name)
        } else {
            format!(
                "The file \"{}\" is not in the proper format. {}",
                file_name, detail
            )
        };
        Error::new(ErrorKind::BadFileFormat, mesg)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_hierarchy() {
        assert!(ErrorKind::CantReadFile.is_a(ErrorKind::FileError));
        assert!(ErrorKind::BadFileFormat.is_a(ErrorKind::FileError));
        assert!(ErrorKind::UnknownEncoding.is_a(ErrorKind::ConfigError));
        assert!(ErrorKind::KeyNotBool.is_a(ErrorKind::ConfigError));
        assert!(ErrorKind::ConfusingVersion.is_a(ErrorKind::FileError));
        assert!(!ErrorKind::FileError.is_a(ErrorKind::CantReadFile));
        assert!(ErrorKind::InvalidWord.is_a(ErrorKind::InvalidWord));
    }

    #[test]
    fn file_decoration() {
        let err = Error::new(ErrorKind::BadValue, "Expected a number.")
            .with_file_line("en.dat", 12);
        assert_eq!(err.to_string(), "en.dat:12: Expected a number.");
        assert!(err.is_a(ErrorKind::ConfigError));
    }
}
