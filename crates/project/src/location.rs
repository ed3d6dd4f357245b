use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Canonical location of an open document.
/// 已開啟文件的標準位置。
///
/// Identifiers with an explicit scheme (`file:///nb.ipynb`, `untitled:Untitled-1`)
/// are kept as URLs; anything else is treated as a plain path and round-trips
/// to the exact text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentLocation {
    Url(Url),
    Path(PathBuf),
}

/// Reasons a stored identifier cannot be turned back into a location.
/// 無法還原為文件位置的原因。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("document identifier is empty")]
    Empty,
    #[error("document identifier contains control characters: {0:?}")]
    ControlCharacter(String),
    #[error("invalid document URI {input:?}: {source}")]
    InvalidUri {
        input: String,
        #[source]
        source: url::ParseError,
    },
}

impl DocumentLocation {
    /// Parses an identifier previously produced by [`DocumentLocation::to_string`].
    /// 解析先前序列化的文件識別字串。
    pub fn parse(text: &str) -> Result<Self, LocationError> {
        if text.trim().is_empty() {
            return Err(LocationError::Empty);
        }
        if text.chars().any(char::is_control) {
            return Err(LocationError::ControlCharacter(text.to_string()));
        }
        if has_uri_scheme(text) {
            return Url::parse(text)
                .map(DocumentLocation::Url)
                .map_err(|source| LocationError::InvalidUri {
                    input: text.to_string(),
                    source,
                });
        }
        Ok(DocumentLocation::Path(PathBuf::from(text)))
    }

    /// Local filesystem path, when the location has one. Non-`file` URLs have none.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        match self {
            DocumentLocation::Url(url) if url.scheme() == "file" => url.to_file_path().ok(),
            DocumentLocation::Url(_) => None,
            DocumentLocation::Path(path) => Some(path.clone()),
        }
    }
}

impl fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentLocation::Url(url) => f.write_str(url.as_str()),
            DocumentLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Single-letter schemes are Windows drive letters (`C:\nb.ipynb`), not URIs.
fn has_uri_scheme(text: &str) -> bool {
    let Some((scheme, _)) = text.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && scheme.len() >= 2
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
