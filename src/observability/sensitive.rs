use std::fmt::{self, Debug, Formatter};

/// Secret held by a data source, e.g. a JDBC password.
///
/// Formats as `[REDACTED]` so it never reaches a log line or error message;
/// only the driver sees it, through [`Sensitive::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct Sensitive<T>(T);

impl<T> Sensitive<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> Debug for Sensitive<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Masks the `user:password@` part of a connection URL for logging.
///
/// `jdbc:postgresql://app:secret@pg/db` becomes `jdbc:postgresql://***@pg/db`.
/// URLs without credentials are returned unchanged.
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let authority_end = url[authority_start..]
        .find(|c: char| c == '/' || c == ';' || c == '?')
        .map(|i| authority_start + i)
        .unwrap_or(url.len());

    match url[authority_start..authority_end].rfind('@') {
        Some(at) => format!(
            "{}***{}",
            &url[..authority_start],
            &url[authority_start + at..]
        ),
        None => url.to_string(),
    }
}
