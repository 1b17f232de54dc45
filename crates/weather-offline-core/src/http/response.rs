use bytes::Bytes;

use super::Headers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    #[default]
    Basic,
    /// Network error as seen by the page: no status, no body.
    Error,
}

/// A response snapshot. Cloning shares the body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub kind: ResponseKind,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Some(body.into()),
            kind: ResponseKind::Basic,
        }
    }

    /// The response a page observes when neither network nor cache answered.
    pub fn error() -> Self {
        Self {
            status: 0,
            headers: Headers::new(),
            body: None,
            kind: ResponseKind::Error,
        }
    }

    /// Synthesized 404 with a null body.
    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: Headers::new(),
            body: None,
            kind: ResponseKind::Basic,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_error(&self) -> bool {
        self.kind == ResponseKind::Error
    }

    /// Body as UTF-8, lossy. Empty for a null body.
    pub fn text(&self) -> String {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_responses() {
        let missing = Response::not_found();
        assert_eq!(missing.status, 404);
        assert!(missing.body.is_none());
        assert!(!missing.is_ok());
        assert!(!missing.is_error());

        let error = Response::error();
        assert_eq!(error.status, 0);
        assert!(error.is_error());
        assert_eq!(error.text(), "");
    }

    #[test]
    fn test_is_ok_range() {
        assert!(Response::new(200, "ok").is_ok());
        assert!(Response::new(204, "").is_ok());
        assert!(!Response::new(304, "").is_ok());
        assert!(!Response::new(500, "boom").is_ok());
    }
}
