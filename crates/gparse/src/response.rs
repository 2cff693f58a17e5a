/// A reply sent back to the host for a single command.
///
/// Mirrors the original firmware's thin wrapper around `"ok"` /
/// `"ok <suffix>"` strings: standardizing the prefix in one place
/// rather than formatting ad hoc at every call site.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Plain `"ok"`.
    Ok,
    /// `"ok <suffix>"`, e.g. `"ok T:22.3 B:-300.0"`.
    OkWith(String),
    /// No reply should be sent at all (used for discarded empty lines).
    Null,
}

impl Response {
    pub fn is_null(&self) -> bool {
        matches!(self, Response::Null)
    }

    /// Renders the wire form of this response, including the
    /// trailing newline, or `None` if nothing should be sent.
    pub fn to_wire(&self) -> Option<String> {
        match self {
            Response::Ok => Some("ok\n".to_string()),
            Response::OkWith(suffix) => Some(format!("ok {suffix}\n")),
            Response::Null => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_renders_plain() {
        assert_eq!(Response::Ok.to_wire().as_deref(), Some("ok\n"));
    }

    #[test]
    fn ok_with_renders_suffix() {
        assert_eq!(
            Response::OkWith("T:22.3 B:-300.0".to_string()).to_wire().as_deref(),
            Some("ok T:22.3 B:-300.0\n")
        );
    }

    #[test]
    fn null_renders_nothing() {
        assert_eq!(Response::Null.to_wire(), None);
    }
}
