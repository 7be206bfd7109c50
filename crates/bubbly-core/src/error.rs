use std::sync::Arc;

/// An error that can occur in Bubbly.
///
/// Errors are cheap to clone and carry a stable, client-visible
/// [`ErrorKind`] plus a human-readable detail message.
#[derive(Clone)]
pub struct Error {
    inner: Arc<ErrorInner>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    detail: String,
}

/// The stable set of error classes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed schema description: cycles, duplicate names, unknown join
    /// targets, reserved column names.
    SchemaInvalid,
    /// A schema change that would drop or retype an existing column or table.
    SchemaEvolutionUnsafe,
    /// A data value cannot be coerced to the declared field type.
    TypeMismatch,
    /// A data block references a parent row that does not exist.
    UnresolvedParent,
    /// Concurrent inserts collided on the same natural key.
    UniqueViolation,
    /// A query references a field that is not declared.
    UnknownField,
    /// A query or data block references a table that is not declared.
    UnknownTable,
    /// Transport or I/O failure talking to the relational store.
    StoreUnavailable,
    /// The operation's cancellation token fired.
    Canceled,
    /// The operation's deadline passed.
    DeadlineExceeded,
    /// Invariant violation; opaque to clients.
    Internal,
}

impl Error {
    fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ErrorInner {
                kind,
                detail: detail.into(),
            }),
        }
    }

    /// The error's classification.
    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn schema_invalid(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaInvalid, detail)
    }

    pub fn schema_evolution_unsafe(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaEvolutionUnsafe, detail)
    }

    pub fn type_mismatch(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, detail)
    }

    pub fn unresolved_parent(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedParent, detail)
    }

    pub fn unique_violation(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UniqueViolation, detail)
    }

    pub fn unknown_field(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownField, detail)
    }

    pub fn unknown_table(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownTable, detail)
    }

    pub fn store_unavailable(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::StoreUnavailable, detail)
    }

    pub fn canceled() -> Self {
        Self::new(ErrorKind::Canceled, "")
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(ErrorKind::DeadlineExceeded, "")
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, detail)
    }
}

impl ErrorKind {
    fn phrase(self) -> &'static str {
        use ErrorKind::*;

        match self {
            SchemaInvalid => "invalid schema",
            SchemaEvolutionUnsafe => "unsafe schema evolution",
            TypeMismatch => "type mismatch",
            UnresolvedParent => "unresolved parent",
            UniqueViolation => "unique constraint violation",
            UnknownField => "unknown field",
            UnknownTable => "unknown table",
            StoreUnavailable => "store unavailable",
            Canceled => "operation canceled",
            DeadlineExceeded => "deadline exceeded",
            Internal => "internal error",
        }
    }
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.inner.kind.phrase())?;
        if !self.inner.detail.is_empty() {
            write!(f, ": {}", self.inner.detail)?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            f.debug_struct("Error")
                .field("kind", &self.inner.kind)
                .field("detail", &self.inner.detail)
                .finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size() {
        // Ensure Error stays at one word (size of pointer/Arc)
        let expected_size = core::mem::size_of::<usize>();
        assert_eq!(expected_size, core::mem::size_of::<Error>());
    }

    #[test]
    fn schema_invalid_display() {
        let err = Error::schema_invalid("duplicate table `zoo`");
        assert_eq!(err.to_string(), "invalid schema: duplicate table `zoo`");
        assert_eq!(err.kind(), ErrorKind::SchemaInvalid);
    }

    #[test]
    fn type_mismatch_display() {
        let err = Error::type_mismatch("table `zoo` field `Open`: cannot coerce \"yes\" to Bool");
        assert_eq!(
            err.to_string(),
            "type mismatch: table `zoo` field `Open`: cannot coerce \"yes\" to Bool"
        );
    }

    #[test]
    fn canceled_has_no_detail() {
        assert_eq!(Error::canceled().to_string(), "operation canceled");
        assert_eq!(
            Error::deadline_exceeded().to_string(),
            "deadline exceeded"
        );
    }
}
