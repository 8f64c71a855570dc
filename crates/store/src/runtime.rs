use crate::consts::{ERR_NS, XML_URI};
use crate::model::QName;
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Canonicalized set of error codes this crate currently emits.
/// This is intentionally small and will be expanded alongside feature coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Generic error (also used for cooperative aborts)
    FOER0000,
    FORG0001, // invalid lexical form / casting failure
    XPTY0004, // type error (incomparable operands)
    SERE0001, // serialization failure
    // Update errors
    XUTY0004, // attribute node misplaced in an insertion sequence
    XUTY0005, // insertion target must be an element (or document)
    XUTY0006, // insert before/after target has no parent
    XUTY0012, // rename target is not an element, attribute or PI
    XUDY0015, // node renamed more than once in one batch
    XUDY0024, // conflicting namespace binding
    // Fallback / unknown (kept last)
    Unknown,
}

impl ErrorCode {
    /// Returns the QName for this code in the xqt-errors namespace.
    pub fn qname(&self) -> QName {
        let local = match self {
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::SERE0001 => "SERE0001",
            ErrorCode::XUTY0004 => "XUTY0004",
            ErrorCode::XUTY0005 => "XUTY0005",
            ErrorCode::XUTY0006 => "XUTY0006",
            ErrorCode::XUTY0012 => "XUTY0012",
            ErrorCode::XUDY0015 => "XUDY0015",
            ErrorCode::XUDY0024 => "XUDY0024",
            ErrorCode::Unknown => "UNKNOWN",
        };
        QName::with_uri(local, ERR_NS)
    }

    pub fn from_local(local: &str) -> Self {
        use ErrorCode::*;
        match local {
            "FOER0000" => FOER0000,
            "FORG0001" => FORG0001,
            "XPTY0004" => XPTY0004,
            "SERE0001" => SERE0001,
            "XUTY0004" => XUTY0004,
            "XUTY0005" => XUTY0005,
            "XUTY0006" => XUTY0006,
            "XUTY0012" => XUTY0012,
            "XUDY0015" => XUDY0015,
            "XUDY0024" => XUDY0024,
            _ => Unknown,
        }
    }
}

/// Position of the originating expression in the query source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: QName,
    pub message: String,
    pub location: Option<SourcePos>,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>, // optional chained cause
}

impl Error {
    pub fn new_qname(code: QName, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            location: None,
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    /// Attach the source position of the expression that raised the error.
    pub fn at(mut self, location: SourcePos) -> Self {
        self.location = Some(location);
        self
    }

    /// Compose an error with a source cause.
    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    /// Only ERR_NS codes map to the enum; others are Unknown.
    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_local(&self.code.local)
        } else {
            ErrorCode::Unknown
        }
    }

    /// Format the code as a human-readable string (err:LOCAL or Q{ns}local).
    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else if let Some(ns) = &self.code.ns_uri {
            format!("Q{{{}}}{}", ns, self.code.local)
        } else {
            self.code.local.clone()
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(e: fmt::Error) -> Self {
        Error::from_code(ErrorCode::SERE0001, "serialization output failure")
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())?;
        if let Some(loc) = self.location {
            write!(f, " at line {}, column {}", loc.line, loc.column)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

/// Shared evaluation context: in-scope namespace bindings and the cooperative
/// abort flag. Constructed once per document/session and passed by reference;
/// there is no process-wide state behind it.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub namespaces: NamespaceBindings,
    abort: Arc<AtomicBool>,
}

impl Default for QueryContext {
    fn default() -> Self {
        let mut ns = NamespaceBindings::default();
        // Implicit xml binding (cannot be overridden per spec)
        ns.by_prefix.insert("xml".to_string(), XML_URI.to_string());
        Self {
            namespaces: ns,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.namespaces.by_prefix.get(prefix).map(String::as_str)
    }

    /// Handle that lets another component request cancellation of a running
    /// navigation or serialization pass.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(Arc::clone(&self.abort))
    }

    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Checked once per emitted node at loop boundaries; cancellation is
    /// cooperative, not preemptive.
    pub fn check_abort(&self) -> Result<(), Error> {
        if self.aborted() {
            Err(Error::from_code(ErrorCode::FOER0000, "operation aborted"))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Builder for `QueryContext`: explicit namespace registrations while
/// preserving the required implicit bindings.
pub struct QueryContextBuilder {
    ctx: QueryContext,
}

impl Default for QueryContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: QueryContext::default(),
        }
    }

    /// Register a namespace prefix → URI mapping. Attempts to override the
    /// reserved `xml` prefix are ignored to keep spec conformance.
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let p = prefix.into();
        if p == "xml" {
            return self;
        }
        self.ctx.namespaces.by_prefix.insert(p, uri.into());
        self
    }

    pub fn build(self) -> QueryContext {
        self.ctx
    }
}
