//! Database error types.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for categorizing errors.
///
/// Codes are grouped by range; the high byte names the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,
    /// Invalid configuration.
    InvalidConfig = 0x0006,

    // I/O errors (0x0100 - 0x01FF)
    /// General I/O error.
    Io = 0x0100,
    /// Data corruption detected.
    Corruption = 0x0104,
    /// Page id beyond the end of a file.
    PageOutOfBounds = 0x0105,
    /// Record does not fit in an empty page.
    RecordTooLarge = 0x0106,

    // Catalog errors (0x0200 - 0x02FF)
    /// Table not found.
    TableNotFound = 0x0200,
    /// Table already exists.
    TableExists = 0x0201,
    /// Attribute not found.
    AttributeNotFound = 0x0202,
    /// Bare attribute name matches several attributes.
    AmbiguousAttribute = 0x0203,
    /// No index registered for an attribute.
    IndexNotFound = 0x0204,
    /// Catalog file could not be decoded or encoded.
    CatalogFormat = 0x0205,

    // Type errors (0x0300 - 0x03FF)
    /// Attribute type cannot be indexed.
    UnsupportedIndex = 0x0300,
    /// Type mismatch.
    TypeMismatch = 0x0301,

    // Query errors (0x0600 - 0x06FF)
    /// SQL syntax error.
    SyntaxError = 0x0600,
    /// SQL feature not supported.
    Unsupported = 0x0601,
    /// Join graph is disconnected.
    MissingJoinPredicate = 0x0604,
    /// Too many tables for join enumeration.
    TooManyTables = 0x0605,
    /// Query execution failed.
    ExecutionFailed = 0x0606,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "I/O",
            0x02 => "Catalog",
            0x03 => "Type",
            0x06 => "Query",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The main error type for Quarry.
///
/// # Example
///
/// ```rust
/// use quarry_common::error::{QuarryError, QuarryResult};
///
/// fn lookup(table: &str) -> QuarryResult<()> {
///     Err(QuarryError::TableNotFound { table: table.to_string() })
/// }
///
/// assert_eq!(lookup("t").unwrap_err().to_string(), "table t not found");
/// ```
#[derive(Debug, Error)]
pub enum QuarryError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Data corruption detected.
    #[error("data corruption detected: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// A page id beyond the end of a heap or index file.
    #[error("page {page_id} out of bounds, file has {page_count} pages")]
    PageOutOfBounds {
        /// Requested page.
        page_id: i64,
        /// Pages in the file.
        page_count: u64,
    },

    /// A record larger than an empty page.
    #[error("record of {size} bytes does not fit in a page of {capacity} bytes")]
    RecordTooLarge {
        /// Encoded record size.
        size: usize,
        /// Usable page capacity.
        capacity: usize,
    },

    // ==========================================================================
    // Catalog Errors
    // ==========================================================================
    /// Table not found.
    #[error("table {table} not found")]
    TableNotFound {
        /// The missing table.
        table: String,
    },

    /// Table already exists.
    #[error("table {table} already exists")]
    TableExists {
        /// The existing table.
        table: String,
    },

    /// Attribute not found.
    #[error("attribute {name} not found")]
    AttributeNotFound {
        /// The missing attribute, as written.
        name: String,
    },

    /// Bare attribute name matching more than one attribute.
    #[error("attribute {name} is ambiguous")]
    AmbiguousAttribute {
        /// The ambiguous name.
        name: String,
    },

    /// No index on the attribute.
    #[error("no index on {table}.{attribute}")]
    IndexNotFound {
        /// Table name.
        table: String,
        /// Attribute name.
        attribute: String,
    },

    /// Catalog file could not be read or written.
    #[error("catalog {path}: {message}", path = .path.display())]
    CatalogFormat {
        /// Catalog file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Type Errors
    // ==========================================================================
    /// Index requested on a non-integer attribute.
    #[error("cannot index {table}.{attribute}: only INTEGER attributes are indexable, found {data_type}")]
    UnsupportedIndex {
        /// Table name.
        table: String,
        /// Attribute name.
        attribute: String,
        /// Declared type of the attribute.
        data_type: String,
    },

    /// Type mismatch.
    #[error("type mismatch: {message}")]
    TypeMismatch {
        /// Error message.
        message: String,
    },

    // ==========================================================================
    // Query Errors
    // ==========================================================================
    /// SQL syntax error.
    #[error("syntax error: {message}")]
    Syntax {
        /// Error message.
        message: String,
    },

    /// Unsupported SQL feature.
    #[error("unsupported: {feature}")]
    Unsupported {
        /// The unsupported feature.
        feature: String,
    },

    /// No join predicate connects the listed tables.
    #[error("missing join predicate: no join path connects tables {}", .tables.join(", "))]
    MissingJoinPredicate {
        /// Tables in the query.
        tables: Vec<String>,
    },

    /// More tables than the join-order optimizer enumerates.
    #[error("query joins {count} tables, at most {max} are supported")]
    TooManyTables {
        /// Tables in the query.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// Query execution failed.
    #[error("execution failed: {message}")]
    Execution {
        /// Error message.
        message: String,
    },
}

impl QuarryError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::Io { .. } => ErrorCode::Io,
            Self::Corruption { .. } => ErrorCode::Corruption,
            Self::PageOutOfBounds { .. } => ErrorCode::PageOutOfBounds,
            Self::RecordTooLarge { .. } => ErrorCode::RecordTooLarge,
            Self::TableNotFound { .. } => ErrorCode::TableNotFound,
            Self::TableExists { .. } => ErrorCode::TableExists,
            Self::AttributeNotFound { .. } => ErrorCode::AttributeNotFound,
            Self::AmbiguousAttribute { .. } => ErrorCode::AmbiguousAttribute,
            Self::IndexNotFound { .. } => ErrorCode::IndexNotFound,
            Self::CatalogFormat { .. } => ErrorCode::CatalogFormat,
            Self::UnsupportedIndex { .. } => ErrorCode::UnsupportedIndex,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::Syntax { .. } => ErrorCode::SyntaxError,
            Self::Unsupported { .. } => ErrorCode::Unsupported,
            Self::MissingJoinPredicate { .. } => ErrorCode::MissingJoinPredicate,
            Self::TooManyTables { .. } => ErrorCode::TooManyTables,
            Self::Execution { .. } => ErrorCode::ExecutionFailed,
        }
    }

    /// Returns true for errors raised while resolving names against the
    /// catalog.
    #[must_use]
    pub const fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::TableNotFound { .. }
                | Self::AttributeNotFound { .. }
                | Self::AmbiguousAttribute { .. }
                | Self::IndexNotFound { .. }
        )
    }

    /// Returns true for errors raised by the planner rather than by storage.
    #[must_use]
    pub const fn is_planning(&self) -> bool {
        matches!(
            self,
            Self::MissingJoinPredicate { .. } | Self::TooManyTables { .. }
        )
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    #[must_use]
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    /// Creates an execution error.
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Creates an attribute-not-found error.
    #[must_use]
    pub fn attribute_not_found(name: impl Into<String>) -> Self {
        Self::AttributeNotFound { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = QuarryError::TableNotFound {
            table: "lineitem".to_string(),
        };
        assert_eq!(err.code(), ErrorCode::TableNotFound);
        assert_eq!(err.code().category(), "Catalog");
        assert!(err.is_resolution());
    }

    #[test]
    fn test_error_display() {
        let err = QuarryError::PageOutOfBounds {
            page_id: 12,
            page_count: 4,
        };
        assert_eq!(err.to_string(), "page 12 out of bounds, file has 4 pages");

        let err = QuarryError::MissingJoinPredicate {
            tables: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "missing join predicate: no join path connects tables a, b"
        );
    }

    #[test]
    fn test_unsupported_index_display() {
        let err = QuarryError::UnsupportedIndex {
            table: "t".to_string(),
            attribute: "name".to_string(),
            data_type: "STRING".to_string(),
        };
        assert!(err.to_string().contains("only INTEGER"));
        assert_eq!(err.code().category(), "Type");
    }

    #[test]
    fn test_planning() {
        let err = QuarryError::TooManyTables { count: 11, max: 10 };
        assert!(err.is_planning());
        assert!(!QuarryError::internal("x").is_planning());
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuarryError = io_err.into();
        assert_eq!(err.code(), ErrorCode::Io);
        assert_eq!(err.code().category(), "I/O");
    }
}
