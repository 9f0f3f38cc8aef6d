//! Driver failure classification
//!
//! Db2 reports a dropped connection as SQL30081N ("A communication error has
//! been detected"). That is the only signature that invalidates a session;
//! every other failure leaves the connection state untouched. Rejected
//! credentials (SQL30082N) and an unknown database (SQL1013N) can never
//! succeed as configured and are reported as such.

use crate::error::ErrorKind;

/// Db2 SQLCODE for a communication failure
pub const DISCONNECT_CODE: i32 = 30081;

/// SQLCODE for rejected credentials
pub const AUTH_FAILED_CODE: i32 = 30082;

/// SQLCODE for a database alias or name that does not exist
pub const UNKNOWN_DATABASE_CODE: i32 = 1013;

/// Classify a native driver error code (Db2 reports SQLCODEs negated)
pub fn classify_native(native_error: i32) -> ErrorKind {
    match native_error.abs() {
        DISCONNECT_CODE => ErrorKind::Transient,
        AUTH_FAILED_CODE | UNKNOWN_DATABASE_CODE => ErrorKind::ConfigurationInvalid,
        _ => ErrorKind::Fatal,
    }
}

/// Classify from error text, for drivers that only surface a message
pub fn classify_message(message: &str) -> ErrorKind {
    if message.contains("30081") {
        ErrorKind::Transient
    } else if message.contains("SQL30082N") || message.contains("SQL1013N") {
        ErrorKind::ConfigurationInvalid
    } else {
        ErrorKind::Fatal
    }
}
