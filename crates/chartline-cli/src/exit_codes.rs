//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: u8 = 1;

/// Validation error - the charts configuration is malformed or incomplete
pub const VALIDATION_ERROR: u8 = 2;

/// Template error - configuration expansion or chart rendering failed
pub const TEMPLATE_ERROR: u8 = 3;

/// Resolution error - a chart could not be located, selected or fetched
pub const RESOLUTION_ERROR: u8 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: u8 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: u8 = 64;
