//! Appender test suite
