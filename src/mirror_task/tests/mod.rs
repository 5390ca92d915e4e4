//! Unit tests for the mirror task module.
