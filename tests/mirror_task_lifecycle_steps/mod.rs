//! Step definitions for mirror task lifecycle scenarios.

mod when;
