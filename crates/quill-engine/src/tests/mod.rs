//! Tests for the quill-engine crate.
