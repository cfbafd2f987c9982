//! Unit tests for the analysis pipeline
//!
//! This module contains tests for the components of the crate, with
//! scripted agents and transports in `support`.

pub mod support;

pub mod transport_mock_tests;
