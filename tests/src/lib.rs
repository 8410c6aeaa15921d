//! # Relay Test Suite
//!
//! Unified test crate for the relay workspace.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs          # Recording handlers shared by all tests
//! └── integration/
//!     ├── scenarios.rs     # End-to-end publish/subscribe scenarios
//!     ├── properties.rs    # Randomized and invariant checks
//!     ├── dispatch_modes.rs  # Sequential vs parallel scheduling
//!     └── telemetry.rs     # Bus metrics export and logging macros
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p relay-tests
//!
//! # By category
//! cargo test -p relay-tests integration::properties::
//! cargo test -p relay-tests integration::dispatch_modes::
//! ```

#![allow(dead_code)]
