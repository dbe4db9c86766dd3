//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives full provisioning sessions
//! against mock adapters on virtual time.  All tests run on the host with
//! no radio required.

mod mock_hw;
mod session_recovery_tests;
