//! Unit tests for the Airsense core
//!
//! Cross-module tests for the pagination engine and the session store.
