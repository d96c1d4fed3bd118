//! End-to-end tests for the CAN bus crates live under `tests/`.
