//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each submodule runs a real `Board` against a simulated board
//! firmware (`sim_board`), either in-process or over TCP.

mod begin_tests;
mod command_tests;
mod sim_board;
mod tcp_tests;
