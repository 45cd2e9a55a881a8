//! Tools and a client library for the Wavin AHC-9000 floor heating controller.
//!
//! The controller speaks a Modbus-like protocol over RS-485 with two custom function codes, one
//! to read and one to write registers addressed by category, index and page. [`connection`]
//! carries transactions over a [`connection::Transport`] and [`categories`] gives the registers
//! their meaning.

pub mod categories;
pub mod commands;
pub mod connection;
pub mod crc;
pub mod modbus;
pub mod output;
pub mod registers;
