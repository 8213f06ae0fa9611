#![no_std]

// Shared logic for the free-fall impact controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware, sensing, and modelling collaborators are
// reached through the capability traits in `capabilities`, so the same state
// machine runs on the STM32 target, in the emulator, and under test fakes.

pub mod capabilities;
pub mod config;
pub mod controller;
pub mod mode;
pub mod models;
pub mod telemetry;
pub mod time;
