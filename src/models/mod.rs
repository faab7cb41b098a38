// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod appointment;
pub mod user;

pub use appointment::{Appointment, AppointmentRequest};
pub use user::User;
