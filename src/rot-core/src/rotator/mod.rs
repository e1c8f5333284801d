// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Rotator control plane: shared state, the rotctld link and fan-out.

pub mod controller;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod state;
pub mod view;
