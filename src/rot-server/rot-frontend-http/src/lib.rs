// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod api;
pub mod auth;
pub mod server;

pub use auth::AuthConfig;
pub use server::{spawn_frontend, FrontendContext, HttpFrontendConfig};
