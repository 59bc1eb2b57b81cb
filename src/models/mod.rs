// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod agent;
pub mod favorite;
pub mod profile;
pub mod property;
pub mod user;

pub use agent::{Agent, AgentContactUpdate, NewAgent};
pub use favorite::{Favorite, NewFavorite};
pub use profile::Profile;
pub use property::{Property, PropertyQuery, PropertyStatus, SearchFilters};
pub use user::{AuthUser, NewUserRow, Session, UserRow, UserType};
