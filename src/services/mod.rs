// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod agents;
pub mod favorites;
pub mod listings;
pub mod profile;
pub mod registration;
pub mod role_sync;
pub mod session;

pub use agents::{AgentService, ContactDetails};
pub use favorites::FavoriteService;
pub use listings::{ListingService, PropertyDetail};
pub use registration::{RegistrationError, RegistrationForm};
pub use role_sync::{RoleSyncError, RoleSyncPolicy};
pub use session::{
    Navigation, SessionHandle, SessionManager, SessionSettings, SessionState, SignUpRequest,
};
