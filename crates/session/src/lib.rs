//! Session lifecycle: the persisted credential/identity pair and the auth
//! flows that mutate it.
//!
//! [`SessionStore`] owns the current session and survives restarts via a
//! single JSON document on disk. [`AuthGateway`] is its only writer.

pub mod gateway;
pub mod profile;
pub mod store;

pub use {
    gateway::{AuthGateway, AuthStatus},
    profile::ProfileService,
    store::{Session, SessionStore},
};
