//! Typed HTTP client for the banter chat backend.
//!
//! A thin request/response layer: one method per endpoint, wire types, the
//! error taxonomy, and the client-side validation rules. Credentials are
//! passed explicitly per call; the client holds no session state.

pub mod api;
pub mod error;
pub mod types;
pub mod validate;

pub use {
    api::ApiClient,
    error::ApiError,
    types::{
        LoginResponse, Message, MessagePage, Profile, ProfileUpdate, RegisteredUser, UserIdentity,
    },
};
