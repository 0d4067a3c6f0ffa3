//! Role types for conversation participants.

use serde::{Deserialize, Serialize};

/// Author of a message sent to a provider.
///
/// # Examples
///
/// ```
/// use atelier_core::Role;
///
/// assert_ne!(Role::User, Role::Assistant);
/// assert_eq!(format!("{}", Role::System), "System");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum Role {
    /// System instructions
    System,
    /// Turns written on behalf of the person requesting the artwork
    User,
    /// Turns produced by the model
    Assistant,
}
