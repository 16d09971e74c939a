//! Outbound email: account invitations and password-reset links.

pub mod email;
