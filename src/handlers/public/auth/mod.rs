// handlers/public/auth/mod.rs - Public authentication handlers

pub mod login; // POST /api/auth/login - authenticate and get JWT
pub mod register; // POST /api/auth/register/{request,verify} - code-verified sign-up

pub use login::login;
pub use register::{register_request, register_verify};
