// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (JWT auth). The router in `router.rs`
// applies the JWT middleware to every protected route.

pub mod protected; // JWT authentication required (/api/*)
pub mod public; // No authentication required (/, /health, /api/auth/login, /api/auth/register/*)
