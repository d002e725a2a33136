//! Authentication (gate) and authorization (enforce) middleware.
pub mod enforce;
pub mod gate;
