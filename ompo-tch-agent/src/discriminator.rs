//! Discriminator over `(state, action, next_state)` triples.
mod base;
mod config;
pub use base::SasDiscriminator;
pub use config::DiscriminatorConfig;
