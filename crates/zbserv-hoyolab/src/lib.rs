//! HoYoLAB daily-note client.
//!
//! Implements [`zbserv_core::ResourceProvider`] against the public HoYoLAB
//! game record endpoints for Genshin Impact, Honkai: Star Rail and
//! Zenless Zone Zero.

pub mod ds;
pub mod provider;
pub mod response;

pub use ds::generate_ds;
pub use provider::{HoyolabProvider, DEFAULT_BBS_BASE, DEFAULT_ZZZ_BASE};
pub use response::parse_note;
