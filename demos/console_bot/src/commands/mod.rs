//! Demo commands.

mod confirm;
mod ping;
mod tip;

pub use confirm::{Confirm, ConfirmSettings};
pub use ping::ping;
pub use tip::{Tip, TipSettings, TipSource, TipStore};
