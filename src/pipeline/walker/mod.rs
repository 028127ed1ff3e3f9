//! WellWalker: drives the monitoring portal through the per-well cycle.
//!
//! ```text
//! Idle → ListLoaded → FilterApplied → TableReady
//!        → { WellSelected → Exported → Returned } per well → Done
//! ```
//!
//! The portal is reached through the `InteractiveDocument` capability.
//! `WebDriverDocument` speaks W3C WebDriver; `ScriptedDocument` replays a
//! fixed page for tests and dry runs.

pub mod error;
pub mod types;
pub mod traits;
pub mod recovery;
pub mod walker;
pub mod webdriver;
pub mod scripted;

pub use error::{DocumentError, FailedWell, WalkError, WellFailure};
pub use types::*;
pub use traits::InteractiveDocument;
pub use recovery::{Recovery, RecoveryChain};
pub use walker::WellWalker;
pub use webdriver::{Locator, WebDriverDocument};
pub use scripted::{ScriptedDocument, ScriptedRow};
