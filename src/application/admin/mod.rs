//! Application services for the administrative surface.

pub mod rollouts;
pub mod toggles;

pub use rollouts::AdminRolloutService;
pub use toggles::AdminToggleService;
