//! Coin flip decision tool: the flip state machine, the coin display, the
//! flip history view and the gateways they talk to.

pub mod auth;
pub mod backend;
pub mod coin;
pub mod controller;
pub mod draw;
pub mod history;
pub mod notice;
pub mod record;
pub mod session;
pub mod store;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use controller::{
    FlipController,
    FlipError,
    FlipState,
};
pub use history::{
    HistoryError,
    HistoryView,
};
pub use record::{
    FlipRecord,
    Side,
};
pub use session::{
    AuthedUser,
    Session,
    SessionContext,
};
