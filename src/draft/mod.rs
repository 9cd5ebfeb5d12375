//! Captain draft
//!
//! Two captains alternate picks (1, 2, 2) from a pool of four over private
//! messages; the last player goes to captain one.

pub mod reply;
pub mod state;

pub use reply::{format_pool, parse_pick_reply, PickReplyError};
pub use state::{CaptainDraftState, CaptainSlot, PickResult, PICK_ORDER, POOL_SIZE};
