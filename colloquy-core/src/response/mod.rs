//! Response reduction into conversation state

mod reducer;

pub use reducer::{commit_streamed_turn, reduce_response, FINISH_REASON_LENGTH};
