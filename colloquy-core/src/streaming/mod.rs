//! Streaming response support
//!
//! [`decode_stream`] turns a chunked byte body into a lazy sequence of
//! [`StreamFrame`](crate::protocol::StreamFrame)s; [`StreamAccumulator`]
//! folds those frames into the assistant message committed to the state.

mod accumulator;
mod decoder;

pub use accumulator::StreamAccumulator;
pub use decoder::{
    decode_lines, decode_stream, FrameDecoder, FrameStream, DATA_PREFIX, DONE_SENTINEL,
};
