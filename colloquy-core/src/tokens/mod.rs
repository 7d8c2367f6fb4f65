//! Local token estimation
//!
//! Estimates are an approximation used to keep the conversation inside its
//! budget between exchanges. Whenever the remote service reports usage, that
//! count replaces the running estimate outright.

mod heuristic;

pub use heuristic::HeuristicEstimator;

use crate::protocol::{ContentPart, ImageDetail, Message, MessageContent};
use std::fmt;

/// Fixed cost of a low-detail image part
pub const LOW_DETAIL_IMAGE_TOKENS: usize = 65;

/// Fixed cost of a high-detail image part
pub const HIGH_DETAIL_IMAGE_TOKENS: usize = 260;

/// Strategy for estimating the request cost of message content
pub trait TokenEstimator: Send + Sync + fmt::Debug {
    /// Estimate the cost of a text fragment
    fn estimate_text(&self, text: &str) -> usize;

    /// Estimate the cost of an image part; independent of actual dimensions
    fn estimate_image(&self, detail: ImageDetail) -> usize {
        match detail {
            ImageDetail::Low => LOW_DETAIL_IMAGE_TOKENS,
            ImageDetail::High => HIGH_DETAIL_IMAGE_TOKENS,
        }
    }

    /// Estimate the cost of a content unit (sum over parts)
    fn estimate_content(&self, content: &MessageContent) -> usize {
        match content {
            MessageContent::Text(text) => self.estimate_text(text),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => self.estimate_text(text),
                    ContentPart::ImageUrl { image_url } => self.estimate_image(image_url.detail),
                })
                .sum(),
        }
    }

    /// Estimate the cost of a message; only its content is counted
    fn estimate_message(&self, message: &Message) -> usize {
        self.estimate_content(&message.content)
    }
}

/// Estimate content cost with the default heuristic
pub fn estimate_tokens(content: &MessageContent) -> usize {
    HeuristicEstimator.estimate_content(content)
}
