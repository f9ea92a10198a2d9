mod channel;
mod render;

pub use channel::ChannelDescriptor;
pub use render::{FeedLinks, format_duration, render_feed};
