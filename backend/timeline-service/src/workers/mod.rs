pub mod fanout;

pub use fanout::{channel, EventBus, FanoutDispatcher, FanoutPool};
