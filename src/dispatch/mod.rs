pub mod dispatcher;
pub mod sink;

pub use dispatcher::Dispatcher;
pub use sink::{FrameCollector, FrameSink, HubSink};
