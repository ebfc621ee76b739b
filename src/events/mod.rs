pub mod streams;
pub use streams::{EventStream, Subscriber};

/// Default identity event channel capacity
pub const IDENTITY_EVENT_CAPACITY: usize = 16;
