/// Runtime configuration for an exposed Thing.
///
/// Controls per-property write queues and change publication policy.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bounded queue capacity of each property's serial writer. A write
    /// issued while the queue is full fails with `Overloaded`.
    pub write_queue_capacity: usize,
    /// Publish a property change even when the default update handler stores
    /// a value equal to the previous one.
    pub publish_unchanged_values: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            write_queue_capacity: 256,
            publish_unchanged_values: true,
        }
    }
}
