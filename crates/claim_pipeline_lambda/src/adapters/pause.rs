use std::time::Duration;

/// Suspension point between worker status polls.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimePause;

impl Pause for RuntimePause {
    fn pause(&self, duration: Duration) {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(tokio::time::sleep(duration))
        });
    }
}
