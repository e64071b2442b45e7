pub(crate) mod conf;
pub(crate) mod error;
pub(crate) mod executor;
pub(crate) mod metrics;
pub(crate) mod model;
pub(crate) mod observer;
pub(crate) mod queue;
pub(crate) mod resolver;
pub(crate) mod scheduler;
pub(crate) mod session;

#[cfg(test)]
mod test_util;
