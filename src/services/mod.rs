pub mod consumer;
pub mod dispatch;
pub mod encryption;
pub mod job_store;
pub mod poller;
pub mod queue;
pub mod segmind;
pub mod worker;
