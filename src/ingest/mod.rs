pub mod normalize;
pub mod poller;
pub mod reconcile;
