//! Bus Runtime
//!
//! In-process event bus and service runtime shared by the bridge components.
//!
//! Every service runs on its own tokio task and handles its events one at a
//! time, so the state a service owns is only ever touched by that task.

pub mod service;

pub use service::{
    Event, EventPublisher, Service, ServiceCommand, ServiceContext, ServiceError, ServiceHandle,
    ServiceInbox, ServiceManager, ServiceResult, ServiceSpec, ServiceState,
};
