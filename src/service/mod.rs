mod event_service;
mod organization_service;

pub use event_service::EventService;
pub use organization_service::OrganizationService;
