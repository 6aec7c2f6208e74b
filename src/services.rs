pub mod cadence_service;
pub mod crm_service;
pub mod mass_action_service;
pub mod retry;

pub use cadence_service::CadenceService;
pub use crm_service::CrmService;
pub use mass_action_service::MassActionService;
