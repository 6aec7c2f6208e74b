pub mod cadence_repo;
pub use cadence_repo::CadenceRepository;
pub mod crm_repo;
pub use crm_repo::CrmRepository;
pub mod jobs_repo;
pub use jobs_repo::JobsRepository;
