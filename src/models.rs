pub mod cadence;
pub mod crm;
pub mod jobs;
