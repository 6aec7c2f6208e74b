pub mod cadences;
pub mod crm;
pub mod jobs;
