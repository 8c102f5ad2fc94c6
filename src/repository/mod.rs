pub mod carbon_repo;
pub mod certification_repo;
pub mod company_repo;
pub mod counter;
pub mod csr_repo;
#[cfg(test)]
pub mod memory;
pub mod notification_repo;
pub mod workshop_repo;
