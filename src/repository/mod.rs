// src/repository/mod.rs
//! SQLite access, one repository per table family
pub mod agencies;
pub mod facebook_listings;
pub mod stats;
pub mod sublease_listings;
pub mod sublease_requests;
pub mod users;

pub use agencies::{AgencyRegistration, AgencyRepository};
pub use facebook_listings::FacebookListingRepository;
pub use stats::StatsRepository;
pub use sublease_listings::SubleaseListingRepository;
pub use sublease_requests::SubleaseRequestRepository;
pub use users::UserRepository;
