pub mod admin_handlers;
pub mod agency_handlers;
pub mod facebook_handlers;
pub mod listing_handlers;
pub mod request_handlers;
pub mod system_handlers;

pub use admin_handlers::*;
pub use agency_handlers::*;
pub use facebook_handlers::*;
pub use listing_handlers::*;
pub use request_handlers::*;
pub use system_handlers::*;
