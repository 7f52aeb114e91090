// src/types/mod.rs
pub mod agency;
pub mod common;
pub mod facebook;
pub mod filters;
pub mod listing;
pub mod request;
pub mod user;

pub use agency::{
    Agency, AgencyInput, AgencyListing, AgencyListingInput, AgencyStatus, FloorPlan,
    FloorPlanInput, PriceRange,
};
pub use common::{GenderPreference, ValidationErrors};
pub use facebook::{
    ExtractedFields, ExtractionMethod, ExtractionResult, FacebookExtractRequest, FacebookListing,
    FacebookPreviewRequest, InlineImage, NewFacebookListing,
};
pub use filters::{
    AgencyListingFilter, ListingFilter, ListingSort, ParsedListingFilter, ParsedRequestFilter,
    RequestFilter,
};
pub use listing::{ListingStatusUpdate, SubleaseListing, SubleaseListingInput};
pub use request::{SubleaseRequest, SubleaseRequestInput};
pub use user::{AdminStats, ProfileUpdate, RoleUpdate, User, UserRole};
