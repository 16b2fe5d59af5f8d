//! Core library shared by the cats service crates.
//!
//! - Response envelope (`ApiResponse`) and pagination
//! - Fault taxonomy with business, protocol and internal variants
//! - JWT issuance/validation and the authenticated user extractor
//! - Validation helpers for request payloads

pub mod error;
pub mod jwt;
pub mod pagination;
pub mod response;
pub mod validation;

pub use error::{
    BusinessError, ErrorBody, ErrorMessage, Fault, FaultExt, ProtocolError, UnknownError,
    status_name,
};
pub use jwt::{AuthUser, Authorized, JwtError, JwtSubject, JwtValidator, RoleSet};
pub use pagination::Pagination;
pub use response::{ApiResponse, Page, codes};
pub use validation::{Validate, Violations};
