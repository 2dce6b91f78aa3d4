//! API-facing types: what goes over the wire, never more.

mod admin;
pub use admin::{AdminCredentials, VoterCredentials};

mod audit;
pub use audit::AuditQuery;

mod cast;
pub use cast::{CastReceipt, CastRequest};

mod pagination;
pub use pagination::{Paginated, Pagination};

mod receipt;
pub use receipt::ReceiptCheck;

mod results;
pub use results::PostResults;
