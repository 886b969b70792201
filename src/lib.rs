//! Client SDK for the gym management API: session handling, list views with
//! server and local filters, mutations with confirmation, create/edit forms
//! and role gating for the admin dashboard.

pub mod access;
pub mod actions;
pub mod config;
pub mod errors;
pub mod forms;
pub mod listing;
pub mod storage;
pub mod structs;

pub use access::{authorize, visible_sections, Access, DenialReason, Section};
pub use actions::{Interaction, Mutation, MutationKind, MutationOutcome, SubscribeSelection};
pub use config::Config;
pub use errors::{GymError, GymResult};
pub use forms::{FormMode, FormSubmit, MemberForm, Modal, PackageForm, UserForm};
pub use listing::{
    AttendanceHistory, DateRange, ListView, LocalFilter, MemberDirectory, PackageCatalog, Page,
    PageSource, Pagination, Refresh, ServerQuery, StaffDirectory, StatusFilter,
};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use structs::client::{Client, ClientOptions};
pub use structs::session::{decode_identity, Identity, Session, SessionState, TokenSource};
pub use structs::user::{Role, StaffRole, User};
