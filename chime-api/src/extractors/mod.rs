//! Request extractors.

pub mod member;
pub mod path_id;

pub use member::{MemberContext, MEMBER_ID_HEADER};
pub use path_id::{PathId, PathIdType};
