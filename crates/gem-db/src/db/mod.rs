//! Database repositories for data access layer
//!
//! One repository per entity. Association tables are written by the
//! repository that owns the relation (`member_subgroups` by subgroups,
//! `publication_authors` and `publication_subgroups` by publications) and read
//! from either side.

pub mod links;
pub mod member;
pub mod publication;
pub mod subgroup;
pub mod user;

pub use links::{group_by_owner, like_pattern};
pub use member::MemberRepository;
pub use publication::PublicationRepository;
pub use subgroup::SubgroupRepository;
pub use user::{NewUser, UserRepository};
