//! # Approval Axioms
//!
//! Verification and search of committees under approval voting.
//!
//! This crate provides:
//! - Exact checks of **Justified Representation** (JR), **Proportional JR** (PJR) and
//!   **Extended JR** (EJR) for a committee, with the offending voter group on failure.
//! - An exact, memoised partition oracle deciding whether a voter group splits into
//!   disjoint cohesive subgroups (the core of the EJR check).
//! - Lazy and parallel enumeration of all committees satisfying an axiom, backed by a
//!   per-size precomputed table of cohesive groups.
//! - The PAV score and LS-PAV local search.
//! - A Prefix-JR ranking search over ordinal preferences.
//!
//! Every exponential search takes a [`Budget`](budget::Budget) and reports
//! [`Error::ResourceExhausted`](error::Error::ResourceExhausted) instead of a verdict when
//! it runs out.
//!
//! ## Quick Start
//!
//! ```
//! use approval_axioms::prelude::*;
//!
//! let profile = Profile::new([
//!     ("v1", vec!["a", "b"]),
//!     ("v2", vec!["a", "b"]),
//!     ("v3", vec!["c"]),
//!     ("v4", vec!["c"]),
//! ])
//! .unwrap();
//!
//! let committee = profile.committee(["a", "c"]).unwrap();
//! assert!(satisfies_jr(&profile, committee).unwrap());
//! assert!(satisfies_ejr(&profile, committee, &Budget::unlimited()).unwrap());
//!
//! let all = find_all_satisfying(&profile, 2, Axiom::Pjr, &Budget::unlimited()).unwrap();
//! assert_eq!(all.len(), 2); // {a,c} and {b,c}
//! ```
//!
//! ## Validating the Bundled Examples
//!
//! ```
//! use approval_axioms::validate::validate_known_profiles;
//!
//! validate_known_profiles().expect("bundled examples should validate");
//! ```
//!
//! ## Modules
//!
//! - [`profile`]: profiles, committees and text formats.
//! - [`cohesion`]: quotas and cohesive-group discovery.
//! - [`partition`]: exact partition of voter groups into cohesive subgroups.
//! - [`axioms`]: JR / PJR / EJR checks and the precomputed [`AxiomChecker`](axioms::AxiomChecker).
//! - [`search`]: committee enumeration and LS-PAV.
//! - [`score`]: PAV score.
//! - [`prefix`]: ordinal preferences and Prefix-JR.
//!
//! ## Limits
//!
//! - Candidates are `u64` bitsets, so profiles hold at most 64 candidates.
//! - EJR and partition searches use `u64` voter sets, so they need at most 64 voters.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::inline_always)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::multiple_crate_versions)]

pub mod axioms;
pub mod budget;
pub mod cohesion;
pub mod error;
pub mod generate;
pub mod partition;
pub mod prefix;
pub mod profile;
pub mod score;
pub mod search;
pub mod subsets;
pub mod validate;

/// Re-export commonly used types for convenience.
pub mod prelude {
    pub use crate::axioms::{
        Axiom, AxiomChecker, Violation, find_violation, satisfies, satisfies_ejr, satisfies_jr,
        satisfies_pjr,
    };
    pub use crate::budget::Budget;
    pub use crate::cohesion::{CohesionMode, CohesiveGroup, Quota, find_cohesive_groups};
    pub use crate::error::{Error, Result};
    pub use crate::partition::GroupPartitioner;
    pub use crate::prefix::{PreferenceProfile, is_prefix_jr, parse_preferences, prefix_jr_rankings};
    pub use crate::profile::{Committee, Profile, load_profile, parse_profile};
    pub use crate::score::pav_score;
    pub use crate::search::{
        LocalSearchConfig, enumerate_satisfying, find_all_satisfying, local_search, ls_pav,
    };
    pub use crate::validate::validate_known_profiles;
}
