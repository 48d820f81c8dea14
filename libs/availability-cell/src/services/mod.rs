pub mod blocked;
pub mod overrides;
pub mod resolver;
pub mod rules;
pub mod slots;

pub use blocked::BlockedSlotStore;
pub use overrides::OverrideStore;
pub use resolver::{resolve_day, resolve_range, AvailabilityResolver, AvailabilitySnapshot};
pub use rules::{validate_new_rule, RuleStore, RuleWriteLocks};
pub use slots::slice_slots;
