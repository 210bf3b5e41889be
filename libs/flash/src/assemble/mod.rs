//! FLASH block and rule result assembly

pub mod child_values;
pub mod mandatory;
pub mod rule_result;

pub use child_values::{apply_entries, ChildValueProcessor, RuleScope};
pub use mandatory::{validate_mandatory_children, MandatoryChild};
pub use rule_result::FlashRuleResult;
