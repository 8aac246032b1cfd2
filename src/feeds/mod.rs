//! Published feeds the tracker consumes once per pass.

pub mod labels;
pub mod repositories;

pub use labels::{
    label_repairs, HorizontalLabel, HorizontalLabels, HorizontalRepo, LabelRepair, Subcategory,
    HR_LABELS_URL,
};
pub use repositories::{tracked, EXTRA_REPOS_URL, HR_REPOS_URL};
