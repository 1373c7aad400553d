pub mod narration;
pub mod persistence;
