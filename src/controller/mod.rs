pub mod bulk;
pub mod edit;
pub mod upload;
