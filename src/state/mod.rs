pub mod data_model;
pub mod i18n;
pub mod notice;
pub mod row_store;
pub mod schema;
pub mod selection;
pub mod view;
