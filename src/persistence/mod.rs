pub mod accounts;
pub mod store;
pub mod yaml;
