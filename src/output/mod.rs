pub mod csv;
pub mod files;
pub mod json;
pub mod table;
