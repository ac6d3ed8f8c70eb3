pub mod handle_table;
pub mod memory;
