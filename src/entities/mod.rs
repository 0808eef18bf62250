pub mod inventory;
pub mod location;
pub mod product_batch;
pub mod stock_movement;
pub mod user;
