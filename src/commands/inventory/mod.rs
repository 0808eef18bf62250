pub mod adjust_inventory_command;
pub mod dispatch_inventory_command;
pub mod receive_inventory_command;
pub mod release_inventory_command;
pub mod reserve_inventory_command;
pub mod transfer_inventory_command;

pub use adjust_inventory_command::AdjustInventoryCommand;
pub use dispatch_inventory_command::DispatchInventoryCommand;
pub use receive_inventory_command::ReceiveInventoryCommand;
pub use release_inventory_command::ReleaseInventoryCommand;
pub use reserve_inventory_command::ReserveInventoryCommand;
pub use transfer_inventory_command::TransferInventoryCommand;
