pub mod message;
pub mod operations;
pub mod server;

pub use message::{COMMAND_LENGTH, Message, NODE_VERSION, OpType};
pub use operations::{
    send_addr, send_block, send_get_blocks, send_get_data, send_inv, send_tx, send_version,
};
pub use server::{Server, process_message, process_stream};
