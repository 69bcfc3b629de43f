pub mod handler;

pub use handler::{
    ResponseChunk, handle_blob_sidecars_by_root, handle_blocks_by_range, handle_blocks_by_root,
    handle_data_column_sidecars_by_root,
};
