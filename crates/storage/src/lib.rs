pub mod db;

pub use db::{
    create_db, create_in_memory_db, get_receipt_by_id, insert_receipt, list_receipts_by_uploader,
    DbPool, NewReceipt, ReceiptRecord, StorageError,
};
