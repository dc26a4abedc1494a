pub mod db_pool;
pub mod migrations;
pub mod record_id;
