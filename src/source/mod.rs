pub mod table_client;
