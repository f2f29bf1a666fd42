pub(crate) mod ingestion_loop;
pub(crate) mod writer_loop;
