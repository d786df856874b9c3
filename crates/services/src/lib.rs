pub mod audio;
pub mod document_store;
pub mod speech;

#[cfg(test)]
pub(crate) mod test_http;
