mod processor;
mod splitter;
#[cfg(test)]
pub(crate) mod test_pdf;

pub use processor::{
    clean_text, extract_text_from_bytes, extract_text_from_pdf, save_upload, upload_name, DocumentError,
};
pub use splitter::{split_text, SplitterConfig};
